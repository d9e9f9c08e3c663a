mod config;
mod db;
mod errors;
mod points;
mod routes;
mod search;
mod session;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::points::costs::StaticCostProvider;
use crate::points::store::PgLedgerStore;
use crate::routes::build_router;
use crate::search::cache::{DynResponseCache, MemoryCache, RedisCache};
use crate::search::orchestrator::SearchOrchestrator;
use crate::search::upstream::HttpJobsProvider;
use crate::search::usage::UsageWindowTracker;
use crate::session::PgSessionProvider;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Beacon API v{}", env!("CARGO_PKG_VERSION"));
    info!("Execution mode: {:?}", config.execution_mode);

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Response cache backend: Redis when configured, in-process otherwise
    let cache: DynResponseCache = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.clone())?;
            let cache = RedisCache::connect(&client).await?;
            info!("Response cache: redis");
            Arc::new(cache)
        }
        None => {
            info!("Response cache: in-process memory");
            Arc::new(MemoryCache::new())
        }
    };

    // Cost configuration and ledger
    let costs = Arc::new(StaticCostProvider);
    let ledger = Arc::new(PgLedgerStore::new(db.clone(), costs.clone()));

    // Upstream provider and usage tracking
    let provider = Arc::new(HttpJobsProvider::new(
        config.jobs_api_url.clone(),
        config.rapidapi_key.clone(),
        config.rapidapi_host.clone(),
    ));
    let tracker = Arc::new(UsageWindowTracker::new());

    let orchestrator = Arc::new(SearchOrchestrator::new(
        cache,
        ledger.clone(),
        provider,
        tracker,
        config.search_defaults(),
        config.cache_ttl_secs,
    ));
    info!(
        "Search orchestrator initialized (ttl {}s, default limit {}, default window {})",
        config.cache_ttl_secs,
        config.default_limit,
        config.default_endpoint.as_str()
    );

    let sessions = Arc::new(PgSessionProvider::new(db));

    // Build app state
    let state = AppState {
        config: config.clone(),
        orchestrator,
        ledger,
        costs,
        sessions,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
