use anyhow::{anyhow, Context, Result};

use crate::search::orchestrator::ExecutionMode;
use crate::search::params::{SearchDefaults, SearchEndpoint, MAX_LIMIT, MIN_LIMIT};

/// Application configuration loaded from environment variables.
/// Mode selection is fully configuration-driven: `EXECUTION_MODE` is parsed
/// once here and passed into the orchestrator per call — no component reads
/// env vars at request time.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Presence selects the Redis cache backend; absent means in-process.
    pub redis_url: Option<String>,
    pub jobs_api_url: String,
    pub rapidapi_key: String,
    pub rapidapi_host: String,
    pub cache_ttl_secs: u64,
    pub default_limit: u32,
    pub default_endpoint: SearchEndpoint,
    pub execution_mode: ExecutionMode,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let default_endpoint_raw =
            std::env::var("DEFAULT_ENDPOINT").unwrap_or_else(|_| "7d".to_string());
        let default_endpoint = SearchEndpoint::parse(&default_endpoint_raw).ok_or_else(|| {
            anyhow!("DEFAULT_ENDPOINT must be one of 7d, 24h, 1h; got '{default_endpoint_raw}'")
        })?;

        let execution_mode_raw =
            std::env::var("EXECUTION_MODE").unwrap_or_else(|_| "off".to_string());
        let execution_mode = ExecutionMode::parse(&execution_mode_raw).ok_or_else(|| {
            anyhow!("EXECUTION_MODE must be one of off, log, stop; got '{execution_mode_raw}'")
        })?;

        let default_limit = std::env::var("DEFAULT_SEARCH_LIMIT")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()
            .context("DEFAULT_SEARCH_LIMIT must be an integer")?;
        if !(MIN_LIMIT..=MAX_LIMIT).contains(&default_limit) {
            return Err(anyhow!(
                "DEFAULT_SEARCH_LIMIT must be in [{MIN_LIMIT}, {MAX_LIMIT}], got {default_limit}"
            ));
        }

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: std::env::var("REDIS_URL").ok(),
            jobs_api_url: require_env("JOBS_API_URL")?,
            rapidapi_key: require_env("RAPIDAPI_KEY")?,
            rapidapi_host: require_env("RAPIDAPI_HOST")?,
            cache_ttl_secs: std::env::var("CACHE_TTL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse::<u64>()
                .context("CACHE_TTL_SECS must be an integer")?,
            default_limit,
            default_endpoint,
            execution_mode,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn search_defaults(&self) -> SearchDefaults {
        SearchDefaults {
            limit: self.default_limit,
            endpoint: self.default_endpoint,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
