pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::points::handlers as points;
use crate::search::handlers as search;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Job search
        .route("/api/v1/jobs/search", get(search::handle_search))
        // Points ledger
        .route("/api/v1/points/balance", get(points::handle_balance))
        .route(
            "/api/v1/points/affordability",
            get(points::handle_affordability),
        )
        .route(
            "/api/v1/points/transactions",
            get(points::handle_transactions),
        )
        .route("/api/v1/points/spend", post(points::handle_spend))
        .with_state(state)
}
