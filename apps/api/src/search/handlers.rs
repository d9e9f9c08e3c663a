use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};

use crate::errors::AppError;
use crate::search::orchestrator::SearchResponse;
use crate::session::{bearer_token, Session, SessionProvider};
use crate::state::AppState;

/// GET /api/v1/jobs/search
///
/// Raw query pairs go to the orchestrator untouched — normalization owns
/// defaults, clamping and rejection. The execution mode comes from config
/// here at the edge; the core never reads it ambiently.
pub async fn handle_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(raw_params): Query<Vec<(String, String)>>,
) -> Result<Json<SearchResponse>, AppError> {
    let session = resolve_session(&state, &headers).await?;
    let response = state
        .orchestrator
        .run(&raw_params, session.as_ref(), state.config.execution_mode)
        .await?;
    Ok(Json(response))
}

/// Resolves an optional session from the Authorization header. An absent or
/// unknown token is simply anonymous; premium gating happens downstream.
pub async fn resolve_session(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<Session>, AppError> {
    match bearer_token(headers) {
        Some(token) => Ok(state.sessions.authenticate(token).await?),
        None => Ok(None),
    }
}
