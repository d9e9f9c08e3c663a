use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::points::store::LedgerError;
use crate::search::cache::CacheError;
use crate::search::upstream::UpstreamError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Taxonomy: validation never touches cache or ledger; insufficiency and
/// guard denial are recoverable and mutate nothing; only backing-store and
/// upstream failures are logged as errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Subscription tier not eligible: {0}")]
    TierIneligible(String),

    #[error("Insufficient points: need {cost}, have {available} (short {shortfall})")]
    InsufficientPoints {
        cost: i64,
        available: i64,
        shortfall: i64,
    },

    #[error("Credit budget exhausted: {0}")]
    CreditExhausted(String),

    #[error("Upstream failure: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientPoints {
                cost,
                available,
                shortfall,
            } => AppError::InsufficientPoints {
                cost,
                available,
                shortfall,
            },
            LedgerError::UserNotFound(id) => AppError::NotFound(format!("User {id} not found")),
            LedgerError::Store(e) => AppError::Database(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::TierIneligible(msg) => (
                StatusCode::PAYMENT_REQUIRED,
                "TIER_INELIGIBLE",
                msg.clone(),
            ),
            AppError::InsufficientPoints {
                cost,
                available,
                shortfall,
            } => (
                StatusCode::PAYMENT_REQUIRED,
                "INSUFFICIENT_POINTS",
                format!("This action costs {cost} points but only {available} are available (short {shortfall})"),
            ),
            AppError::CreditExhausted(reason) => {
                (StatusCode::TOO_MANY_REQUESTS, "CREDIT_EXHAUSTED", reason.clone())
            }
            AppError::Upstream(err) => return upstream_response(err),
            AppError::Cache(e) => {
                tracing::error!("Cache error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CACHE_ERROR",
                    "A cache error occurred".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        error_body(status, code, message)
    }
}

/// Upstream failures are surfaced distinctly: a malformed derived query is
/// our 400, provider throttling is a 429, a bad provider key is our
/// misconfiguration (500), anything else is a 502.
fn upstream_response(err: &UpstreamError) -> Response {
    let (status, code, message) = match err {
        UpstreamError::BadRequest(msg) => (
            StatusCode::BAD_REQUEST,
            "UPSTREAM_BAD_REQUEST",
            format!("Job provider rejected the query: {msg}"),
        ),
        UpstreamError::RateLimited(_) => (
            StatusCode::TOO_MANY_REQUESTS,
            "UPSTREAM_RATE_LIMITED",
            "Job provider is rate limiting requests".to_string(),
        ),
        UpstreamError::Unauthorized(msg) => {
            tracing::error!("Upstream auth failure (check provider credentials): {msg}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "UPSTREAM_AUTH",
                "Job provider configuration error".to_string(),
            )
        }
        UpstreamError::ServerError { status, message } => {
            tracing::error!("Upstream server error {status}: {message}");
            (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_ERROR",
                "Job provider is unavailable".to_string(),
            )
        }
        UpstreamError::Http(e) => {
            tracing::error!("Upstream transport error: {e}");
            (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_UNREACHABLE",
                "Job provider could not be reached".to_string(),
            )
        }
    };
    error_body(status, code, message)
}

fn error_body(status: StatusCode, code: &str, message: String) -> Response {
    let body = Json(json!({
        "error": {
            "code": code,
            "message": message
        }
    }));
    (status, body).into_response()
}
