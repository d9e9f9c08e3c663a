//! Authentication collaborator. The search and points surfaces only need
//! "who is this, if anyone" — sessions are owned elsewhere and consumed here
//! through a trait seam.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Resolves a bearer token to a live session, or `None`.
    async fn authenticate(&self, token: &str) -> Result<Option<Session>, sqlx::Error>;
}

pub type DynSessionProvider = Arc<dyn SessionProvider>;

/// Extracts the bearer token from an Authorization header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Token lookup against the sessions table.
pub struct PgSessionProvider {
    pool: PgPool,
}

impl PgSessionProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionProvider for PgSessionProvider {
    async fn authenticate(&self, token: &str) -> Result<Option<Session>, sqlx::Error> {
        sqlx::query_as::<_, Session>(
            "SELECT user_id, email FROM sessions WHERE token = $1 AND expires_at > now()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
    }
}

/// Fixed token map for tests and local development.
#[derive(Default)]
pub struct StaticSessionProvider {
    tokens: HashMap<String, Session>,
}

impl StaticSessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: &str, session: Session) -> Self {
        self.tokens.insert(token.to_string(), session);
        self
    }
}

#[async_trait]
impl SessionProvider for StaticSessionProvider {
    async fn authenticate(&self, token: &str) -> Result<Option<Session>, sqlx::Error> {
        Ok(self.tokens.get(token).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));
    }

    #[test]
    fn test_bearer_token_missing_or_malformed() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn test_static_provider_roundtrip() {
        let session = Session {
            user_id: Uuid::new_v4(),
            email: "dev@example.com".to_string(),
        };
        let provider = StaticSessionProvider::new().with_token("tok", session.clone());
        let found = provider.authenticate("tok").await.unwrap().unwrap();
        assert_eq!(found.user_id, session.user_id);
        assert!(provider.authenticate("other").await.unwrap().is_none());
    }
}
