//! Upstream job-search provider client — the single point of entry for all
//! provider calls. Failures are classified, never retried here: the
//! orchestrator decides what a 429 or a 5xx means for the request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

use crate::search::params::NormalizedSearchParams;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Upstream rate limited: {0}")]
    RateLimited(String),

    #[error("Upstream rejected our credentials: {0}")]
    Unauthorized(String),

    #[error("Upstream rejected the query: {0}")]
    BadRequest(String),

    #[error("Upstream server error (status {status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Raw provider payload plus the response headers it arrived with. Headers
/// feed the usage tracker and are snapshotted into the cache entry.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub payload: serde_json::Value,
    pub headers: HeaderMap,
}

#[async_trait]
pub trait JobSearchProvider: Send + Sync {
    async fn search(&self, params: &NormalizedSearchParams)
        -> Result<UpstreamResponse, UpstreamError>;
}

pub type DynJobSearchProvider = Arc<dyn JobSearchProvider>;

/// Pulls the job list out of a provider payload. Providers return either a
/// bare array or an object wrapping one under `jobs`/`data`.
pub fn extract_results(payload: &serde_json::Value) -> Vec<serde_json::Value> {
    match payload {
        serde_json::Value::Array(items) => items.clone(),
        serde_json::Value::Object(map) => map
            .get("jobs")
            .or_else(|| map.get("data"))
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// RapidAPI-style HTTP provider.
pub struct HttpJobsProvider {
    client: Client,
    base_url: String,
    api_key: String,
    api_host: String,
}

impl HttpJobsProvider {
    pub fn new(base_url: String, api_key: String, api_host: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(UPSTREAM_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            base_url,
            api_key,
            api_host,
        }
    }
}

#[async_trait]
impl JobSearchProvider for HttpJobsProvider {
    async fn search(
        &self,
        params: &NormalizedSearchParams,
    ) -> Result<UpstreamResponse, UpstreamError> {
        // The internal `endpoint` selector maps to a path suffix; every other
        // normalized parameter is carried 1:1 as a query parameter.
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            params.endpoint.path_suffix()
        );
        let query: Vec<(&str, String)> = params
            .to_sorted_pairs()
            .into_iter()
            .filter(|(k, _)| *k != "endpoint")
            .collect();

        debug!("Upstream GET {url} ({} query params)", query.len());

        let response = self
            .client
            .get(&url)
            .query(&query)
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", &self.api_host)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, body));
        }

        let payload = response.json::<serde_json::Value>().await?;
        Ok(UpstreamResponse { payload, headers })
    }
}

fn classify_failure(status: StatusCode, body: String) -> UpstreamError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => UpstreamError::RateLimited(body),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UpstreamError::Unauthorized(body),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            UpstreamError::BadRequest(body)
        }
        _ => UpstreamError::ServerError {
            status: status.as_u16(),
            message: body,
        },
    }
}
