//! Credit usage window and guard.
//!
//! The window is an approximation of the provider's true quota, rebuilt from
//! response headers after every real upstream call. It must tolerate being
//! stale or empty: absent/malformed headers leave the previous window
//! unchanged, and an unknown budget never blocks a request.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use reqwest::header::HeaderMap;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::search::params::NormalizedSearchParams;

const REQUESTS_REMAINING_HEADERS: &[&str] = &[
    "x-ratelimit-requests-remaining",
    "x-rapidapi-requests-remaining",
];
const JOBS_REMAINING_HEADERS: &[&str] = &[
    "x-ratelimit-jobs-remaining",
    "x-rapidapi-jobs-remaining",
];
const RESET_HEADERS: &[&str] = &["x-ratelimit-requests-reset", "x-rapidapi-requests-reset"];

/// Last-known provider budget. `None` fields mean "never observed".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreditUsageWindow {
    pub requests_remaining: Option<u64>,
    pub jobs_remaining: Option<u64>,
    pub reset_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields parsed out of one response before merging into the window.
#[derive(Debug, Default)]
struct PartialWindow {
    requests_remaining: Option<u64>,
    jobs_remaining: Option<u64>,
    reset_at: Option<DateTime<Utc>>,
}

impl PartialWindow {
    fn has_data(&self) -> bool {
        self.requests_remaining.is_some()
            || self.jobs_remaining.is_some()
            || self.reset_at.is_some()
    }
}

fn header_u64(headers: &HeaderMap, names: &[&str]) -> Option<u64> {
    names.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
    })
}

fn parse_headers(headers: &HeaderMap, now: DateTime<Utc>) -> PartialWindow {
    PartialWindow {
        requests_remaining: header_u64(headers, REQUESTS_REMAINING_HEADERS),
        jobs_remaining: header_u64(headers, JOBS_REMAINING_HEADERS),
        // Reset headers carry seconds-until-reset.
        reset_at: header_u64(headers, RESET_HEADERS)
            .map(|secs| now + Duration::seconds(secs as i64)),
    }
}

/// Captures the rate-limit headers verbatim, for cache snapshots and for
/// replaying to the client.
pub fn snapshot_usage_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter(|(name, _)| {
            let n = name.as_str();
            n.starts_with("x-ratelimit-") || n.starts_with("x-rapidapi-")
        })
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

/// Thread-safe holder for the current window.
#[derive(Default)]
pub struct UsageWindowTracker {
    window: RwLock<CreditUsageWindow>,
}

impl UsageWindowTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges parsed fields into the window. Headers that are absent or
    /// unparseable change nothing.
    pub async fn update_from_headers(&self, headers: &HeaderMap) {
        let now = Utc::now();
        let partial = parse_headers(headers, now);
        if !partial.has_data() {
            debug!("No usage headers in upstream response; window unchanged");
            return;
        }

        let mut window = self.window.write().await;
        if let Some(v) = partial.requests_remaining {
            window.requests_remaining = Some(v);
        }
        if let Some(v) = partial.jobs_remaining {
            window.jobs_remaining = Some(v);
        }
        if let Some(v) = partial.reset_at {
            window.reset_at = Some(v);
        }
        window.updated_at = Some(now);
    }

    pub async fn current(&self) -> CreditUsageWindow {
        self.window.read().await.clone()
    }
}

/// Estimated consumption of one upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Consumption {
    pub requests: u64,
    pub jobs: u64,
}

pub fn estimate_consumption(params: &NormalizedSearchParams) -> Consumption {
    Consumption {
        requests: params.endpoint.request_weight(),
        jobs: params.limit as u64,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardDenial {
    pub reason: String,
}

/// Pure admission check: does the estimated consumption fit the last-known
/// window? Never mutates anything; unknown budgets admit.
pub fn check_request(
    params: &NormalizedSearchParams,
    window: &CreditUsageWindow,
) -> Result<(), GuardDenial> {
    let estimate = estimate_consumption(params);

    if let Some(remaining) = window.requests_remaining {
        if estimate.requests > remaining {
            return Err(GuardDenial {
                reason: format!(
                    "API request budget exhausted: this search needs {} request(s), {} remaining",
                    estimate.requests, remaining
                ),
            });
        }
    }
    if let Some(remaining) = window.jobs_remaining {
        if estimate.jobs > remaining {
            return Err(GuardDenial {
                reason: format!(
                    "API job budget exhausted: this search needs {} job(s), {} remaining",
                    estimate.jobs, remaining
                ),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::params::SearchEndpoint;
    use reqwest::header::{HeaderMap, HeaderValue};

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(
                reqwest::header::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        map
    }

    fn params(limit: u32, endpoint: SearchEndpoint) -> NormalizedSearchParams {
        NormalizedSearchParams {
            keywords: None,
            location: None,
            remote: None,
            limit,
            endpoint,
        }
    }

    #[tokio::test]
    async fn test_update_parses_ratelimit_headers() {
        let tracker = UsageWindowTracker::new();
        tracker
            .update_from_headers(&headers(&[
                ("x-ratelimit-requests-remaining", "42"),
                ("x-ratelimit-jobs-remaining", "900"),
                ("x-ratelimit-requests-reset", "120"),
            ]))
            .await;

        let window = tracker.current().await;
        assert_eq!(window.requests_remaining, Some(42));
        assert_eq!(window.jobs_remaining, Some(900));
        assert!(window.reset_at.is_some());
        assert!(window.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_rapidapi_header_names_accepted() {
        let tracker = UsageWindowTracker::new();
        tracker
            .update_from_headers(&headers(&[("x-rapidapi-requests-remaining", "7")]))
            .await;
        assert_eq!(tracker.current().await.requests_remaining, Some(7));
    }

    #[tokio::test]
    async fn test_absent_headers_leave_window_unchanged() {
        let tracker = UsageWindowTracker::new();
        tracker
            .update_from_headers(&headers(&[("x-ratelimit-requests-remaining", "42")]))
            .await;
        let before = tracker.current().await;

        tracker
            .update_from_headers(&headers(&[("content-type", "application/json")]))
            .await;
        assert_eq!(tracker.current().await, before);
    }

    #[tokio::test]
    async fn test_malformed_value_does_not_clobber() {
        let tracker = UsageWindowTracker::new();
        tracker
            .update_from_headers(&headers(&[("x-ratelimit-requests-remaining", "42")]))
            .await;
        tracker
            .update_from_headers(&headers(&[("x-ratelimit-requests-remaining", "lots")]))
            .await;
        assert_eq!(tracker.current().await.requests_remaining, Some(42));
    }

    #[test]
    fn test_estimate_scales_with_limit_and_endpoint() {
        let cheap = estimate_consumption(&params(10, SearchEndpoint::SevenDays));
        assert_eq!(cheap, Consumption { requests: 1, jobs: 10 });

        let premium = estimate_consumption(&params(50, SearchEndpoint::OneHour));
        assert_eq!(premium, Consumption { requests: 3, jobs: 50 });
    }

    #[test]
    fn test_guard_denies_on_request_budget() {
        let window = CreditUsageWindow {
            requests_remaining: Some(2),
            ..Default::default()
        };
        let denial = check_request(&params(10, SearchEndpoint::OneHour), &window).unwrap_err();
        assert!(denial.reason.contains("request budget"));
    }

    #[test]
    fn test_guard_denies_on_job_budget() {
        let window = CreditUsageWindow {
            requests_remaining: Some(100),
            jobs_remaining: Some(5),
            ..Default::default()
        };
        let denial = check_request(&params(10, SearchEndpoint::SevenDays), &window).unwrap_err();
        assert!(denial.reason.contains("job budget"));
    }

    #[test]
    fn test_guard_admits_unknown_window() {
        assert!(check_request(
            &params(50, SearchEndpoint::OneHour),
            &CreditUsageWindow::default()
        )
        .is_ok());
    }

    #[test]
    fn test_guard_is_pure() {
        let window = CreditUsageWindow {
            requests_remaining: Some(0),
            jobs_remaining: Some(0),
            reset_at: None,
            updated_at: None,
        };
        let before = window.clone();
        let p = params(10, SearchEndpoint::SevenDays);
        let _ = check_request(&p, &window);
        let _ = check_request(&p, &window);
        assert_eq!(window, before);
    }

    #[test]
    fn test_snapshot_captures_only_rate_headers() {
        let snap = snapshot_usage_headers(&headers(&[
            ("x-ratelimit-requests-remaining", "9"),
            ("x-rapidapi-region", "eu"),
            ("content-type", "application/json"),
        ]));
        assert_eq!(snap.len(), 2);
        assert!(snap.contains_key("x-ratelimit-requests-remaining"));
        assert!(!snap.contains_key("content-type"));
    }
}
