//! Search orchestration — composes the full request flow.
//!
//! Flow: normalize → cache lookup → (hit: return) →
//!       credit guard → (premium: session + tier + atomic debit) →
//!       upstream call → usage update → cache write → return.
//!
//! A cache hit bypasses guard, gate and upstream entirely. A failed premium
//! gate aborts the request before any upstream work. An upstream failure
//! leaves cache and usage window untouched.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::points::models::SpendType;
use crate::points::store::{DynLedgerStore, LedgerStore};
use crate::search::cache::{CacheEntry, DynResponseCache, ResponseCache};
use crate::search::cache_key::cache_key;
use crate::search::params::{normalize, SearchDefaults};
use crate::search::upstream::{extract_results, DynJobSearchProvider, JobSearchProvider};
use crate::search::usage::{
    check_request, estimate_consumption, snapshot_usage_headers, Consumption, UsageWindowTracker,
};
use crate::session::Session;

// ────────────────────────────────────────────────────────────────────────────
// Execution mode
// ────────────────────────────────────────────────────────────────────────────

/// How far a request is allowed to go. Passed in per call — nothing inside
/// the orchestrator reads ambient configuration.
///
/// `Stop` suppresses the upstream call but still runs the premium debit, so
/// billing can be exercised end to end without spending provider quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Live,
    Log,
    Stop,
}

impl ExecutionMode {
    /// Parses the `EXECUTION_MODE` setting (`off` means debug off, i.e. live).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "off" => Some(ExecutionMode::Live),
            "log" => Some(ExecutionMode::Log),
            "stop" => Some(ExecutionMode::Stop),
            _ => None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Request / response
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct SearchDebugInfo {
    pub mode: ExecutionMode,
    pub cache_key: String,
    pub cache_hit: bool,
    pub estimated_consumption: Consumption,
    pub upstream_called: bool,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<serde_json::Value>,
    pub points_spent: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_balance: Option<i64>,
    pub usage_headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<SearchDebugInfo>,
}

// ────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ────────────────────────────────────────────────────────────────────────────

pub struct SearchOrchestrator {
    cache: DynResponseCache,
    ledger: DynLedgerStore,
    provider: DynJobSearchProvider,
    tracker: Arc<UsageWindowTracker>,
    defaults: SearchDefaults,
    cache_ttl_secs: u64,
}

impl SearchOrchestrator {
    pub fn new(
        cache: DynResponseCache,
        ledger: DynLedgerStore,
        provider: DynJobSearchProvider,
        tracker: Arc<UsageWindowTracker>,
        defaults: SearchDefaults,
        cache_ttl_secs: u64,
    ) -> Self {
        Self {
            cache,
            ledger,
            provider,
            tracker,
            defaults,
            cache_ttl_secs,
        }
    }

    pub async fn run(
        &self,
        raw_params: &[(String, String)],
        session: Option<&Session>,
        mode: ExecutionMode,
    ) -> Result<SearchResponse, AppError> {
        // VALIDATE
        let outcome = normalize(raw_params, &self.defaults);
        for warning in &outcome.warnings {
            warn!("Search parameter warning: {warning}");
        }
        let params = outcome
            .normalized
            .ok_or_else(|| AppError::Validation(outcome.errors.join("; ")))?;

        let user_scope = session.map(|s| s.user_id);
        let key = cache_key(&params, user_scope);
        let estimated = estimate_consumption(&params);

        // CACHE_LOOKUP
        if let Some(hit) = self.cache.get(&key).await? {
            info!("Cache hit for {key} (age {}s)", hit.age_secs);
            return Ok(SearchResponse {
                results: extract_results(&hit.entry.payload),
                points_spent: 0,
                new_balance: None,
                usage_headers: hit.entry.usage_headers,
                debug_info: debug_info(mode, &key, true, estimated, false),
            });
        }

        // CREDIT_CHECK — pure query against the last-known window.
        let window = self.tracker.current().await;
        if let Err(denial) = check_request(&params, &window) {
            info!("Credit guard denied {key}: {}", denial.reason);
            return Err(AppError::CreditExhausted(denial.reason));
        }

        // PREMIUM_GATE — session, eligible tier, and a successful atomic
        // debit, all before any upstream work.
        let mut points_spent = 0;
        let mut new_balance = None;
        if params.endpoint.is_premium() {
            let session = session.ok_or(AppError::Unauthorized)?;
            let account = self.ledger.get_account(session.user_id).await?;
            if !account.tier().is_paid() {
                return Err(AppError::TierIneligible(format!(
                    "The {} window requires a paid subscription",
                    params.endpoint.as_str()
                )));
            }
            let spend = self
                .ledger
                .spend(
                    session.user_id,
                    SpendType::PremiumSearch,
                    None,
                    &format!("Premium job search ({} window)", params.endpoint.as_str()),
                )
                .await?;
            points_spent = spend.points_spent;
            new_balance = Some(spend.new_balance);
        }

        // Stop mode: billing has run, provider quota is not touched.
        if mode == ExecutionMode::Stop {
            info!("Execution mode 'stop': suppressing upstream call for {key}");
            return Ok(SearchResponse {
                results: Vec::new(),
                points_spent,
                new_balance,
                usage_headers: BTreeMap::new(),
                debug_info: debug_info(mode, &key, false, estimated, false),
            });
        }

        // UPSTREAM_CALL — no retries; a failure propagates with no cache
        // write and no usage update.
        let upstream = self.provider.search(&params).await?;

        // UPDATE_USAGE
        self.tracker.update_from_headers(&upstream.headers).await;
        let usage_headers = snapshot_usage_headers(&upstream.headers);

        // CACHE_WRITE — all-or-nothing; a concurrent miss may race us and
        // the last writer wins.
        self.cache
            .put(
                &key,
                CacheEntry {
                    normalized_params: params.clone(),
                    payload: upstream.payload.clone(),
                    usage_headers: usage_headers.clone(),
                    written_at: Utc::now(),
                    ttl_secs: self.cache_ttl_secs,
                },
            )
            .await?;

        Ok(SearchResponse {
            results: extract_results(&upstream.payload),
            points_spent,
            new_balance,
            usage_headers,
            debug_info: debug_info(mode, &key, false, estimated, true),
        })
    }
}

fn debug_info(
    mode: ExecutionMode,
    key: &str,
    cache_hit: bool,
    estimated: Consumption,
    upstream_called: bool,
) -> Option<SearchDebugInfo> {
    if mode == ExecutionMode::Live {
        return None;
    }
    Some(SearchDebugInfo {
        mode,
        cache_key: key.to_string(),
        cache_hit,
        estimated_consumption: estimated,
        upstream_called,
    })
}
