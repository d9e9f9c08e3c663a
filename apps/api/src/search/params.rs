//! Search parameter normalization. Raw query-string parameters are turned
//! into a canonical form before anything else sees them — the normalized
//! shape is the only thing ever hashed into a cache key or sent upstream.

use serde::{Deserialize, Serialize};

pub const MIN_LIMIT: u32 = 1;
pub const MAX_LIMIT: u32 = 50;
const MAX_KEYWORDS_LEN: usize = 200;
const MAX_LOCATION_LEN: usize = 100;

const KNOWN_KEYS: &[&str] = &["keywords", "location", "remote", "limit", "endpoint"];

/// Closed set of search windows. `1h` is the premium tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchEndpoint {
    SevenDays,
    TwentyFourHours,
    OneHour,
}

impl SearchEndpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchEndpoint::SevenDays => "7d",
            SearchEndpoint::TwentyFourHours => "24h",
            SearchEndpoint::OneHour => "1h",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "7d" => Some(SearchEndpoint::SevenDays),
            "24h" => Some(SearchEndpoint::TwentyFourHours),
            "1h" => Some(SearchEndpoint::OneHour),
            _ => None,
        }
    }

    /// Provider path suffix this window maps to. The `endpoint` selector is
    /// internal; it is never sent as a query parameter.
    pub fn path_suffix(&self) -> &'static str {
        match self {
            SearchEndpoint::SevenDays => "active-jobs-7d",
            SearchEndpoint::TwentyFourHours => "active-jobs-24h",
            SearchEndpoint::OneHour => "active-jobs-1h",
        }
    }

    /// Fresher windows burn more of the provider's request budget per call.
    pub fn request_weight(&self) -> u64 {
        match self {
            SearchEndpoint::SevenDays => 1,
            SearchEndpoint::TwentyFourHours => 2,
            SearchEndpoint::OneHour => 3,
        }
    }

    /// Premium windows require a session, an eligible tier, and a points
    /// debit before any upstream call.
    pub fn is_premium(&self) -> bool {
        matches!(self, SearchEndpoint::OneHour)
    }
}

/// Canonical search parameters: defaults applied, ranges clamped,
/// enumerations validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedSearchParams {
    pub keywords: Option<String>,
    pub location: Option<String>,
    pub remote: Option<bool>,
    pub limit: u32,
    pub endpoint: SearchEndpoint,
}

impl NormalizedSearchParams {
    /// Deterministic key/value view, sorted by key. Shared by the cache key
    /// codec and the upstream query builder so the two can never disagree.
    pub fn to_sorted_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("endpoint", self.endpoint.as_str().to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(keywords) = &self.keywords {
            pairs.push(("keywords", keywords.clone()));
        }
        if let Some(location) = &self.location {
            pairs.push(("location", location.clone()));
        }
        if let Some(remote) = self.remote {
            pairs.push(("remote", remote.to_string()));
        }
        pairs.sort_by_key(|(k, _)| *k);
        pairs
    }
}

/// Defaults are configuration, not code: the orchestrator passes them in.
#[derive(Debug, Clone)]
pub struct SearchDefaults {
    pub limit: u32,
    pub endpoint: SearchEndpoint,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            limit: 10,
            endpoint: SearchEndpoint::SevenDays,
        }
    }
}

/// Outcome of normalization. `errors` are hard failures (reject the request,
/// 400); `warnings` are non-fatal adjustments, logged only.
#[derive(Debug, Clone)]
pub struct NormalizeOutcome {
    pub normalized: Option<NormalizedSearchParams>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

pub fn normalize(
    raw: &[(String, String)],
    defaults: &SearchDefaults,
) -> NormalizeOutcome {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let mut keywords: Option<String> = None;
    let mut location: Option<String> = None;
    let mut remote: Option<bool> = None;
    let mut limit = defaults.limit.clamp(MIN_LIMIT, MAX_LIMIT);
    let mut endpoint = defaults.endpoint;

    for (key, value) in raw {
        match key.as_str() {
            "keywords" => {
                let trimmed = value.trim();
                if trimmed.len() > MAX_KEYWORDS_LEN {
                    errors.push(format!(
                        "keywords exceeds {MAX_KEYWORDS_LEN} characters ({})",
                        trimmed.len()
                    ));
                } else if !trimmed.is_empty() {
                    keywords = Some(trimmed.to_string());
                }
            }
            "location" => {
                let trimmed = value.trim();
                if trimmed.len() > MAX_LOCATION_LEN {
                    errors.push(format!(
                        "location exceeds {MAX_LOCATION_LEN} characters ({})",
                        trimmed.len()
                    ));
                } else if !trimmed.is_empty() {
                    location = Some(trimmed.to_string());
                }
            }
            "remote" => match value.trim() {
                "true" => remote = Some(true),
                "false" => remote = Some(false),
                other => errors.push(format!(
                    "remote must be 'true' or 'false', got '{other}'"
                )),
            },
            "limit" => match value.trim().parse::<u32>() {
                Ok(n) if (MIN_LIMIT..=MAX_LIMIT).contains(&n) => limit = n,
                Ok(n) => {
                    let clamped = n.clamp(MIN_LIMIT, MAX_LIMIT);
                    warnings.push(format!(
                        "limit {n} out of range [{MIN_LIMIT}, {MAX_LIMIT}], clamped to {clamped}"
                    ));
                    limit = clamped;
                }
                Err(_) => errors.push(format!("limit must be an integer, got '{value}'")),
            },
            "endpoint" => match SearchEndpoint::parse(value.trim()) {
                Some(e) => endpoint = e,
                None => errors.push(format!(
                    "endpoint must be one of 7d, 24h, 1h; got '{value}'"
                )),
            },
            unknown => {
                if !KNOWN_KEYS.contains(&unknown) {
                    warnings.push(format!("unknown parameter '{unknown}' ignored"));
                }
            }
        }
    }

    if errors.is_empty() {
        NormalizeOutcome {
            normalized: Some(NormalizedSearchParams {
                keywords,
                location,
                remote,
                limit,
                endpoint,
            }),
            errors,
            warnings,
        }
    } else {
        NormalizeOutcome {
            normalized: None,
            errors,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_applied() {
        let out = normalize(&raw(&[("keywords", "React")]), &SearchDefaults::default());
        let n = out.normalized.unwrap();
        assert_eq!(n.limit, 10);
        assert_eq!(n.endpoint, SearchEndpoint::SevenDays);
        assert_eq!(n.keywords.as_deref(), Some("React"));
        assert!(out.errors.is_empty());
    }

    #[test]
    fn test_limit_clamped_with_warning() {
        let out = normalize(&raw(&[("limit", "500")]), &SearchDefaults::default());
        let n = out.normalized.unwrap();
        assert_eq!(n.limit, 50);
        assert_eq!(out.warnings.len(), 1);

        let out = normalize(&raw(&[("limit", "0")]), &SearchDefaults::default());
        assert_eq!(out.normalized.unwrap().limit, 1);
    }

    #[test]
    fn test_non_numeric_limit_is_error() {
        let out = normalize(&raw(&[("limit", "ten")]), &SearchDefaults::default());
        assert!(out.normalized.is_none());
        assert_eq!(out.errors.len(), 1);
    }

    #[test]
    fn test_endpoint_enum_closed() {
        let out = normalize(&raw(&[("endpoint", "24h")]), &SearchDefaults::default());
        assert_eq!(
            out.normalized.unwrap().endpoint,
            SearchEndpoint::TwentyFourHours
        );

        let out = normalize(&raw(&[("endpoint", "30d")]), &SearchDefaults::default());
        assert!(out.normalized.is_none());
        assert!(out.errors[0].contains("endpoint"));
    }

    #[test]
    fn test_remote_must_be_boolean_string() {
        let out = normalize(&raw(&[("remote", "yes")]), &SearchDefaults::default());
        assert!(out.normalized.is_none());

        let out = normalize(&raw(&[("remote", "true")]), &SearchDefaults::default());
        assert_eq!(out.normalized.unwrap().remote, Some(true));
    }

    #[test]
    fn test_keywords_trimmed_and_bounded() {
        let out = normalize(&raw(&[("keywords", "  Rust  ")]), &SearchDefaults::default());
        assert_eq!(out.normalized.unwrap().keywords.as_deref(), Some("Rust"));

        let long = "x".repeat(201);
        let out = normalize(&raw(&[("keywords", &long)]), &SearchDefaults::default());
        assert!(out.normalized.is_none());
    }

    #[test]
    fn test_empty_keywords_dropped() {
        let out = normalize(&raw(&[("keywords", "   ")]), &SearchDefaults::default());
        assert_eq!(out.normalized.unwrap().keywords, None);
    }

    #[test]
    fn test_unknown_key_warns_but_passes() {
        let out = normalize(&raw(&[("foo", "bar")]), &SearchDefaults::default());
        assert!(out.normalized.is_some());
        assert!(out.warnings[0].contains("foo"));
    }

    #[test]
    fn test_errors_collected_not_first_only() {
        let out = normalize(
            &raw(&[("remote", "maybe"), ("endpoint", "never")]),
            &SearchDefaults::default(),
        );
        assert_eq!(out.errors.len(), 2);
    }

    #[test]
    fn test_sorted_pairs_deterministic() {
        let n = NormalizedSearchParams {
            keywords: Some("React".into()),
            location: None,
            remote: Some(false),
            limit: 10,
            endpoint: SearchEndpoint::SevenDays,
        };
        let pairs = n.to_sorted_pairs();
        let keys: Vec<_> = pairs.iter().map(|(k, _)| *k).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}
