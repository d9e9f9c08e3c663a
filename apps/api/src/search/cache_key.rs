//! Deterministic cache keys. A key is a pure function of the *normalized*
//! parameter set plus a user scope, so semantically equal searches always
//! collide and different users never do.

use uuid::Uuid;

use crate::search::params::NormalizedSearchParams;

/// Builds the cache key for a normalized search. Scope prefix keeps cached
/// results from leaking across users; anonymous traffic shares one bucket.
pub fn cache_key(params: &NormalizedSearchParams, user_scope: Option<Uuid>) -> String {
    let scope = match user_scope {
        Some(id) => format!("user:{id}:"),
        None => "anon:".to_string(),
    };
    let body = params
        .to_sorted_pairs()
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{scope}search:{body}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::params::{normalize, SearchDefaults};

    fn raw(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn norm(pairs: &[(&str, &str)]) -> NormalizedSearchParams {
        normalize(&raw(pairs), &SearchDefaults::default())
            .normalized
            .expect("valid params")
    }

    #[test]
    fn test_default_fill_equals_explicit() {
        // Omitting `limit` (default 10) must hash the same as limit=10.
        let implicit = norm(&[("keywords", "React")]);
        let explicit = norm(&[("keywords", "React"), ("limit", "10")]);
        assert_eq!(cache_key(&implicit, None), cache_key(&explicit, None));
    }

    #[test]
    fn test_insertion_order_independent() {
        let a = norm(&[("keywords", "React"), ("location", "Berlin")]);
        let b = norm(&[("location", "Berlin"), ("keywords", "React")]);
        assert_eq!(cache_key(&a, None), cache_key(&b, None));
    }

    #[test]
    fn test_user_scope_separates_users() {
        let n = norm(&[("keywords", "React")]);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        assert_ne!(cache_key(&n, Some(alice)), cache_key(&n, Some(bob)));
        assert_ne!(cache_key(&n, Some(alice)), cache_key(&n, None));
    }

    #[test]
    fn test_anon_prefix() {
        let n = norm(&[]);
        assert!(cache_key(&n, None).starts_with("anon:search:"));
    }

    #[test]
    fn test_different_params_different_keys() {
        let a = norm(&[("keywords", "React")]);
        let b = norm(&[("keywords", "Rust")]);
        assert_ne!(cache_key(&a, None), cache_key(&b, None));

        let c = norm(&[("keywords", "React"), ("endpoint", "24h")]);
        assert_ne!(cache_key(&a, None), cache_key(&c, None));
    }
}
