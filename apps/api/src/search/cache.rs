//! Response cache for upstream payloads. Each entry snapshots the usage
//! headers captured at write time so a hit can replay them without touching
//! the provider. Entries expire by TTL; they are never deleted mid-flight by
//! a concurrent writer, and a put is all-or-nothing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::search::params::NormalizedSearchParams;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache entry corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// One cached upstream response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub normalized_params: NormalizedSearchParams,
    pub payload: serde_json::Value,
    pub usage_headers: BTreeMap<String, String>,
    pub written_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone)]
pub struct CacheHit {
    pub entry: CacheEntry,
    pub age_secs: u64,
}

#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Fresh hit or nothing. An expired entry is a miss.
    async fn get(&self, key: &str) -> Result<Option<CacheHit>, CacheError>;

    /// Last writer wins, including over a still-fresh entry.
    async fn put(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError>;
}

pub type DynResponseCache = Arc<dyn ResponseCache>;

fn entry_age_secs(entry: &CacheEntry, now: DateTime<Utc>) -> u64 {
    (now - entry.written_at).num_seconds().max(0) as u64
}

/// In-process cache. The RwLock makes each put atomic with respect to
/// readers; a reader sees either the old entry or the new one, never a
/// half-written mix.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Freshness check against an explicit clock; `get` supplies `Utc::now()`.
    async fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<CacheHit> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        let age_secs = entry_age_secs(entry, now);
        if age_secs < entry.ttl_secs {
            Some(CacheHit {
                entry: entry.clone(),
                age_secs,
            })
        } else {
            None
        }
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<CacheHit>, CacheError> {
        Ok(self.get_at(key, Utc::now()).await)
    }

    async fn put(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }
}

/// Redis-backed cache for multi-instance deployments. `SET .. EX ttl` makes
/// the write atomic and lets Redis expire entries on its own; the freshness
/// check on read is kept anyway so clock skew cannot serve a stale entry.
pub struct RedisCache {
    conn: redis::aio::MultiplexedConnection,
}

impl RedisCache {
    pub async fn connect(client: &redis::Client) -> Result<Self, CacheError> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl ResponseCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<CacheHit>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let entry: CacheEntry = serde_json::from_str(&raw)?;
        let age_secs = entry_age_secs(&entry, Utc::now());
        if age_secs < entry.ttl_secs {
            Ok(Some(CacheHit { entry, age_secs }))
        } else {
            Ok(None)
        }
    }

    async fn put(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let raw = serde_json::to_string(&entry)?;
        conn.set_ex::<_, _, ()>(key, raw, entry.ttl_secs).await?;
        Ok(())
    }
}
