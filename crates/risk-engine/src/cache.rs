//! Short-TTL memoization of unified risk scores.
//!
//! [`ScoreStore`] is the shared key-value contract (string keys, string values,
//! explicit expiry in seconds). [`RiskCache`] owns key layout and score encoding on
//! top of it. Concurrent misses on the same key may both compute; the last write wins.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

pub const DEFAULT_TTL_SECS: u64 = 600;

const PREVIEW_SENTINEL: &str = "preview";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait ScoreStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set_ex(&self, key: &str, value: String, ttl_secs: u64) -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Instant,
}

/// In-process [`ScoreStore`]. Expiry follows the tokio clock.
#[derive(Debug, Default)]
pub struct MemoryScoreStore {
    entries: DashMap<String, StoredValue>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, stored| stored.expires_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(stored) if stored.expires_at > now => return Ok(Some(stored.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, stored| stored.expires_at <= now);
        }
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: String, ttl_secs: u64) -> Result<(), CacheError> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries
            .insert(key.to_string(), StoredValue { value, expires_at });
        Ok(())
    }
}

#[derive(Clone)]
pub struct RiskCache {
    store: Arc<dyn ScoreStore>,
    ttl_secs: u64,
}

impl RiskCache {
    pub fn new(store: Arc<dyn ScoreStore>, ttl_secs: u64) -> Self {
        Self { store, ttl_secs }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub fn transfer_key(sender_id: &str, recipient_id: &str, amount: Decimal) -> String {
        format!("risk:{sender_id}:{recipient_id}:{}", amount.normalize())
    }

    /// Key for the pre-submission preview, which has no confirmed recipient.
    pub fn preview_key(sender_id: &str, amount: Decimal) -> String {
        format!("risk:{sender_id}:{PREVIEW_SENTINEL}:{}", amount.normalize())
    }

    /// Returns the cached score, treating backend errors and undecodable values as a miss.
    pub async fn lookup(&self, key: &str) -> Option<f64> {
        match self.store.get(key).await {
            Ok(Some(raw)) => match raw.parse::<f64>() {
                Ok(score) if score.is_finite() => {
                    debug!("risk cache hit for {key}");
                    Some(score)
                }
                _ => {
                    warn!("ignoring undecodable cached score {raw:?} for {key}");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!("risk cache read failed, recomputing: {err}");
                None
            }
        }
    }

    pub async fn store(&self, key: &str, score: f64) {
        if let Err(err) = self.store.set_ex(key, score.to_string(), self.ttl_secs).await {
            warn!("risk cache write failed for {key}: {err}");
        }
    }
}
