//! Cache Metrics Module
//!
//! Hit/miss counters kept in the store itself, bucketed by time so an
//! external dashboard can aggregate them, plus server-side statistics.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::store::{current_timestamp_ms, KvStore, MAX_EXPIRE_SECS};

pub const HITS_PREFIX: &str = "metrics:cache_hits";
pub const MISSES_PREFIX: &str = "metrics:cache_misses";

// == Cache Stats ==
/// Hit/miss pair with its derived ratio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

impl CacheStats {
    pub fn new(hits: u64, misses: u64) -> Self {
        Self {
            hits,
            misses,
            hit_rate: hit_rate(hits, misses),
        }
    }
}

/// hits / (hits + misses), or 0.0 when nothing was looked up.
pub fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

// == Metrics Snapshot ==
/// Application counters next to what the store reports about itself.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Hits and misses recorded by the cache manager
    pub application: CacheStats,
    /// Keyspace hits and misses reported by the store
    pub keyspace: CacheStats,
    pub connected_clients: u64,
    pub used_memory: String,
}

// == Cache Metrics ==
/// Records cache lookups into per-interval counters in the store.
#[derive(Clone)]
pub struct CacheMetrics {
    store: Arc<dyn KvStore>,
    bucket_secs: u64,
    retention_secs: u64,
}

impl CacheMetrics {
    /// Five-minute buckets retained for one hour.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            bucket_secs: 300,
            retention_secs: 3600,
        }
    }

    pub fn with_window(mut self, bucket_secs: u64, retention_secs: u64) -> Self {
        self.bucket_secs = bucket_secs.max(1);
        self.retention_secs = retention_secs.clamp(1, MAX_EXPIRE_SECS);
        self
    }

    /// Counter key for the bucket containing `now_secs`.
    pub fn bucket_key(&self, prefix: &str, now_secs: u64) -> String {
        format!("{prefix}:{}", now_secs / self.bucket_secs)
    }

    pub async fn track_hit(&self) {
        self.track(HITS_PREFIX).await;
    }

    pub async fn track_miss(&self) {
        self.track(MISSES_PREFIX).await;
    }

    // Metric writes are best effort and never surface to the caller.
    async fn track(&self, prefix: &str) {
        let key = self.bucket_key(prefix, current_timestamp_ms() / 1000);
        if let Err(e) = self.store.incr(&key, 1).await {
            debug!(key = %key, error = %e, "Failed to record cache metric");
            return;
        }
        if let Err(e) = self.store.expire(&key, self.retention_secs).await {
            debug!(key = %key, error = %e, "Failed to set metric retention");
        }
    }

    /// Sums every live bucket and merges in the store's own statistics.
    pub async fn snapshot(&self) -> Result<MetricsSnapshot> {
        let hits = self.sum_buckets(HITS_PREFIX).await?;
        let misses = self.sum_buckets(MISSES_PREFIX).await?;
        let info = self.store.info().await?;

        Ok(MetricsSnapshot {
            application: CacheStats::new(hits, misses),
            keyspace: CacheStats::new(info.keyspace_hits, info.keyspace_misses),
            connected_clients: info.connected_clients,
            used_memory: info.used_memory_human,
        })
    }

    async fn sum_buckets(&self, prefix: &str) -> Result<u64> {
        let mut total = 0;
        for key in self.store.keys(&format!("{prefix}:*")).await? {
            // A bucket may expire between KEYS and GET.
            if let Some(raw) = self.store.get(&key).await? {
                total += raw.parse::<u64>().unwrap_or(0);
            }
        }
        Ok(total)
    }
}
