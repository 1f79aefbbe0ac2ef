//! Sliding Window Limiter Module
//!
//! Counts each client's requests in a sorted set scored by arrival time.
//! Entries older than the window are pruned before counting, so the
//! window slides with the clock instead of resetting on fixed boundaries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::store::{KvStore, MAX_EXPIRE_SECS};

/// Default prefix for per-client window keys
pub const DEFAULT_KEY_PREFIX: &str = "ratelimit";

// == Rate Limit Config ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests admitted per window
    pub requests_limit: u64,
    /// Window length in seconds
    pub window_size: u64,
}

impl RateLimitConfig {
    /// The window is at least one second, since a zero expiry would delete
    /// the window key on every request, and at most `MAX_EXPIRE_SECS`.
    pub fn new(requests_limit: u64, window_size: u64) -> Self {
        Self {
            requests_limit,
            window_size: window_size.clamp(1, MAX_EXPIRE_SECS),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(100, 60)
    }
}

// == Rate Limit Decision ==
/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Request recorded; `count` includes it.
    Allowed { count: u64, remaining: u64 },
    /// Window already full; the request was not recorded.
    Limited { count: u64, retry_after: u64 },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

// == Sliding Window Limiter ==
/// Per-client sliding-window limiter backed by the shared store.
///
/// Prune, count and record are three separate round trips with no
/// transaction around them. Concurrent requests from one client can all
/// observe the same count, so a burst may be admitted past the limit by
/// up to the number of requests in flight. This approximation is accepted.
#[derive(Clone)]
pub struct SlidingWindowLimiter {
    store: Arc<dyn KvStore>,
    config: RateLimitConfig,
    key_prefix: String,
    /// Shared by clones; keeps window members distinct within the process
    sequence: Arc<AtomicU64>,
}

impl SlidingWindowLimiter {
    pub fn new(store: Arc<dyn KvStore>, config: RateLimitConfig) -> Self {
        Self {
            store,
            config,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Store key holding `client_key`'s window.
    pub fn window_key(&self, client_key: &str) -> String {
        format!("{}:{client_key}", self.key_prefix)
    }

    /// Checks and, when admitted, records a request at the current time.
    pub async fn check(&self, client_key: &str, path: &str) -> Result<RateLimitDecision> {
        self.check_at(client_key, path, now_secs()).await
    }

    /// Checks and records a request arriving at `now` (Unix seconds).
    ///
    /// An entry scored exactly `now - window_size` is already outside the
    /// window.
    pub async fn check_at(
        &self,
        client_key: &str,
        path: &str,
        now: f64,
    ) -> Result<RateLimitDecision> {
        let key = self.window_key(client_key);
        let window_start = now - self.config.window_size as f64;

        self.store
            .zrembyscore(&key, f64::NEG_INFINITY, window_start)
            .await?;
        let count = self.store.zcard(&key).await?;

        if count >= self.config.requests_limit {
            debug!(client = client_key, count, "Request over limit");
            return Ok(RateLimitDecision::Limited {
                count,
                retry_after: self.config.window_size,
            });
        }

        // Requests arriving in the same microsecond still get distinct members.
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let member = format!("{now:.6}:{seq}:{path}");
        self.store.zadd(&key, &member, now).await?;
        self.store.expire(&key, self.config.window_size).await?;

        let count = count + 1;
        Ok(RateLimitDecision::Allowed {
            count,
            remaining: self.config.requests_limit.saturating_sub(count),
        })
    }
}

/// Current Unix time in seconds with microsecond resolution.
pub fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
