//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;

use crate::cache::{TtlPolicy, TtlTable};
use crate::error::GateError;
use crate::ratelimit::RateLimitConfig;

// == Store Backend ==
/// Which key-value store the server talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// External Redis server
    Redis,
    /// In-process store, for local runs without Redis
    Memory,
}

impl FromStr for StoreBackend {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            other => Err(GateError::Config(format!("unknown store backend '{other}'"))),
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Store backend
    pub store_backend: StoreBackend,
    /// Redis host name
    pub redis_host: String,
    /// Redis port
    pub redis_port: u16,
    /// Logical database for cache entries and metrics
    pub cache_db: u8,
    /// Logical database for rate-limit windows
    pub rate_limit_db: u8,
    /// Requests admitted per window and window length
    pub rate_limit: RateLimitConfig,
    /// Policy durations
    pub ttl: TtlTable,
    /// Record cache hits and misses
    pub metrics_enabled: bool,
    /// Width of a metrics bucket in seconds
    pub metrics_bucket_secs: u64,
    /// Lifetime of a metrics bucket in seconds
    pub metrics_retention_secs: u64,
    /// Interval of the metrics log report in seconds, 0 disables it
    pub metrics_report_interval: u64,
    /// Capacity of each in-memory store
    pub memory_max_entries: usize,
    /// Expiry sweep interval for the in-memory store in seconds
    pub cleanup_interval: u64,
    /// Pre-populate the demo catalog entries at startup
    pub warm_cache_on_start: bool,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 8000)
    /// - `STORE_BACKEND` - `redis` or `memory` (default: redis)
    /// - `REDIS_HOST` / `REDIS_PORT` - Redis address (default: localhost:6379)
    /// - `CACHE_DB` / `RATE_LIMIT_DB` - logical databases (default: 0 / 1)
    /// - `RATE_LIMIT_REQUESTS` / `RATE_LIMIT_WINDOW` - limiter (default: 100 per 60s)
    /// - `CACHE_TTL_HIGH_ROTATION`, `CACHE_TTL_STABLE`, `CACHE_TTL_REFERENCE`,
    ///   `CACHE_TTL_EPHEMERAL` - policy overrides in seconds
    /// - `METRICS_ENABLED` (default: true), `METRICS_BUCKET_SECS` (300),
    ///   `METRICS_RETENTION_SECS` (3600), `METRICS_REPORT_INTERVAL` (0)
    /// - `MEMORY_MAX_ENTRIES` (10000), `CLEANUP_INTERVAL` (1)
    /// - `WARM_CACHE_ON_START` (false)
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut ttl = TtlTable::new();
        for (var, policy) in [
            ("CACHE_TTL_HIGH_ROTATION", TtlPolicy::HighRotation),
            ("CACHE_TTL_STABLE", TtlPolicy::Stable),
            ("CACHE_TTL_REFERENCE", TtlPolicy::Reference),
            ("CACHE_TTL_EPHEMERAL", TtlPolicy::Ephemeral),
        ] {
            if let Some(seconds) = env::var(var).ok().and_then(|v| v.trim().parse().ok()) {
                ttl = ttl.with_override(policy, seconds);
            }
        }

        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            store_backend: env_or("STORE_BACKEND", defaults.store_backend),
            redis_host: env::var("REDIS_HOST").unwrap_or(defaults.redis_host),
            redis_port: env_or("REDIS_PORT", defaults.redis_port),
            cache_db: env_or("CACHE_DB", defaults.cache_db),
            rate_limit_db: env_or("RATE_LIMIT_DB", defaults.rate_limit_db),
            rate_limit: RateLimitConfig::new(
                env_or("RATE_LIMIT_REQUESTS", defaults.rate_limit.requests_limit),
                env_or("RATE_LIMIT_WINDOW", defaults.rate_limit.window_size),
            ),
            ttl,
            metrics_enabled: env_or("METRICS_ENABLED", defaults.metrics_enabled),
            metrics_bucket_secs: env_or("METRICS_BUCKET_SECS", defaults.metrics_bucket_secs),
            metrics_retention_secs: env_or(
                "METRICS_RETENTION_SECS",
                defaults.metrics_retention_secs,
            ),
            metrics_report_interval: env_or(
                "METRICS_REPORT_INTERVAL",
                defaults.metrics_report_interval,
            ),
            memory_max_entries: env_or("MEMORY_MAX_ENTRIES", defaults.memory_max_entries),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            warm_cache_on_start: env_or("WARM_CACHE_ON_START", defaults.warm_cache_on_start),
        }
    }

    /// Connection URL for logical database `db`.
    pub fn redis_url(&self, db: u8) -> String {
        format!("redis://{}:{}/{}", self.redis_host, self.redis_port, db)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 8000,
            store_backend: StoreBackend::Redis,
            redis_host: "localhost".to_string(),
            redis_port: 6379,
            cache_db: 0,
            rate_limit_db: 1,
            rate_limit: RateLimitConfig::default(),
            ttl: TtlTable::default(),
            metrics_enabled: true,
            metrics_bucket_secs: 300,
            metrics_retention_secs: 3600,
            metrics_report_interval: 0,
            memory_max_entries: 10_000,
            cleanup_interval: 1,
            warm_cache_on_start: false,
        }
    }
}
