//! Response DTOs for the cache gate API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::TtlPolicy;

/// Response body for `GET /`
#[derive(Debug, Clone, Serialize)]
pub struct RootResponse {
    pub message: String,
}

impl RootResponse {
    pub fn running() -> Self {
        Self {
            message: "Cache gate is running.".to_string(),
        }
    }
}

/// Response body for `GET /cache/:category/:id`
#[derive(Debug, Clone, Serialize)]
pub struct GetCacheResponse {
    /// Full cache key
    pub key: String,
    /// The cached value
    pub value: Value,
}

/// Response body for `PUT /cache/:category/:id`
#[derive(Debug, Clone, Serialize)]
pub struct PutCacheResponse {
    pub key: String,
    /// False when the store rejected the write
    pub stored: bool,
    pub policy: TtlPolicy,
    /// Applied TTL in seconds
    pub ttl: u64,
}

/// Response body for `DELETE /cache?pattern=...`
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub pattern: String,
    /// Number of keys removed
    pub deleted: u64,
}

/// Response body for `POST /salon/cache/warm`
#[derive(Debug, Clone, Serialize)]
pub struct WarmResponse {
    /// Keys written successfully
    pub warmed: Vec<String>,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
