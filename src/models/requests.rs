//! Request DTOs for the cache gate API
//!
//! Defines the structure of incoming HTTP request bodies and queries.

use serde::Deserialize;
use serde_json::Value;

/// Maximum allowed length of a category or identifier path segment
pub const MAX_SEGMENT_LENGTH: usize = 256;

/// Request body for `PUT /cache/:category/:id`
#[derive(Debug, Clone, Deserialize)]
pub struct PutCacheRequest {
    /// JSON value to cache
    pub value: Value,
    /// Policy name; unknown or missing names use the default policy
    #[serde(default)]
    pub policy: Option<String>,
}

/// Query string for `DELETE /cache`
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateQuery {
    pub pattern: String,
}

impl InvalidateQuery {
    /// Returns an error message if validation fails, None if valid.
    ///
    /// Patterns must stay inside the cache namespace so metrics and
    /// rate-limit state cannot be wiped through this endpoint.
    pub fn validate(&self) -> Option<String> {
        if self.pattern.trim().is_empty() {
            return Some("Pattern cannot be empty".to_string());
        }
        if !self.pattern.starts_with("cache:") {
            return Some("Pattern must start with 'cache:'".to_string());
        }
        None
    }
}

/// Validates a `category` or `id` path segment.
pub fn validate_segment(name: &str, segment: &str) -> Option<String> {
    if segment.is_empty() {
        return Some(format!("{name} cannot be empty"));
    }
    if segment.len() > MAX_SEGMENT_LENGTH {
        return Some(format!(
            "{name} exceeds maximum length of {MAX_SEGMENT_LENGTH} characters"
        ));
    }
    None
}
