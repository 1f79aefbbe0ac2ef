//! Error types for the cache gate
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Gate Error Enum ==
/// Unified error type for the cache and rate-limiting layer.
#[derive(Error, Debug)]
pub enum GateError {
    /// Key-value store unreachable or a command failed
    #[error("Store error: {0}")]
    Store(String),

    /// Value could not be encoded or decoded as JSON
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Client exceeded its request budget for the current window
    #[error("Too many requests. Try again in {retry_after} seconds.")]
    RateLimited { retry_after: u64 },

    /// Cache key not present
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<redis::RedisError> for GateError {
    fn from(err: redis::RedisError) -> Self {
        GateError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for GateError {
    fn from(err: serde_json::Error) -> Self {
        GateError::Serialization(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = match &self {
            GateError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            GateError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GateError::NotFound(_) => StatusCode::NOT_FOUND,
            GateError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GateError::Serialization(_) | GateError::Config(_) | GateError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let retry_after = match &self {
            GateError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache gate.
pub type Result<T> = std::result::Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = vec![
            (GateError::Store("down".into()), StatusCode::SERVICE_UNAVAILABLE),
            (GateError::Serialization("bad".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (GateError::RateLimited { retry_after: 60 }, StatusCode::TOO_MANY_REQUESTS),
            (GateError::NotFound("k".into()), StatusCode::NOT_FOUND),
            (GateError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (GateError::Config("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (GateError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = GateError::RateLimited { retry_after: 10 }.into_response();
        let retry = response.headers().get(header::RETRY_AFTER).unwrap();
        assert_eq!(retry.to_str().unwrap(), "10");
    }

    #[test]
    fn test_rate_limited_message() {
        let err = GateError::RateLimited { retry_after: 10 };
        assert_eq!(
            err.to_string(),
            "Too many requests. Try again in 10 seconds."
        );
    }
}
