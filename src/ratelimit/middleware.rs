//! Rate Limiting Middleware
//!
//! Axum middleware that runs every request through the
//! [`SlidingWindowLimiter`] before it reaches a handler.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::error::GateError;
use crate::ratelimit::{RateLimitDecision, SlidingWindowLimiter};

pub const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

const UNKNOWN_CLIENT: &str = "unknown";

/// Identifies the caller: peer address, then the first `X-Forwarded-For`
/// hop, then a shared `"unknown"` bucket.
pub fn client_key(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Rejects over-limit clients with `429 Too Many Requests`.
///
/// Store failures fail open: the request proceeds and a warning is logged.
/// A request that is recorded and then cancelled still counts against the
/// client.
pub async fn rate_limit_middleware(
    State(limiter): State<SlidingWindowLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);
    let path = request.uri().path().to_string();

    match limiter.check(&client, &path).await {
        Ok(RateLimitDecision::Allowed { remaining, .. }) => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(
                LIMIT_HEADER,
                HeaderValue::from(limiter.config().requests_limit),
            );
            headers.insert(REMAINING_HEADER, HeaderValue::from(remaining));
            response
        }
        Ok(RateLimitDecision::Limited { count, retry_after }) => {
            debug!(client = %client, path = %path, count, "Rate limit exceeded");
            GateError::RateLimited { retry_after }.into_response()
        }
        Err(e) => {
            warn!(client = %client, error = %e, "Rate limiter unavailable, allowing request");
            next.run(request).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::RateLimitConfig;
    use crate::store::MemoryStore;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Router,
    };
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn app(limit: u64, window: u64) -> Router {
        let store = MemoryStore::new(1000);
        let limiter =
            SlidingWindowLimiter::new(Arc::new(store), RateLimitConfig::new(limit, window));
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(from_fn_with_state(limiter, rate_limit_middleware))
    }

    fn request_from(ip: [u8; 4]) -> HttpRequest<Body> {
        let mut request = HttpRequest::builder()
            .uri("/ping")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((ip, 40000))));
        request
    }

    #[test]
    fn test_client_key_prefers_peer_address() {
        let mut request = request_from([10, 0, 0, 1]);
        request
            .headers_mut()
            .insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4"));
        assert_eq!(client_key(&request), "10.0.0.1");
    }

    #[test]
    fn test_client_key_forwarded_for() {
        let request = HttpRequest::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&request), "203.0.113.9");
    }

    #[test]
    fn test_client_key_unknown() {
        let request = HttpRequest::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&request), "unknown");
    }

    #[tokio::test]
    async fn test_allowed_response_carries_headers() {
        let response = app(3, 10).oneshot(request_from([10, 0, 0, 1])).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[&LIMIT_HEADER], "3");
        assert_eq!(response.headers()[&REMAINING_HEADER], "2");
    }

    #[tokio::test]
    async fn test_over_limit_returns_429() {
        let app = app(2, 10);

        for _ in 0..2 {
            let response = app.clone().oneshot(request_from([10, 0, 0, 1])).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.clone().oneshot(request_from([10, 0, 0, 1])).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "10");

        let response = app.oneshot(request_from([10, 0, 0, 2])).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
