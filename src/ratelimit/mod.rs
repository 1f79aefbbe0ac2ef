//! Rate Limiting Module
//!
//! Sliding-window request limiting per client, and the axum middleware
//! that enforces it.

mod limiter;
mod middleware;

pub use limiter::{
    now_secs, RateLimitConfig, RateLimitDecision, SlidingWindowLimiter, DEFAULT_KEY_PREFIX,
};
pub use middleware::{client_key, rate_limit_middleware, LIMIT_HEADER, REMAINING_HEADER};
