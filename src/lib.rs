//! Cache Gate - Response caching and rate limiting over Redis
//!
//! Provides namespaced JSON caching with TTL policies, memoization of
//! operations, and a per-client sliding-window rate limiter for axum.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod ratelimit;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use error::{GateError, Result};
pub use tasks::{spawn_cleanup_task, spawn_metrics_reporter};
