//! API Module
//!
//! HTTP handlers and routing for the cache gate REST API.
//!
//! # Endpoints
//! - `GET /` - Service banner
//! - `GET /health` - Health check endpoint
//! - `GET /metrics` - Cache metrics snapshot
//! - `GET /cache/:category/:id` - Read a cached value
//! - `PUT /cache/:category/:id` - Write a value under a TTL policy
//! - `DELETE /cache?pattern=...` - Invalidate matching keys
//! - `GET /salon/...` - Memoized salon catalog
//! - `POST /salon/cache/warm` - Warm the salon entries

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
