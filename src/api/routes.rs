//! API Routes
//!
//! Configures the Axum router with all endpoints and the rate limiter.

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    frequent_appointments_handler, get_cache_handler, health_handler, invalidate_handler,
    metrics_handler, put_cache_handler, root_handler, services_handler, settings_handler,
    warm_handler, AppState,
};
use crate::ratelimit::rate_limit_middleware;

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /` - Service banner
/// - `GET /health` - Health check endpoint
/// - `GET /metrics` - Cache hit/miss and store statistics
/// - `GET|PUT /cache/:category/:id` - Read or write one cache entry
/// - `DELETE /cache?pattern=...` - Pattern invalidation
/// - `GET /salon/appointments/frequent`, `/salon/settings`, `/salon/services`
/// - `POST /salon/cache/warm` - Pre-populate the salon entries
///
/// # Middleware
/// - Rate limiting: every route, per client
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let rate_limit =
        middleware::from_fn_with_state(state.limiter.clone(), rate_limit_middleware);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/cache", delete(invalidate_handler))
        .route(
            "/cache/:category/:id",
            get(get_cache_handler).put(put_cache_handler),
        )
        .route(
            "/salon/appointments/frequent",
            get(frequent_appointments_handler),
        )
        .route("/salon/settings", get(settings_handler))
        .route("/salon/services", get(services_handler))
        .route("/salon/cache/warm", post(warm_handler))
        .layer(rate_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
