//! API Handlers
//!
//! HTTP request handlers for the cache admin, metrics and salon endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;
use tracing::info;

use crate::cache::{CacheManager, CacheMetrics, CallArgs, Memoizer, MetricsSnapshot, TtlPolicy};
use crate::config::{Config, StoreBackend};
use crate::error::{GateError, Result};
use crate::models::salon::{self, Appointment, SalonSettings, ServiceOffering};
use crate::models::{
    validate_segment, GetCacheResponse, HealthResponse, InvalidateQuery, InvalidateResponse,
    PutCacheRequest, PutCacheResponse, RootResponse, WarmResponse,
};
use crate::ratelimit::SlidingWindowLimiter;
use crate::store::{KvStore, MemoryStore, RedisStore};

/// Cache category of the memoized salon endpoints
pub const SALON_CATEGORY: &str = "salon";

/// Application state shared across all handlers.
///
/// Every component is built once at startup and injected here; clones
/// share the underlying stores.
#[derive(Clone)]
pub struct AppState {
    pub cache: CacheManager,
    pub memoizer: Memoizer,
    pub limiter: SlidingWindowLimiter,
    pub metrics: CacheMetrics,
    /// In-process stores that need the background expiry sweep
    pub memory_stores: Vec<MemoryStore>,
}

impl AppState {
    /// Wires the components over a cache store and a rate-limit store.
    pub fn new(
        cache_store: Arc<dyn KvStore>,
        limit_store: Arc<dyn KvStore>,
        config: &Config,
    ) -> Self {
        let metrics = CacheMetrics::new(cache_store.clone())
            .with_window(config.metrics_bucket_secs, config.metrics_retention_secs);

        let mut cache = CacheManager::new(cache_store, config.ttl.clone());
        if config.metrics_enabled {
            cache = cache.with_metrics(metrics.clone());
        }

        Self {
            memoizer: Memoizer::new(cache.clone()),
            limiter: SlidingWindowLimiter::new(limit_store, config.rate_limit),
            cache,
            metrics,
            memory_stores: Vec::new(),
        }
    }

    /// State over two fresh in-process stores.
    pub fn in_memory(config: &Config) -> Self {
        let cache_store = MemoryStore::new(config.memory_max_entries);
        let limit_store = MemoryStore::new(config.memory_max_entries);

        let mut state = Self::new(
            Arc::new(cache_store.clone()),
            Arc::new(limit_store.clone()),
            config,
        );
        state.memory_stores = vec![cache_store, limit_store];
        state
    }

    /// Creates the state for the configured backend.
    ///
    /// Cache entries and rate-limit windows live in separate logical
    /// databases. Redis connections are opened on first use.
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.store_backend {
            StoreBackend::Redis => {
                let cache_store = RedisStore::from_url(&config.redis_url(config.cache_db))?;
                let limit_store = RedisStore::from_url(&config.redis_url(config.rate_limit_db))?;
                Ok(Self::new(Arc::new(cache_store), Arc::new(limit_store), config))
            }
            StoreBackend::Memory => Ok(Self::in_memory(config)),
        }
    }
}

// == Cache Admin ==

/// Handler for GET /cache/:category/:id
pub async fn get_cache_handler(
    State(state): State<AppState>,
    Path((category, id)): Path<(String, String)>,
) -> Result<Json<GetCacheResponse>> {
    check_segments(&category, &id)?;

    let key = CacheManager::build_key(&category, &id);
    match state.cache.get::<Value>(&key).await {
        Some(value) => Ok(Json(GetCacheResponse { key, value })),
        None => Err(GateError::NotFound(key)),
    }
}

/// Handler for PUT /cache/:category/:id
///
/// A store failure is reported as `stored: false`, not as an error.
pub async fn put_cache_handler(
    State(state): State<AppState>,
    Path((category, id)): Path<(String, String)>,
    Json(req): Json<PutCacheRequest>,
) -> Result<Json<PutCacheResponse>> {
    check_segments(&category, &id)?;

    let key = CacheManager::build_key(&category, &id);
    let policy = req
        .policy
        .as_deref()
        .map(TtlPolicy::from_name_or_default)
        .unwrap_or_default();
    let stored = state.cache.set(&key, &req.value, policy).await;

    Ok(Json(PutCacheResponse {
        key,
        stored,
        policy,
        ttl: state.cache.ttl_for(policy),
    }))
}

/// Handler for DELETE /cache?pattern=...
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Query(query): Query<InvalidateQuery>,
) -> Result<Json<InvalidateResponse>> {
    if let Some(error_msg) = query.validate() {
        return Err(GateError::InvalidRequest(error_msg));
    }

    let deleted = state.cache.invalidate(&query.pattern).await;
    Ok(Json(InvalidateResponse {
        pattern: query.pattern,
        deleted,
    }))
}

fn check_segments(category: &str, id: &str) -> Result<()> {
    if let Some(error_msg) =
        validate_segment("category", category).or_else(|| validate_segment("id", id))
    {
        return Err(GateError::InvalidRequest(error_msg));
    }
    Ok(())
}

// == Salon Catalog ==

/// Handler for GET /salon/appointments/frequent
pub async fn frequent_appointments_handler(
    State(state): State<AppState>,
) -> Json<Vec<Appointment>> {
    let appointments = state
        .memoizer
        .get_or_compute(
            SALON_CATEGORY,
            "frequent_appointments",
            &CallArgs::new(),
            TtlPolicy::HighRotation,
            || async { salon::frequent_appointments() },
        )
        .await;
    Json(appointments)
}

/// Handler for GET /salon/settings
pub async fn settings_handler(State(state): State<AppState>) -> Json<SalonSettings> {
    let settings = state
        .memoizer
        .get_or_compute(
            SALON_CATEGORY,
            "salon_settings",
            &CallArgs::new(),
            TtlPolicy::Stable,
            || async { salon::salon_settings() },
        )
        .await;
    Json(settings)
}

/// Handler for GET /salon/services
pub async fn services_handler(State(state): State<AppState>) -> Json<Vec<ServiceOffering>> {
    let services = state
        .memoizer
        .get_or_compute(
            SALON_CATEGORY,
            "service_catalog",
            &CallArgs::new(),
            TtlPolicy::Reference,
            || async { salon::service_catalog() },
        )
        .await;
    Json(services)
}

/// Handler for POST /salon/cache/warm
pub async fn warm_handler(State(state): State<AppState>) -> Json<WarmResponse> {
    let warmed = warm_salon_cache(&state.memoizer).await;
    Json(WarmResponse { warmed })
}

/// Writes the agenda and catalog under the keys the salon endpoints read,
/// returning the keys that were stored.
pub async fn warm_salon_cache(memoizer: &Memoizer) -> Vec<String> {
    let args = CallArgs::new();
    let cache = memoizer.cache();
    let mut warmed = Vec::new();

    let key = memoizer.key(SALON_CATEGORY, "frequent_appointments", &args);
    if cache
        .set(&key, &salon::frequent_appointments(), TtlPolicy::HighRotation)
        .await
    {
        warmed.push(key);
    }

    let key = memoizer.key(SALON_CATEGORY, "service_catalog", &args);
    if cache
        .set(&key, &salon::service_catalog(), TtlPolicy::Reference)
        .await
    {
        warmed.push(key);
    }

    info!(count = warmed.len(), "Salon cache warmed");
    warmed
}

// == Service ==

/// Handler for GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Result<Json<MetricsSnapshot>> {
    Ok(Json(state.metrics.snapshot().await?))
}

/// Handler for GET /
pub async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse::running())
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
