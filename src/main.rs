//! Cache Gate - Response caching and rate limiting over Redis
//!
//! Serves the cache admin, metrics and salon catalog endpoints behind the
//! sliding-window rate limiter.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache_gate::api::{create_router, warm_salon_cache};
use cache_gate::{spawn_cleanup_task, spawn_metrics_reporter, AppState, Config};

/// Main entry point for the cache gate server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the stores, cache manager, memoizer and rate limiter
/// 4. Start background tasks (expiry sweep, metrics reporter)
/// 5. Optionally warm the salon cache entries
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cache_gate=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cache gate");

    let config = Config::from_env();
    info!(
        backend = ?config.store_backend,
        redis = %config.redis_url(config.cache_db),
        requests_limit = config.rate_limit.requests_limit,
        window_size = config.rate_limit.window_size,
        port = config.server_port,
        "Configuration loaded"
    );

    let state = AppState::from_config(&config).context("failed to initialize stores")?;
    info!("Stores initialized");

    let mut background: Vec<JoinHandle<()>> = Vec::new();
    if !state.memory_stores.is_empty() {
        background.push(spawn_cleanup_task(
            state.memory_stores.clone(),
            config.cleanup_interval,
        ));
        info!("Background expiry sweep started");
    }
    if config.metrics_report_interval > 0 {
        background.push(spawn_metrics_reporter(
            state.metrics.clone(),
            config.metrics_report_interval,
        ));
        info!("Metrics reporter started");
    }

    if config.warm_cache_on_start {
        warm_salon_cache(&state.memoizer).await;
    }

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    // Peer addresses feed the rate limiter's client key
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(background))
    .await
    .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then aborts the
/// background tasks.
async fn shutdown_signal(background: Vec<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    for handle in background {
        handle.abort();
    }
    warn!("Background tasks aborted");
}
