//! Mini HTTP Cache - caching gateway server
//!
//! Serves origin resources through the persistent disk cache.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mini_http_cache::api::create_router;
use mini_http_cache::{spawn_sweep_task, AppState, Config, ReqwestTransport, SharedTransport};

/// Main entry point for the caching gateway.
///
/// # Startup Sequence
/// 1. Load configuration from environment variables
/// 2. Initialize tracing subscriber for logging
/// 3. Open the cache directory behind a reqwest origin transport
/// 4. Start the periodic eviction sweep
/// 5. Serve the Axum router until SIGINT/SIGTERM
/// 6. Run a final sweep before exiting
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    // Defaults to "info", "debug" for the cache when verbose; RUST_LOG overrides
    let default_filter = if config.cache.verbose {
        "mini_http_cache=debug,tower_http=info"
    } else {
        "mini_http_cache=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Mini HTTP Cache");
    info!(
        "Configuration loaded: base_path={}, max_age={}h, no_update={}s, port={}, sweep_interval={}s",
        config.cache.base_path.display(),
        config.cache.max_age_hours,
        config.cache.no_update_secs,
        config.server_port,
        config.sweep_interval
    );

    let origin: SharedTransport = Arc::new(ReqwestTransport::new());
    let state = AppState::from_config(&config, origin).context("Failed to open cache")?;

    let sweep_handle = (config.sweep_interval > 0)
        .then(|| spawn_sweep_task(state.cache.clone(), config.sweep_interval));

    let cache = state.cache.clone();
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(handle) = sweep_handle {
        handle.abort();
        warn!("Sweep task aborted");
    }

    // Closing the cache: one last sweep
    match cache.sweep().await {
        Ok(report) => info!("Final sweep removed {} entries", report.removed),
        Err(e) => warn!("Final sweep failed: {}", e),
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
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
}
