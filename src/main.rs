//! Smart Cache server
//!
//! Hosts one cache instance and one smart fetcher behind the inspection API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use smart_cache::api::{create_router, AppState};
use smart_cache::cache::FileStorage;
use smart_cache::{spawn_sweep_task, Config};

/// Main entry point for the Smart Cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open file storage and restore the cache snapshot if persistence is on
/// 4. Start background expiry sweep task
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smart_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Smart Cache server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_size={}, default_ttl={}ms, policy={}, persistence={}, port={}, max_concurrent={}",
        config.max_size,
        config.default_ttl_ms,
        config.eviction_policy,
        config.enable_persistence,
        config.server_port,
        config.max_concurrent
    );

    let storage = Arc::new(FileStorage::new(config.storage_dir.clone()));
    let state = AppState::from_config(&config, storage);
    info!(
        entries = state.cache.read().await.len(),
        "Cache initialized"
    );

    let sweep_handle = spawn_sweep_task(
        state.cache.clone(),
        Duration::from_secs(config.sweep_interval),
    );
    info!("Background expiry sweep started");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sweep_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops the sweep task.
async fn shutdown_signal(sweep_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
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

    sweep_handle.abort();
    warn!("Expiry sweep task aborted");
}
