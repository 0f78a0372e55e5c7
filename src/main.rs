//! Storekeeper admin server
//!
//! Opens the persistent store, starts maintenance, and serves the admin API.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storekeeper::{
    create_router, AppState, Config, FileBackend, MemoryBackend, StorageCoordinator,
};

/// Main entry point for the storekeeper admin server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the file-backed store and build the coordinator
/// 4. Start maintenance and the cross-tab change listener
/// 5. Serve the admin API until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storekeeper=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting storekeeper");

    let config = Config::from_env();
    info!(
        "Configuration loaded: prefix={}, max_entries={}, default_ttl={}s, port={}, maintenance_interval={}s, data_file={}",
        config.prefix,
        config.max_entries,
        config.default_ttl,
        config.server_port,
        config.maintenance_interval,
        config.data_file.display()
    );

    let backend = FileBackend::open(&config.data_file)?;
    let coordinator = Arc::new(StorageCoordinator::new(
        config.clone(),
        Arc::new(backend),
        Arc::new(MemoryBackend::new()),
    ));

    coordinator.start_maintenance(config.maintenance_interval());
    coordinator.start_change_listener();
    info!("Background tasks started");

    let app = create_router(AppState::new(coordinator.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    coordinator.shutdown();
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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
