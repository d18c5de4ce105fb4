use std::sync::Arc;

use anyhow::Context;
use tarmac_server::api;
use tarmac_server::config::Config;
use tarmac_server::content::ContentService;
use tarmac_storage::{RedisConfig, RedisStatusStore, StorageConfig, connect_redis, create_object_store};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tarmac_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tarmac content server...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let storage_config = StorageConfig::from_env().context("Failed to load storage configuration")?;
    let store = create_object_store(&storage_config).context("Failed to create object store")?;

    let mut service = ContentService::new(store);

    // Diagnostics only; the server works without Redis.
    if config.status_diagnostics {
        match connect_redis(&RedisConfig::from_env()).await {
            Ok(pool) => service = service.with_status(Arc::new(RedisStatusStore::new(pool))),
            Err(e) => warn!("Status diagnostics disabled: {}", e),
        }
    }

    let app = api::create_router(Arc::new(service));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Content server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
