use std::sync::Arc;

use anyhow::Context;
use tarmac_storage::{
    ObjectMirror, RedisConfig, RedisQueue, RedisStatusStore, StorageConfig, connect_redis,
    create_object_store,
};
use tarmac_upload::api;
use tarmac_upload::config::Config;
use tarmac_upload::service::DeployService;
use tarmac_upload::source::GitFetcher;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tarmac_upload=info,tarmac_storage=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tarmac upload service...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let storage_config = StorageConfig::from_env().context("Failed to load storage configuration")?;
    let store = create_object_store(&storage_config).context("Failed to create object store")?;

    let redis_config = RedisConfig::from_env();
    let pool = connect_redis(&redis_config)
        .await
        .context("Failed to connect to Redis")?;

    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .with_context(|| format!("Failed to create work dir {}", config.work_dir.display()))?;

    let service = DeployService::new(
        &config,
        ObjectMirror::new(store),
        Arc::new(RedisQueue::new(pool.clone())),
        Arc::new(RedisStatusStore::new(pool)),
        Arc::new(GitFetcher::new(config.clone_timeout)),
    );

    let app = api::create_router(Arc::new(service));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Upload service stopped");
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
