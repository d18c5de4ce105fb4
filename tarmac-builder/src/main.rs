//! Tarmac Builder
//!
//! Consumes the build queue until Ctrl+C or SIGTERM. The current build is
//! allowed to finish before the process exits.

use std::sync::Arc;

use anyhow::{Context, Result};
use tarmac_builder::config::Config;
use tarmac_builder::scheduler::QueueConsumer;
use tarmac_builder::service::{BuildPipeline, ShellBuildExecutor};
use tarmac_storage::{
    ObjectMirror, RedisConfig, RedisQueue, RedisStatusStore, StorageConfig, connect_redis,
    create_object_store,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tarmac_builder=info,tarmac_storage=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tarmac builder");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    info!(
        "Loaded configuration: command={:?}, output_dir={}, timeout={:?}",
        config.build_command, config.output_dir, config.build_timeout
    );

    let storage_config = StorageConfig::from_env().context("Failed to load storage configuration")?;
    let store = create_object_store(&storage_config).context("Failed to create object store")?;

    let pool = connect_redis(&RedisConfig::from_env())
        .await
        .context("Failed to connect to Redis")?;

    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .with_context(|| format!("Failed to create work dir {}", config.work_dir.display()))?;

    let pipeline = Arc::new(BuildPipeline::new(
        &config,
        ObjectMirror::new(store),
        Arc::new(RedisStatusStore::new(pool.clone())),
        Arc::new(ShellBuildExecutor::new(
            config.build_command.clone(),
            config.build_timeout,
        )),
    ));

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let consumer = QueueConsumer::new(
        Arc::new(RedisQueue::new(pool)),
        pipeline,
        config.retry_interval,
        shutdown,
    );

    consumer.run().await;

    info!("Builder stopped");
    Ok(())
}

async fn cancel_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
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
        () = ctrl_c => info!("Received Ctrl+C, finishing current build"),
        () = terminate => info!("Received SIGTERM, finishing current build"),
    }

    shutdown.cancel();
}
