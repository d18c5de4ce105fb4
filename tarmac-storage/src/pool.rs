//! Redis connection pool
//!
//! The build queue and the status store share one pool per process.

use deadpool_redis::{Config, Pool, Runtime};
use tracing::info;

use crate::config::RedisConfig;
use crate::error::{StorageError, StorageResult};

/// Create a Redis pool and check that the server answers
///
/// Fails fast when Redis is unreachable; the caller is expected to abort
/// startup rather than retry.
pub async fn connect_redis(config: &RedisConfig) -> StorageResult<Pool> {
    config.validate()?;

    let pool = Config::from_url(&config.url)
        .builder()
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .max_size(config.pool_size)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| StorageError::Connection(e.to_string()))?;

    let mut conn = pool
        .get()
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

    deadpool_redis::redis::cmd("PING").query_async::<String>(&mut *conn).await?;

    info!(pool_size = config.pool_size, "connected to redis");
    Ok(pool)
}
