//! Status store
//!
//! Shared map from deployment id to status string. Writes are
//! last-write-wins with no history and no expiry.

use std::collections::HashMap;

use async_trait::async_trait;
use deadpool_redis::Pool;
use deadpool_redis::redis::AsyncCommands;
use tarmac_core::domain::deployment::DeploymentStatus;
use tarmac_core::keys::STATUS_HASH;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{StorageError, StorageResult};

#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn set(&self, id: &str, status: DeploymentStatus) -> StorageResult<()>;

    /// Returns the stored string verbatim, or `None` for an unknown id
    async fn get(&self, id: &str) -> StorageResult<Option<String>>;
}

/// Redis hash backed status store (`HSET` / `HGET`)
#[derive(Clone)]
pub struct RedisStatusStore {
    pool: Pool,
    hash: String,
}

impl RedisStatusStore {
    /// Store on the shared `status` hash
    pub fn new(pool: Pool) -> Self {
        Self::with_name(pool, STATUS_HASH)
    }

    pub fn with_name(pool: Pool, hash: impl Into<String>) -> Self {
        Self {
            pool,
            hash: hash.into(),
        }
    }

    async fn connection(&self) -> StorageResult<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl StatusStore for RedisStatusStore {
    async fn set(&self, id: &str, status: DeploymentStatus) -> StorageResult<()> {
        let mut conn = self.connection().await?;
        let _: i64 = conn.hset(&self.hash, id, status.as_str()).await?;
        debug!(id = %id, status = %status, "status updated");
        Ok(())
    }

    async fn get(&self, id: &str) -> StorageResult<Option<String>> {
        let mut conn = self.connection().await?;
        let status: Option<String> = conn.hget(&self.hash, id).await?;
        Ok(status)
    }
}

/// In-process status store
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an arbitrary string, bypassing the status enum
    pub async fn set_raw(&self, id: &str, value: &str) {
        self.entries
            .write()
            .await
            .insert(id.to_string(), value.to_string());
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn set(&self, id: &str, status: DeploymentStatus) -> StorageResult<()> {
        self.set_raw(id, status.as_str()).await;
        Ok(())
    }

    async fn get(&self, id: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.read().await.get(id).cloned())
    }
}
