//! Build queue
//!
//! A durable FIFO of deployment ids. Producers push to the head, consumers
//! block on the tail. Entries carry nothing but the id, there is no priority
//! and no visibility timeout: a consumer that dies after popping loses the
//! job.

use std::collections::VecDeque;

use async_trait::async_trait;
use deadpool_redis::Pool;
use deadpool_redis::redis::AsyncCommands;
use tarmac_core::keys::BUILD_QUEUE;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::error::{StorageError, StorageResult};

#[async_trait]
pub trait BuildQueue: Send + Sync {
    /// Appends a deployment id
    async fn push(&self, id: &str) -> StorageResult<()>;

    /// Removes the oldest deployment id, waiting as long as it takes for one
    async fn pop(&self) -> StorageResult<String>;
}

/// Redis list backed queue (`LPUSH` / `BRPOP`)
#[derive(Clone)]
pub struct RedisQueue {
    pool: Pool,
    name: String,
}

impl RedisQueue {
    /// Queue on the shared `build-queue` list
    pub fn new(pool: Pool) -> Self {
        Self::with_name(pool, BUILD_QUEUE)
    }

    pub fn with_name(pool: Pool, name: impl Into<String>) -> Self {
        Self {
            pool,
            name: name.into(),
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
impl BuildQueue for RedisQueue {
    async fn push(&self, id: &str) -> StorageResult<()> {
        let mut conn = self.connection().await?;
        let _: i64 = conn.lpush(&self.name, id).await?;
        debug!(queue = %self.name, id = %id, "pushed build job");
        Ok(())
    }

    async fn pop(&self) -> StorageResult<String> {
        let mut conn = self.connection().await?;

        loop {
            // A zero timeout blocks until an element arrives.
            let popped: Option<(String, String)> = conn.brpop(&self.name, 0.0).await?;
            if let Some((_, id)) = popped {
                debug!(queue = %self.name, id = %id, "popped build job");
                return Ok(id);
            }
        }
    }
}

/// In-process queue with the same ordering as the Redis one
#[derive(Default)]
pub struct MemoryQueue {
    items: Mutex<VecDeque<String>>,
    notify: Notify,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }
}

#[async_trait]
impl BuildQueue for MemoryQueue {
    async fn push(&self, id: &str) -> StorageResult<()> {
        self.items.lock().await.push_front(id.to_string());
        self.notify.notify_one();
        Ok(())
    }

    async fn pop(&self) -> StorageResult<String> {
        loop {
            let notified = self.notify.notified();
            if let Some(id) = self.items.lock().await.pop_back() {
                return Ok(id);
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_memory_queue_is_fifo() {
        let queue = MemoryQueue::new();
        queue.push("first").await.unwrap();
        queue.push("second").await.unwrap();
        queue.push("third").await.unwrap();

        assert_eq!(queue.pop().await.unwrap(), "first");
        assert_eq!(queue.pop().await.unwrap(), "second");
        assert_eq!(queue.pop().await.unwrap(), "third");
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = Arc::new(MemoryQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        queue.push("late").await.unwrap();
        let id = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(id, "late");
    }

    #[tokio::test]
    async fn test_each_id_delivered_once() {
        let queue = Arc::new(MemoryQueue::new());
        for i in 0..10 {
            queue.push(&format!("id-{i}")).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..10 {
            let queue = Arc::clone(&queue);
            handles.push(tokio::spawn(async move { queue.pop().await.unwrap() }));
        }

        let mut seen = Vec::new();
        for handle in handles {
            seen.push(handle.await.unwrap());
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 10);
    }
}
