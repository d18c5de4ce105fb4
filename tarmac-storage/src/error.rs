//! Error types for storage operations

use thiserror::Error;

/// Result type alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Errors raised by object storage, the build queue and the status store
#[derive(Debug, Error)]
pub enum StorageError {
    /// Configuration is missing or inconsistent
    #[error("invalid storage configuration: {0}")]
    Config(String),

    /// A key or local path would resolve outside its root
    #[error("unsafe path rejected: {0}")]
    UnsafePath(String),

    /// Object storage request failed
    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// Object key could not be parsed
    #[error("invalid object key: {0}")]
    InvalidKey(#[from] object_store::path::Error),

    /// Local filesystem operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Could not obtain a connection to Redis
    #[error("redis connection failed: {0}")]
    Connection(String),

    /// Redis command failed
    #[error("redis command failed: {0}")]
    Redis(#[from] deadpool_redis::redis::RedisError),

    /// A spawned transfer or blocking task panicked or was cancelled
    #[error("background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        StorageError::Task(err.to_string())
    }
}
