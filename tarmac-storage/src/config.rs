//! Storage configuration
//!
//! Object storage and Redis settings shared by every Tarmac service. Values
//! come from environment variables with defaults for everything optional.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{StorageError, StorageResult};

/// Object storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// S3 or any S3-compatible store (MinIO, R2, ...)
    S3,
    /// Local directory, for single-host setups
    Local,
    /// Process-local memory, only useful for tests and demos
    Memory,
}

impl FromStr for StorageBackend {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "s3" => Ok(StorageBackend::S3),
            "local" => Ok(StorageBackend::Local),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(StorageError::Config(format!(
                "unsupported storage backend: {other}"
            ))),
        }
    }
}

/// Object storage configuration
#[derive(Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Bucket holding both `source/` and `dist/` prefixes
    pub bucket: Option<String>,

    pub region: String,

    /// Custom endpoint for S3-compatible stores
    pub endpoint: Option<String>,

    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,

    /// Root directory of the `local` backend
    pub local_path: PathBuf,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("backend", &self.backend)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("local_path", &self.local_path)
            .finish()
    }
}

impl StorageConfig {
    /// Configuration for an in-memory store
    pub fn memory() -> Self {
        Self {
            backend: StorageBackend::Memory,
            ..Self::default()
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - STORAGE_BACKEND (optional, `s3` | `local` | `memory`, default: s3)
    /// - AWS_BUCKET_NAME (required for s3)
    /// - AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY (optional)
    /// - AWS_ENDPOINT (optional)
    /// - AWS_REGION (optional, default: us-east-1)
    /// - LOCAL_STORAGE_PATH (optional, default: ./storage)
    pub fn from_env() -> StorageResult<Self> {
        let backend = match std::env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => StorageBackend::S3,
        };

        let defaults = Self::default();

        Ok(Self {
            backend,
            bucket: non_empty_var("AWS_BUCKET_NAME"),
            region: non_empty_var("AWS_REGION").unwrap_or(defaults.region),
            endpoint: non_empty_var("AWS_ENDPOINT"),
            access_key_id: non_empty_var("AWS_ACCESS_KEY_ID"),
            secret_access_key: non_empty_var("AWS_SECRET_ACCESS_KEY"),
            local_path: non_empty_var("LOCAL_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.local_path),
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> StorageResult<()> {
        if self.backend == StorageBackend::S3 {
            match &self.bucket {
                Some(bucket) if !bucket.is_empty() => {}
                _ => {
                    return Err(StorageError::Config(
                        "bucket name is not defined (AWS_BUCKET_NAME)".to_string(),
                    ));
                }
            }
        }

        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(StorageError::Config(
                    "endpoint must start with http:// or https://".to_string(),
                ));
            }
        }

        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::S3,
            bucket: None,
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            local_path: PathBuf::from("./storage"),
        }
    }
}

/// Redis connection settings for the build queue and the status store
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub pool_size: usize,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool_size: 8,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// `REDIS_URL` wins; otherwise the url is assembled from `REDIS_HOST` and
    /// `REDIS_PORT`. `REDIS_POOL_SIZE` defaults to 8.
    pub fn from_env() -> Self {
        let url = non_empty_var("REDIS_URL").unwrap_or_else(|| {
            let host = non_empty_var("REDIS_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
            let port = non_empty_var("REDIS_PORT").unwrap_or_else(|| "6379".to_string());
            format!("redis://{host}:{port}")
        });

        let pool_size = std::env::var("REDIS_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(8);

        Self { url, pool_size }
    }

    pub fn validate(&self) -> StorageResult<()> {
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(StorageError::Config(
                "redis url must start with redis:// or rediss://".to_string(),
            ));
        }

        if self.pool_size == 0 {
            return Err(StorageError::Config(
                "redis pool size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self::new("redis://127.0.0.1:6379")
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
