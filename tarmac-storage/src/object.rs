//! Object store construction

use std::sync::Arc;

use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use tracing::info;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{StorageError, StorageResult};

/// Create an object store from configuration
///
/// The configuration is validated first, so a missing bucket fails here at
/// startup rather than on the first request.
pub fn create_object_store(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    config.validate()?;

    match config.backend {
        StorageBackend::S3 => {
            let bucket = config.bucket.as_deref().unwrap_or_default();
            let mut builder = AmazonS3Builder::new()
                .with_bucket_name(bucket)
                .with_region(&config.region);

            if let Some(endpoint) = &config.endpoint {
                builder = builder
                    .with_endpoint(endpoint)
                    .with_allow_http(endpoint.starts_with("http://"));
            }
            if let Some(key_id) = &config.access_key_id {
                builder = builder.with_access_key_id(key_id);
            }
            if let Some(secret) = &config.secret_access_key {
                builder = builder.with_secret_access_key(secret);
            }

            let store = builder
                .build()
                .map_err(|e| StorageError::Config(format!("failed to create S3 store: {e}")))?;

            info!(
                bucket = %bucket,
                region = %config.region,
                endpoint = config.endpoint.as_deref().unwrap_or("aws"),
                "S3 object store created"
            );
            Ok(Arc::new(store))
        }
        StorageBackend::Local => {
            std::fs::create_dir_all(&config.local_path)?;
            let store = LocalFileSystem::new_with_prefix(&config.local_path).map_err(|e| {
                StorageError::Config(format!("failed to create local store: {e}"))
            })?;

            info!(path = %config.local_path.display(), "local object store created");
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            info!("in-memory object store created");
            Ok(Arc::new(InMemory::new()))
        }
    }
}
