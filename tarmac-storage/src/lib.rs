//! Tarmac Storage
//!
//! Storage plumbing shared by the upload service, the builder and the
//! content server:
//! - `object`: object-store construction from configuration
//! - `mirror`: bidirectional sync between a local tree and an object prefix
//! - `queue`: the durable FIFO of deployment ids waiting for a build
//! - `status`: the shared map from deployment id to status
//!
//! Clients are created once at process start and injected into the
//! components that need them. Connection failures at startup are fatal;
//! nothing in this crate retries or reconnects behind the caller's back.

pub mod config;
pub mod error;
pub mod mirror;
pub mod object;
pub mod pool;
pub mod queue;
pub mod status;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{RedisConfig, StorageBackend, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use mirror::{ObjectMirror, UploadReport};
pub use object::create_object_store;
pub use pool::connect_redis;
pub use queue::{BuildQueue, MemoryQueue, RedisQueue};
pub use status::{MemoryStatusStore, RedisStatusStore, StatusStore};
