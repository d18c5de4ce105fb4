//! Content resolution
//!
//! Maps `(host, path)` onto an object under `dist/{id}/` and fetches it.
//! Everything that could let a request reach outside its tenant's prefix is
//! handled here: host labels are validated as deployment ids, and `..`
//! segments are resolved before a key is built so they can never climb above
//! the tenant root.

use std::sync::Arc;

use bytes::Bytes;
use object_store::ObjectStore;
use object_store::path::Path as ObjectPath;
use tarmac_core::id::is_valid_id;
use tarmac_core::keys;
use tarmac_storage::StatusStore;
use thiserror::Error;
use tracing::{debug, enabled, Level};

/// Document served for directory requests
pub const INDEX_DOCUMENT: &str = "index.html";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("host {0:?} does not name a deployment")]
    UnknownTenant(String),

    #[error("invalid object key {key}: {source}")]
    InvalidKey {
        key: String,
        #[source]
        source: object_store::path::Error,
    },

    #[error("failed to fetch {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: object_store::Error,
    },
}

/// A file ready to be sent
#[derive(Debug, Clone)]
pub struct Asset {
    pub body: Bytes,
    pub content_type: &'static str,
    pub etag: Option<String>,
}

/// Extracts the deployment id from a `Host` header value
///
/// The id is the first DNS label, lowercased, with any port removed.
pub fn tenant_from_host(host: &str) -> Option<String> {
    let host = host.trim();
    if host.starts_with('[') {
        return None;
    }

    let hostname = host.split(':').next().unwrap_or_default();
    let label = hostname.split('.').next().unwrap_or_default().to_ascii_lowercase();

    is_valid_id(&label).then_some(label)
}

/// Resolves a request path into a key suffix relative to the tenant root
///
/// Empty and `.` segments are dropped and `..` removes the previous segment,
/// stopping at the root. Directory requests resolve to `index.html`.
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() || path.ends_with('/') {
        segments.push(INDEX_DOCUMENT);
    }

    segments.join("/")
}

/// Content type derived from a path's extension
pub fn content_type(path: &str) -> &'static str {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let extension = match file_name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return "application/octet-stream",
    };

    match extension.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        _ => "application/octet-stream",
    }
}

/// Object stores report etags with or without quotes; HTTP wants them quoted
fn quote_etag(etag: &str) -> String {
    if etag.starts_with('"') || etag.starts_with("W/\"") {
        etag.to_string()
    } else {
        format!("\"{etag}\"")
    }
}

/// Resolves and fetches tenant files
pub struct ContentService {
    store: Arc<dyn ObjectStore>,
    status: Option<Arc<dyn StatusStore>>,
}

impl ContentService {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            status: None,
        }
    }

    /// Enables status lookups when a file is missing
    pub fn with_status(mut self, status: Arc<dyn StatusStore>) -> Self {
        self.status = Some(status);
        self
    }

    /// Object key for a request, if the host names a deployment
    pub fn resolve(&self, host: &str, path: &str) -> Result<String, ContentError> {
        let id = tenant_from_host(host).ok_or_else(|| ContentError::UnknownTenant(host.to_string()))?;
        Ok(keys::join(&keys::dist_prefix(&id), &normalize_path(path)))
    }

    pub async fn serve(&self, host: &str, path: &str) -> Result<Asset, ContentError> {
        let key = self.resolve(host, path)?;

        let location = ObjectPath::parse(&key).map_err(|source| ContentError::InvalidKey {
            key: key.clone(),
            source,
        })?;

        let result = match self.store.get(&location).await {
            Ok(result) => result,
            Err(source) => {
                self.log_tenant_status(host).await;
                return Err(ContentError::Fetch { key, source });
            }
        };

        let etag = result.meta.e_tag.as_deref().map(quote_etag);
        let body = result
            .bytes()
            .await
            .map_err(|source| ContentError::Fetch {
                key: key.clone(),
                source,
            })?;

        Ok(Asset {
            body,
            content_type: content_type(&key),
            etag,
        })
    }

    async fn log_tenant_status(&self, host: &str) {
        let Some(status) = &self.status else {
            return;
        };
        if !enabled!(Level::DEBUG) {
            return;
        }
        let Some(id) = tenant_from_host(host) else {
            return;
        };

        match status.get(&id).await {
            Ok(Some(current)) => debug!(id = %id, status = %current, "Missing file for deployment"),
            Ok(None) => debug!(id = %id, "Missing file for unknown deployment"),
            Err(e) => debug!(id = %id, error = %e, "Status lookup failed"),
        }
    }
}
