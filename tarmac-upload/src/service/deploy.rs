//! Deploy Service
//!
//! Ingestion pipeline: clone, snapshot into `source/{id}`, mark the
//! deployment `uploaded`, and hand it to the builder through the queue.

use std::path::Path;
use std::sync::Arc;

use tarmac_core::domain::deployment::{Deployment, DeploymentStatus};
use tarmac_core::id;
use tarmac_storage::{BuildQueue, ObjectMirror, StatusStore, StorageError};
use tracing::{info, warn};

use crate::config::Config;
use crate::source::{FetchError, SourceFetcher};

/// Directories never copied into the source snapshot
const EXCLUDED_DIRS: [&str; 1] = [".git"];

/// Service error type
#[derive(Debug)]
pub enum DeployError {
    InvalidArgument(String),
    NotFound(String),
    Fetch(FetchError),
    Storage(StorageError),
    IncompleteUpload { id: String, failed: usize },
}

impl std::fmt::Display for DeployError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeployError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            DeployError::NotFound(id) => write!(f, "no status for deployment {id}"),
            DeployError::Fetch(err) => write!(f, "fetch failed: {err}"),
            DeployError::Storage(err) => write!(f, "storage failed: {err}"),
            DeployError::IncompleteUpload { id, failed } => {
                write!(f, "{failed} file(s) of deployment {id} failed to upload")
            }
        }
    }
}

impl From<FetchError> for DeployError {
    fn from(err: FetchError) -> Self {
        DeployError::Fetch(err)
    }
}

impl From<StorageError> for DeployError {
    fn from(err: StorageError) -> Self {
        DeployError::Storage(err)
    }
}

/// Ingestion service shared by all request handlers
pub struct DeployService {
    mirror: ObjectMirror,
    queue: Arc<dyn BuildQueue>,
    status: Arc<dyn StatusStore>,
    fetcher: Arc<dyn SourceFetcher>,
    config: Config,
}

impl DeployService {
    pub fn new(
        config: &Config,
        mirror: ObjectMirror,
        queue: Arc<dyn BuildQueue>,
        status: Arc<dyn StatusStore>,
        fetcher: Arc<dyn SourceFetcher>,
    ) -> Self {
        Self {
            mirror,
            queue,
            status,
            fetcher,
            config: config.clone(),
        }
    }

    /// Ingests a repository and enqueues it for building
    ///
    /// Returns the new deployment id. Nothing is enqueued unless every source
    /// file reached object storage; a partial snapshot is left in place. The
    /// checkout is gone before the id is pushed, so a builder never races
    /// this service over local files.
    pub async fn deploy(&self, repo_url: Option<&str>) -> Result<String, DeployError> {
        let repo_url = repo_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| DeployError::InvalidArgument("Repository URL is required".into()))?;

        let deployment = Deployment::new(id::generate_id());
        let checkout = self.config.checkout_dir(&deployment.id);

        info!(id = %deployment.id, repo = %repo_url, "Starting deployment");

        let snapshot = self.snapshot(repo_url, &deployment, &checkout).await;
        remove_checkout(&checkout).await;
        snapshot?;

        self.enqueue(&deployment).await?;

        info!(id = %deployment.id, "Deployment queued");
        Ok(deployment.id)
    }

    /// Clones the repository and copies it into `source/{id}`
    async fn snapshot(
        &self,
        repo_url: &str,
        deployment: &Deployment,
        checkout: &Path,
    ) -> Result<(), DeployError> {
        if let Some(parent) = checkout.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(FetchError::from)?;
        }
        self.fetcher.fetch(repo_url, checkout).await?;

        let report = self
            .mirror
            .upload_tree_excluding(checkout, &deployment.source_prefix, &EXCLUDED_DIRS)
            .await?;

        if !report.is_complete() {
            return Err(DeployError::IncompleteUpload {
                id: deployment.id.clone(),
                failed: report.failed.len(),
            });
        }

        info!(
            id = %deployment.id,
            files = report.uploaded.len(),
            "Source uploaded"
        );
        Ok(())
    }

    async fn enqueue(&self, deployment: &Deployment) -> Result<(), DeployError> {
        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }

        // Status goes first so the builder never sees an id without one.
        self.status
            .set(&deployment.id, DeploymentStatus::Uploaded)
            .await?;
        self.queue.push(&deployment.id).await?;

        Ok(())
    }

    /// Returns the stored status string for `id`
    pub async fn status(&self, id: Option<&str>) -> Result<String, DeployError> {
        let id = id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DeployError::InvalidArgument("ID is required".into()))?;

        self.status
            .get(id)
            .await?
            .ok_or_else(|| DeployError::NotFound(id.to_string()))
    }
}

async fn remove_checkout(checkout: &Path) {
    match tokio::fs::remove_dir_all(checkout).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %checkout.display(), error = %e, "Failed to remove checkout"),
    }
}
