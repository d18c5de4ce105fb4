//! Build pipeline
//!
//! Takes one deployment from `uploaded` to `deployed`:
//! mark building, rebuild the source tree, run the build, publish the
//! output directory, mark deployed. Any failure marks the deployment
//! `failed`. The scratch tree is removed in every case.

use std::path::Path;
use std::sync::Arc;

use tarmac_core::domain::deployment::{Deployment, DeploymentStatus};
use tarmac_core::id::is_valid_id;
use tarmac_storage::{ObjectMirror, StatusStore, StorageError};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::service::execution::{BuildExecutor, ExecutionError};

/// Stage a build was in when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Dequeued,
    Fetching,
    Building,
    Publishing,
}

impl std::fmt::Display for BuildStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BuildStage::Dequeued => "dequeued",
            BuildStage::Fetching => "fetching",
            BuildStage::Building => "building",
            BuildStage::Publishing => "publishing",
        })
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid deployment id: {0:?}")]
    InvalidId(String),

    #[error("failed to mark deployment building: {0}")]
    MarkBuilding(#[source] StorageError),

    #[error("failed to prepare workspace: {0}")]
    Workspace(#[from] std::io::Error),

    #[error("failed to download source: {0}")]
    Download(#[source] StorageError),

    #[error("no source files found under {0}")]
    EmptySource(String),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("build did not produce an output directory at {0}")]
    MissingOutput(String),

    #[error("failed to publish artifact: {0}")]
    Publish(#[source] StorageError),

    #[error("failed to mark deployment deployed: {0}")]
    MarkDeployed(#[source] StorageError),
}

impl BuildError {
    pub fn stage(&self) -> BuildStage {
        match self {
            BuildError::InvalidId(_) | BuildError::MarkBuilding(_) => BuildStage::Dequeued,
            BuildError::Workspace(_) | BuildError::Download(_) | BuildError::EmptySource(_) => {
                BuildStage::Fetching
            }
            BuildError::Execution(_) => BuildStage::Building,
            BuildError::MissingOutput(_) | BuildError::Publish(_) | BuildError::MarkDeployed(_) => {
                BuildStage::Publishing
            }
        }
    }
}

/// Per-deployment build pipeline
pub struct BuildPipeline {
    mirror: ObjectMirror,
    status: Arc<dyn StatusStore>,
    executor: Arc<dyn BuildExecutor>,
    config: Config,
    output_dir: String,
}

impl BuildPipeline {
    pub fn new(
        config: &Config,
        mirror: ObjectMirror,
        status: Arc<dyn StatusStore>,
        executor: Arc<dyn BuildExecutor>,
    ) -> Self {
        Self {
            mirror,
            status,
            executor,
            config: config.clone(),
            output_dir: config.output_dir.trim_end_matches('/').to_string(),
        }
    }

    /// Builds and publishes deployment `id`
    ///
    /// The error is returned for the caller's benefit only; it has already
    /// been logged and recorded as status `failed`.
    pub async fn run(&self, id: &str) -> Result<(), BuildError> {
        if !is_valid_id(id) {
            let err = BuildError::InvalidId(id.to_string());
            error!(id = %id, stage = %err.stage(), "Rejected deployment: {}", err);
            return Err(err);
        }

        let deployment = Deployment::new(id);
        let root = self.config.workspace_dir(id);

        let result = self.build(&deployment, &root).await;
        remove_workspace(&root).await;

        match result {
            Ok(()) => {
                info!(id = %id, "Deployment published");
                Ok(())
            }
            Err(err) => {
                error!(id = %id, stage = %err.stage(), "Build failed: {}", err);
                if let Err(e) = self.status.set(id, DeploymentStatus::Failed).await {
                    error!(id = %id, error = %e, "Failed to mark deployment failed");
                }
                Err(err)
            }
        }
    }

    async fn build(&self, deployment: &Deployment, root: &Path) -> Result<(), BuildError> {
        let id = deployment.id.as_str();

        self.status
            .set(id, DeploymentStatus::Building)
            .await
            .map_err(BuildError::MarkBuilding)?;

        remove_workspace(root).await;
        tokio::fs::create_dir_all(root).await?;

        let files = self
            .mirror
            .download_prefix(&deployment.source_prefix, root)
            .await
            .map_err(BuildError::Download)?;
        if files == 0 {
            return Err(BuildError::EmptySource(deployment.source_prefix.clone()));
        }
        info!(id = %id, files, "Source downloaded");

        self.executor.execute(id, root).await?;

        let output = root.join(&self.output_dir);
        if !tokio::fs::metadata(&output)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(BuildError::MissingOutput(self.output_dir.clone()));
        }

        let report = self
            .mirror
            .upload_tree(&output, &deployment.dist_prefix)
            .await
            .map_err(BuildError::Publish)?;
        if !report.is_complete() {
            warn!(
                id = %id,
                uploaded = report.uploaded.len(),
                failed = report.failed.len(),
                "Artifact published partially"
            );
        }

        self.status
            .set(id, DeploymentStatus::Deployed)
            .await
            .map_err(BuildError::MarkDeployed)?;

        Ok(())
    }
}

async fn remove_workspace(root: &Path) {
    match tokio::fs::remove_dir_all(root).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %root.display(), error = %e, "Failed to remove workspace"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::execution::ShellBuildExecutor;
    use async_trait::async_trait;
    use object_store::ObjectStore;
    use object_store::memory::InMemory;
    use object_store::path::Path as ObjectPath;
    use std::time::Duration;
    use tarmac_storage::StorageResult;
    use tarmac_storage::testing::FaultyStore;
    use tempfile::TempDir;
    use tokio::sync::Mutex;

    /// Remembers every status write in order
    #[derive(Default)]
    struct RecordingStatus {
        writes: Mutex<Vec<(String, DeploymentStatus)>>,
    }

    impl RecordingStatus {
        async fn history(&self, id: &str) -> Vec<DeploymentStatus> {
            self.writes
                .lock()
                .await
                .iter()
                .filter(|(written, _)| written == id)
                .map(|(_, status)| *status)
                .collect()
        }
    }

    #[async_trait]
    impl StatusStore for RecordingStatus {
        async fn set(&self, id: &str, status: DeploymentStatus) -> StorageResult<()> {
            self.writes.lock().await.push((id.to_string(), status));
            Ok(())
        }

        async fn get(&self, id: &str) -> StorageResult<Option<String>> {
            Ok(self
                .history(id)
                .await
                .last()
                .map(|status| status.as_str().to_string()))
        }
    }

    struct Harness {
        pipeline: BuildPipeline,
        store: Arc<InMemory>,
        status: Arc<RecordingStatus>,
        work_dir: TempDir,
    }

    fn harness(command: &str) -> Harness {
        harness_with(command, |store| store as Arc<dyn ObjectStore>)
    }

    /// The pipeline reads and writes through `wrap`; `Harness::store` is the
    /// backing store
    fn harness_with(
        command: &str,
        wrap: impl FnOnce(Arc<InMemory>) -> Arc<dyn ObjectStore>,
    ) -> Harness {
        let work_dir = tempfile::tempdir().unwrap();
        let config = Config::new(work_dir.path());
        let store = Arc::new(InMemory::new());
        let status = Arc::new(RecordingStatus::default());

        let pipeline = BuildPipeline::new(
            &config,
            ObjectMirror::new(wrap(store.clone())),
            status.clone(),
            Arc::new(ShellBuildExecutor::new(command, Duration::from_secs(30))),
        );

        Harness {
            pipeline,
            store,
            status,
            work_dir,
        }
    }

    async fn put(store: &InMemory, key: &str, contents: &str) {
        store
            .put(&ObjectPath::from(key), contents.as_bytes().to_vec().into())
            .await
            .unwrap();
    }

    async fn read(store: &InMemory, key: &str) -> Option<String> {
        let result = store.get(&ObjectPath::from(key)).await.ok()?;
        let bytes = result.bytes().await.ok()?;
        Some(String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_successful_build_is_published() {
        let h = harness("mkdir -p dist/css && cp index.html dist/ && cp style.css dist/css/");
        put(&h.store, "source/site1/index.html", "<h1>hi</h1>").await;
        put(&h.store, "source/site1/style.css", "h1{}").await;

        h.pipeline.run("site1").await.unwrap();

        assert_eq!(
            read(&h.store, "dist/site1/index.html").await.as_deref(),
            Some("<h1>hi</h1>")
        );
        assert_eq!(
            read(&h.store, "dist/site1/css/style.css").await.as_deref(),
            Some("h1{}")
        );
        assert_eq!(
            h.status.history("site1").await,
            vec![DeploymentStatus::Building, DeploymentStatus::Deployed]
        );
        assert!(!h.work_dir.path().join("build/site1").exists());
    }

    #[tokio::test]
    async fn test_failed_build_is_never_published() {
        let h = harness("mkdir -p dist && cp index.html dist/ && exit 1");
        put(&h.store, "source/site2/index.html", "<h1>hi</h1>").await;

        let err = h.pipeline.run("site2").await.unwrap_err();

        assert_eq!(err.stage(), BuildStage::Building);
        assert!(read(&h.store, "dist/site2/index.html").await.is_none());
        assert_eq!(
            h.status.history("site2").await,
            vec![DeploymentStatus::Building, DeploymentStatus::Failed]
        );
        assert!(!h.work_dir.path().join("build/site2").exists());
    }

    #[tokio::test]
    async fn test_missing_output_dir_fails_publishing() {
        let h = harness("true");
        put(&h.store, "source/site3/index.html", "x").await;

        let err = h.pipeline.run("site3").await.unwrap_err();

        assert!(matches!(err, BuildError::MissingOutput(ref dir) if dir == "dist"));
        assert_eq!(err.stage(), BuildStage::Publishing);
        assert_eq!(
            h.status.get("site3").await.unwrap().as_deref(),
            Some("failed")
        );
    }

    #[tokio::test]
    async fn test_empty_source_fails_fetching() {
        let h = harness("true");

        let err = h.pipeline.run("ghost").await.unwrap_err();

        assert!(matches!(err, BuildError::EmptySource(_)));
        assert_eq!(err.stage(), BuildStage::Fetching);
        assert_eq!(
            h.status.get("ghost").await.unwrap().as_deref(),
            Some("failed")
        );
    }

    #[tokio::test]
    async fn test_invalid_id_touches_nothing() {
        let h = harness("true");

        let err = h.pipeline.run("../escape").await.unwrap_err();

        assert!(matches!(err, BuildError::InvalidId(_)));
        assert!(h.status.writes.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_stale_workspace_is_replaced() {
        let h = harness("mkdir -p dist && cp index.html dist/");
        let stale = h.work_dir.path().join("build/site4/dist");
        tokio::fs::create_dir_all(&stale).await.unwrap();
        tokio::fs::write(stale.join("old.html"), "old").await.unwrap();
        put(&h.store, "source/site4/index.html", "new").await;

        h.pipeline.run("site4").await.unwrap();

        assert!(read(&h.store, "dist/site4/old.html").await.is_none());
        assert_eq!(
            read(&h.store, "dist/site4/index.html").await.as_deref(),
            Some("new")
        );
    }

    #[tokio::test]
    async fn test_partial_publish_is_still_deployed() {
        let h = harness_with("mkdir -p dist && cp a.html b.html dist/", |store| {
            Arc::new(FaultyStore::new(store).fail_on("dist/site5/b.html")) as Arc<dyn ObjectStore>
        });
        put(&h.store, "source/site5/a.html", "a").await;
        put(&h.store, "source/site5/b.html", "b").await;

        h.pipeline.run("site5").await.unwrap();

        assert_eq!(read(&h.store, "dist/site5/a.html").await.as_deref(), Some("a"));
        assert!(read(&h.store, "dist/site5/b.html").await.is_none());
        assert_eq!(
            h.status.history("site5").await,
            vec![DeploymentStatus::Building, DeploymentStatus::Deployed]
        );
    }

    #[tokio::test]
    async fn test_download_failure_fails_fetching() {
        let h = harness_with("mkdir -p dist && cp a.html dist/", |store| {
            Arc::new(FaultyStore::new(store).fail_on("source/site6/b.html")) as Arc<dyn ObjectStore>
        });
        put(&h.store, "source/site6/a.html", "a").await;
        put(&h.store, "source/site6/b.html", "b").await;

        let err = h.pipeline.run("site6").await.unwrap_err();

        assert!(matches!(err, BuildError::Download(_)));
        assert_eq!(err.stage(), BuildStage::Fetching);
        assert!(read(&h.store, "dist/site6/a.html").await.is_none());
        assert_eq!(
            h.status.history("site6").await,
            vec![DeploymentStatus::Building, DeploymentStatus::Failed]
        );
        assert!(!h.work_dir.path().join("build/site6").exists());
    }
}
