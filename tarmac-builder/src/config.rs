//! Builder configuration
//!
//! Defines the build command contract and the worker's timing parameters.
//! Storage and Redis settings come from `tarmac_storage::config`.

use std::path::PathBuf;
use std::time::Duration;

use tarmac_storage::mirror::safe_relative_path;

/// Builder configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Scratch directory; each job gets `{work_dir}/build/{id}`
    pub work_dir: PathBuf,

    /// Shell command run in the source root (through `sh -c`)
    pub build_command: String,

    /// Directory, relative to the source root, that holds the build output
    pub output_dir: String,

    /// Maximum time the build command may run before it is killed
    pub build_timeout: Duration,

    /// Pause before popping again after a queue error
    pub retry_interval: Duration,
}

/// Subdirectory of `work_dir` holding build workspaces. The upload service
/// clones into `clone/`, so both services may share one `WORK_DIR`.
const BUILD_SUBDIR: &str = "build";

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            build_command: "npm install && npm run build".to_string(),
            output_dir: "dist".to_string(),
            build_timeout: Duration::from_secs(600),
            retry_interval: Duration::from_secs(1),
        }
    }

    /// Scratch directory for the build of deployment `id`
    pub fn workspace_dir(&self, id: &str) -> PathBuf {
        self.work_dir.join(BUILD_SUBDIR).join(id)
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - WORK_DIR (optional, default: <tmp>/tarmac)
    /// - BUILD_COMMAND (optional, default: npm install && npm run build)
    /// - BUILD_OUTPUT_DIR (optional, default: dist)
    /// - BUILD_TIMEOUT (optional, seconds, default: 600)
    /// - QUEUE_RETRY_INTERVAL (optional, seconds, default: 1)
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let work_dir = std::env::var("WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.work_dir);

        let build_command = std::env::var("BUILD_COMMAND").unwrap_or(defaults.build_command);

        let output_dir = std::env::var("BUILD_OUTPUT_DIR").unwrap_or(defaults.output_dir);

        let build_timeout = std::env::var("BUILD_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.build_timeout);

        let retry_interval = std::env::var("QUEUE_RETRY_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.retry_interval);

        Ok(Self {
            work_dir,
            build_command,
            output_dir,
            build_timeout,
            retry_interval,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.work_dir.as_os_str().is_empty() {
            anyhow::bail!("work_dir cannot be empty");
        }

        if self.build_command.trim().is_empty() {
            anyhow::bail!("build_command cannot be empty");
        }

        if safe_relative_path(self.output_dir.trim_end_matches('/')).is_err() {
            anyhow::bail!(
                "output_dir must be a relative path inside the source tree: {}",
                self.output_dir
            );
        }

        if self.build_timeout.is_zero() {
            anyhow::bail!("build_timeout must be greater than 0");
        }

        if self.retry_interval.is_zero() {
            anyhow::bail!("retry_interval must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("tarmac"))
    }
}
