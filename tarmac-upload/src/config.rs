//! Upload service configuration
//!
//! Storage and Redis settings live in `tarmac_storage::config`; this module
//! only covers what the ingestion service itself needs.

use std::path::PathBuf;
use std::time::Duration;

/// Upload service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP listener binds to
    pub bind_addr: String,

    /// Scratch directory; each deployment is cloned into `{work_dir}/clone/{id}`
    pub work_dir: PathBuf,

    /// Pause between the source upload and the queue push, giving
    /// eventually-consistent stores time to expose the new objects
    pub settle_delay: Duration,

    /// Maximum time a `git clone` may take
    pub clone_timeout: Duration,
}

/// Subdirectory of `work_dir` holding checkouts. The builder uses `build/`,
/// so both services may share one `WORK_DIR`.
const CHECKOUT_SUBDIR: &str = "clone";

impl Config {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            work_dir: work_dir.into(),
            settle_delay: Duration::from_secs(5),
            clone_timeout: Duration::from_secs(300),
        }
    }

    /// Scratch directory for the checkout of deployment `id`
    pub fn checkout_dir(&self, id: &str) -> PathBuf {
        self.work_dir.join(CHECKOUT_SUBDIR).join(id)
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - UPLOAD_BIND_ADDR (optional, default: 0.0.0.0:3000, or 0.0.0.0:$PORT)
    /// - WORK_DIR (optional, default: <tmp>/tarmac)
    /// - SETTLE_DELAY_MS (optional, default: 5000)
    /// - CLONE_TIMEOUT (optional, seconds, default: 300)
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let bind_addr = match std::env::var("UPLOAD_BIND_ADDR") {
            Ok(addr) => addr,
            Err(_) => match std::env::var("PORT") {
                Ok(port) => format!("0.0.0.0:{port}"),
                Err(_) => defaults.bind_addr,
            },
        };

        let work_dir = std::env::var("WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.work_dir);

        let settle_delay = match std::env::var("SETTLE_DELAY_MS") {
            Ok(value) => Duration::from_millis(
                value
                    .parse::<u64>()
                    .map_err(|_| anyhow::anyhow!("SETTLE_DELAY_MS must be an integer"))?,
            ),
            Err(_) => defaults.settle_delay,
        };

        let clone_timeout = std::env::var("CLONE_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.clone_timeout);

        Ok(Self {
            bind_addr,
            work_dir,
            settle_delay,
            clone_timeout,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if self.work_dir.as_os_str().is_empty() {
            anyhow::bail!("work_dir cannot be empty");
        }

        if self.clone_timeout.is_zero() {
            anyhow::bail!("clone_timeout must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("tarmac"))
    }
}
