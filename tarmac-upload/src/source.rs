//! Source fetching
//!
//! Materializes a repository's working tree in a local directory. The
//! default fetcher shells out to `git`; tests substitute their own.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unsupported repository url: {0}")]
    UnsupportedUrl(String),

    #[error("git clone failed: {0}")]
    CloneFailed(String),

    #[error("git clone timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fetches a repository into a local directory
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Populates `target_dir` with the repository's files. `target_dir`
    /// must not exist yet or be empty.
    async fn fetch(&self, repo_url: &str, target_dir: &Path) -> Result<(), FetchError>;
}

/// Shallow `git clone` of the default branch
pub struct GitFetcher {
    timeout: Duration,
}

impl GitFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl SourceFetcher for GitFetcher {
    async fn fetch(&self, repo_url: &str, target_dir: &Path) -> Result<(), FetchError> {
        check_repo_url(repo_url)?;

        if let Some(parent) = target_dir.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!(repo = %repo_url, target = %target_dir.display(), "Cloning repository");

        let mut cmd = Command::new("git");
        cmd.arg("clone")
            .arg("--depth")
            .arg("1")
            .arg("--")
            .arg(repo_url)
            .arg(target_dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(command = ?cmd, "Running git clone");

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::CloneFailed(stderr.trim().to_string()));
        }

        info!(repo = %repo_url, "Repository cloned");
        Ok(())
    }
}

/// Accepts remote transports only; local paths and `file://` urls would let
/// callers snapshot arbitrary directories of the host.
fn check_repo_url(repo_url: &str) -> Result<(), FetchError> {
    const REMOTE_SCHEMES: [&str; 4] = ["https://", "http://", "ssh://", "git://"];

    let remote = REMOTE_SCHEMES.iter().any(|s| repo_url.starts_with(s))
        || (repo_url.starts_with("git@") && repo_url.contains(':'));

    if !remote || repo_url.chars().any(char::is_whitespace) {
        return Err(FetchError::UnsupportedUrl(repo_url.to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_urls_are_accepted() {
        for url in [
            "https://github.com/user/site.git",
            "http://git.local/site",
            "ssh://git@github.com/user/site.git",
            "git://example.org/site.git",
            "git@github.com:user/site.git",
        ] {
            assert!(check_repo_url(url).is_ok(), "{url}");
        }
    }

    #[test]
    fn test_local_and_option_like_urls_are_rejected() {
        for url in [
            "file:///etc",
            "/srv/repos/site",
            "../site",
            "--upload-pack=touch /tmp/pwned",
            "https://example.com/a b",
            "",
        ] {
            assert!(
                matches!(check_repo_url(url), Err(FetchError::UnsupportedUrl(_))),
                "{url}"
            );
        }
    }

    #[tokio::test]
    async fn test_git_fetcher_rejects_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = GitFetcher::new(Duration::from_secs(5));

        let err = fetcher
            .fetch("file:///etc", &dir.path().join("clone"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::UnsupportedUrl(_)));
        assert!(!dir.path().join("clone").exists());
    }
}
