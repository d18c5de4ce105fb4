//! Object mirror
//!
//! Bidirectional sync between a local directory tree and an object-storage
//! prefix, preserving relative paths.
//!
//! The two directions fail differently. A download is all-or-nothing: a
//! build cannot run on a partial source tree, so the first failed transfer
//! fails the whole call. An upload is best-effort: every file gets its own
//! transfer task, failures are logged and reported, and the call itself only
//! fails when the local root cannot be walked at all.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use object_store::ObjectStore;
use object_store::path::Path as ObjectPath;
use tarmac_core::keys;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{StorageError, StorageResult};

/// Outcome of a best-effort upload
#[derive(Debug, Default)]
pub struct UploadReport {
    /// Keys that were written
    pub uploaded: Vec<String>,
    /// Keys (or local paths, when no key could be derived) that failed, with the reason
    pub failed: Vec<(String, String)>,
}

impl UploadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Mirrors directory trees to and from an object store
#[derive(Clone)]
pub struct ObjectMirror {
    store: Arc<dyn ObjectStore>,
}

impl ObjectMirror {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// The underlying object store
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Downloads every object under `prefix` into `local_root`
    ///
    /// Transfers run concurrently. The call returns once all of them have
    /// completed, or with the first error; transfers still in flight at that
    /// point are left to finish on their own. Existing files are overwritten,
    /// local files without a matching key are left alone.
    ///
    /// Returns the number of files written.
    pub async fn download_prefix(&self, prefix: &str, local_root: &Path) -> StorageResult<usize> {
        let prefix_path = ObjectPath::parse(prefix.trim_end_matches('/'))?;
        let prefix_str = prefix_path.as_ref().to_string();

        let mut listing = self.store.list(Some(&prefix_path));
        let mut transfers = FuturesUnordered::new();

        while let Some(meta) = listing.next().await {
            let meta = meta?;
            let key = meta.location.as_ref().to_string();

            let relative = key
                .strip_prefix(&prefix_str)
                .map(|rest| rest.trim_start_matches('/'))
                .ok_or_else(|| StorageError::UnsafePath(key.clone()))?;

            // A marker object for the prefix itself carries no file.
            if relative.is_empty() {
                debug!(key = %key, "skipping prefix marker");
                continue;
            }

            let destination = local_root.join(safe_relative_path(relative)?);
            let store = Arc::clone(&self.store);
            let location = meta.location;

            transfers.push(tokio::spawn(async move {
                let data = store.get(&location).await?.bytes().await?;

                if let Some(parent) = destination.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&destination, &data).await?;

                debug!(key = %location, size = data.len(), "downloaded object");
                Ok::<_, StorageError>(())
            }));
        }

        let mut written = 0;
        while let Some(joined) = transfers.next().await {
            joined??;
            written += 1;
        }

        info!(prefix = %prefix_str, files = written, dest = %local_root.display(), "prefix downloaded");
        Ok(written)
    }

    /// Uploads every regular file under `local_root` to `dest_prefix`
    pub async fn upload_tree(&self, local_root: &Path, dest_prefix: &str) -> StorageResult<UploadReport> {
        self.upload_tree_excluding(local_root, dest_prefix, &[]).await
    }

    /// Like [`upload_tree`](Self::upload_tree), skipping directories whose
    /// name is in `excluded_dirs` (for example `.git`)
    pub async fn upload_tree_excluding(
        &self,
        local_root: &Path,
        dest_prefix: &str,
        excluded_dirs: &[&str],
    ) -> StorageResult<UploadReport> {
        let metadata = tokio::fs::metadata(local_root).await?;
        if !metadata.is_dir() {
            return Err(StorageError::UnsafePath(format!(
                "{} is not a directory",
                local_root.display()
            )));
        }

        let root = local_root.to_path_buf();
        let excluded: Vec<String> = excluded_dirs.iter().map(|d| d.to_string()).collect();
        let (files, mut report) =
            tokio::task::spawn_blocking(move || collect_files(&root, &excluded)).await?;

        let prefix = dest_prefix.trim_end_matches('/').to_string();
        let mut transfers = FuturesUnordered::new();

        for (path, relative) in files {
            let key = keys::join(&prefix, &relative);
            let store = Arc::clone(&self.store);

            transfers.push(tokio::spawn(async move {
                let result = upload_file(store.as_ref(), &path, &key).await;
                (key, result)
            }));
        }

        while let Some(joined) = transfers.next().await {
            match joined {
                Ok((key, Ok(()))) => report.uploaded.push(key),
                Ok((key, Err(e))) => {
                    warn!(key = %key, error = %e, "failed to upload file");
                    report.failed.push((key, e.to_string()));
                }
                Err(e) => {
                    warn!(error = %e, "upload task failed");
                    report.failed.push((String::new(), e.to_string()));
                }
            }
        }

        info!(
            prefix = %prefix,
            uploaded = report.uploaded.len(),
            failed = report.failed.len(),
            "tree uploaded"
        );
        Ok(report)
    }
}

async fn upload_file(store: &dyn ObjectStore, path: &Path, key: &str) -> StorageResult<()> {
    let location = ObjectPath::parse(key)?;
    let data = tokio::fs::read(path).await?;
    let size = data.len();

    store.put(&location, data.into()).await?;

    debug!(key = %key, size, "uploaded file");
    Ok(())
}

/// Walks `root` depth-first and returns `(absolute path, relative key path)`
/// for every regular file
///
/// Unreadable entries, symlinks and names that cannot form a key are logged
/// and recorded as failures; the walk itself carries on.
fn collect_files(root: &Path, excluded: &[String]) -> (Vec<(PathBuf, String)>, UploadReport) {
    let mut files = Vec::new();
    let mut report = UploadReport::default();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !(entry.file_type().is_dir()
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| excluded.iter().any(|e| e == name)))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let location = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                warn!(path = %location, error = %e, "skipping unreadable entry");
                report.failed.push((location, e.to_string()));
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        if file_type.is_symlink() {
            warn!(path = %entry.path().display(), "skipping symlink");
            continue;
        }

        match relative_key(root, entry.path()) {
            Ok(relative) => files.push((entry.into_path(), relative)),
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "skipping file");
                report
                    .failed
                    .push((entry.path().display().to_string(), e.to_string()));
            }
        }
    }

    (files, report)
}

/// Converts a path under `root` into a `/`-separated key suffix
fn relative_key(root: &Path, path: &Path) -> StorageResult<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| StorageError::UnsafePath(path.display().to_string()))?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => {
                let segment = segment
                    .to_str()
                    .ok_or_else(|| StorageError::UnsafePath(path.display().to_string()))?;
                segments.push(segment);
            }
            _ => return Err(StorageError::UnsafePath(path.display().to_string())),
        }
    }

    if segments.is_empty() {
        return Err(StorageError::UnsafePath(path.display().to_string()));
    }

    Ok(segments.join("/"))
}

/// Turns a key suffix into a relative local path that stays under its root
///
/// Rejects empty, `.` and `..` segments, NUL bytes and anything the platform
/// would treat as a root or drive prefix.
pub fn safe_relative_path(relative: &str) -> StorageResult<PathBuf> {
    let mut path = PathBuf::new();

    for segment in relative.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\0') {
            return Err(StorageError::UnsafePath(relative.to_string()));
        }

        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => path.push(part),
            _ => return Err(StorageError::UnsafePath(relative.to_string())),
        }
    }

    if path.as_os_str().is_empty() {
        return Err(StorageError::UnsafePath(relative.to_string()));
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FaultyStore;
    use object_store::memory::InMemory;

    fn mirror() -> ObjectMirror {
        ObjectMirror::new(Arc::new(InMemory::new()))
    }

    fn write(root: &Path, relative: &str, contents: &[u8]) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_safe_relative_path_accepts_nested() {
        let path = safe_relative_path("css/site/main.css").unwrap();
        assert_eq!(path, PathBuf::from("css").join("site").join("main.css"));
    }

    #[test]
    fn test_safe_relative_path_rejects_traversal() {
        for bad in ["..", "../etc/passwd", "a/../../b", "a//b", "./a", "", "a/./b"] {
            assert!(safe_relative_path(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_relative_key_joins_with_slashes() {
        let root = Path::new("/tmp/work");
        let key = relative_key(root, &root.join("a").join("b.txt")).unwrap();
        assert_eq!(key, "a/b.txt");
        assert!(relative_key(root, Path::new("/elsewhere/file")).is_err());
    }

    #[tokio::test]
    async fn test_round_trip_reproduces_tree() {
        let mirror = mirror();
        let src = tempfile::tempdir().unwrap();
        write(src.path(), "index.html", b"<h1>hi</h1>");
        write(src.path(), "css/site.css", b"body{}");
        write(src.path(), "js/deep/app.js", b"console.log(1)");
        write(src.path(), "empty.txt", b"");

        let report = mirror.upload_tree(src.path(), "source/abc").await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.uploaded.len(), 4);

        let dest = tempfile::tempdir().unwrap();
        let written = mirror.download_prefix("source/abc", dest.path()).await.unwrap();
        assert_eq!(written, 4);

        for relative in ["index.html", "css/site.css", "js/deep/app.js", "empty.txt"] {
            assert_eq!(
                std::fs::read(src.path().join(relative)).unwrap(),
                std::fs::read(dest.path().join(relative)).unwrap(),
                "mismatch for {relative}"
            );
        }
    }

    #[tokio::test]
    async fn test_upload_keys_are_prefixed() {
        let mirror = mirror();
        let src = tempfile::tempdir().unwrap();
        write(src.path(), "a/b.txt", b"b");

        let report = mirror.upload_tree(src.path(), "dist/xyz/").await.unwrap();
        assert_eq!(report.uploaded, vec!["dist/xyz/a/b.txt".to_string()]);

        let data = mirror
            .store()
            .get(&ObjectPath::from("dist/xyz/a/b.txt"))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(data.as_ref(), b"b");
    }

    #[tokio::test]
    async fn test_upload_excludes_directories() {
        let mirror = mirror();
        let src = tempfile::tempdir().unwrap();
        write(src.path(), ".git/HEAD", b"ref: refs/heads/main");
        write(src.path(), "index.html", b"x");

        let report = mirror
            .upload_tree_excluding(src.path(), "source/abc", &[".git"])
            .await
            .unwrap();
        assert_eq!(report.uploaded, vec!["source/abc/index.html".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_upload_skips_symlinks() {
        let mirror = mirror();
        let outside = tempfile::tempdir().unwrap();
        write(outside.path(), "secret.txt", b"secret");

        let src = tempfile::tempdir().unwrap();
        write(src.path(), "index.html", b"x");
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), src.path().join("leak.txt"))
            .unwrap();

        let report = mirror.upload_tree(src.path(), "source/abc").await.unwrap();
        assert_eq!(report.uploaded, vec!["source/abc/index.html".to_string()]);
    }

    #[tokio::test]
    async fn test_upload_missing_root_fails() {
        let mirror = mirror();
        let dir = tempfile::tempdir().unwrap();
        assert!(mirror.upload_tree(&dir.path().join("nope"), "dist/a").await.is_err());
    }

    #[tokio::test]
    async fn test_download_does_not_cross_prefix_boundary() {
        let mirror = mirror();
        let store = mirror.store();
        store
            .put(&ObjectPath::from("source/abc/index.html"), b"mine".to_vec().into())
            .await
            .unwrap();
        store
            .put(&ObjectPath::from("source/abcd/index.html"), b"other".to_vec().into())
            .await
            .unwrap();

        let dest = tempfile::tempdir().unwrap();
        let written = mirror.download_prefix("source/abc", dest.path()).await.unwrap();
        assert_eq!(written, 1);
        assert_eq!(std::fs::read(dest.path().join("index.html")).unwrap(), b"mine");
    }

    #[tokio::test]
    async fn test_download_is_idempotent() {
        let mirror = mirror();
        mirror
            .store()
            .put(&ObjectPath::from("source/abc/a.txt"), b"fresh".to_vec().into())
            .await
            .unwrap();

        let dest = tempfile::tempdir().unwrap();
        write(dest.path(), "a.txt", b"stale contents that are longer");
        write(dest.path(), "local-only.txt", b"kept");

        mirror.download_prefix("source/abc", dest.path()).await.unwrap();
        mirror.download_prefix("source/abc", dest.path()).await.unwrap();

        assert_eq!(std::fs::read(dest.path().join("a.txt")).unwrap(), b"fresh");
        assert!(dest.path().join("local-only.txt").exists());
    }

    #[tokio::test]
    async fn test_download_empty_prefix() {
        let mirror = mirror();
        let dest = tempfile::tempdir().unwrap();
        assert_eq!(mirror.download_prefix("source/none", dest.path()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_file_is_reported_not_raised() {
        let store = FaultyStore::new(Arc::new(InMemory::new())).fail_on("dist/xyz/b.txt");
        let mirror = ObjectMirror::new(Arc::new(store));
        let src = tempfile::tempdir().unwrap();
        write(src.path(), "a.txt", b"a");
        write(src.path(), "b.txt", b"b");

        let report = mirror.upload_tree(src.path(), "dist/xyz").await.unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.uploaded, vec!["dist/xyz/a.txt".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "dist/xyz/b.txt");
        assert!(report.failed[0].1.contains("injected failure"));
    }

    #[tokio::test]
    async fn test_download_fails_on_first_failed_transfer() {
        let inner = Arc::new(InMemory::new());
        for key in ["source/abc/a.txt", "source/abc/b.txt", "source/abc/c/d.txt"] {
            inner
                .put(&ObjectPath::from(key), b"x".to_vec().into())
                .await
                .unwrap();
        }
        let mirror = ObjectMirror::new(Arc::new(
            FaultyStore::new(inner).fail_on("source/abc/b.txt"),
        ));

        let dest = tempfile::tempdir().unwrap();
        let err = mirror
            .download_prefix("source/abc", dest.path())
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::ObjectStore(_)), "{err}");
        assert!(!dest.path().join("b.txt").exists());
    }
}
