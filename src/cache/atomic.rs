use super::error::CacheError;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Removes a temporary file on drop unless it was renamed into place.
pub(super) struct TempFile {
    path: Option<PathBuf>,
}

impl TempFile {
    pub(super) fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn persisted(mut self) {
        self.path = None;
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Temporary sibling of `path`, hidden and unique per call.
pub(super) fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{:016x}.tmp", rand::random::<u64>()))
}

/// Writes `bytes` to `path` so readers see either the old file or the
/// complete new one.
///
/// Data goes to a temporary file in the same directory, is synced, then
/// renamed over `path`. If the future is dropped or any step fails, the
/// temporary file is removed.
pub(super) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let write_err = |source| CacheError::Write {
        path: path.to_path_buf(),
        source,
    };

    let tmp = temp_path(path);
    let temp = TempFile::new(tmp.clone());

    let mut file = tokio::fs::File::create(&tmp).await.map_err(write_err)?;
    file.write_all(bytes).await.map_err(write_err)?;
    file.sync_all().await.map_err(write_err)?;
    drop(file);

    tokio::fs::rename(&tmp, path).await.map_err(write_err)?;
    temp.persisted();

    sync_parent(path).await;
    Ok(())
}

#[cfg(unix)]
async fn sync_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Ok(dir) = tokio::fs::File::open(parent).await {
            let _ = dir.sync_all().await;
        }
    }
}

#[cfg(not(unix))]
async fn sync_parent(_path: &Path) {}
