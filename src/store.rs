//! Adapter over the shared, content-addressed blob store.
//!
//! The store is owned by an external model manager and is only ever read
//! here. Its layout is:
//!
//! ```text
//! <root>/
//!   manifests/<namespace>/...      per-model manifests (see `manifest`)
//!   blobs/sha256-<hex>             content, named after its digest
//! ```

mod digest;
mod error;

pub use digest::Digest;
pub use error::StoreError;

use crate::constants::{BLOBS_DIR, MANIFESTS_DIR};
use std::path::{Component, Path, PathBuf};
use tracing::trace;

/// Read-only view of a blob store rooted at a directory.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Creates an adapter for the store at `root`.
    ///
    /// Relative roots are made absolute against the current directory so
    /// every path handed out by [`BlobStore::resolve`] is absolute.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifests_dir(&self) -> PathBuf {
        self.root.join(MANIFESTS_DIR)
    }

    pub fn blobs_dir(&self) -> PathBuf {
        self.root.join(BLOBS_DIR)
    }

    /// Returns where the blob for `digest` lives, whether or not it exists.
    pub fn blob_path(&self, digest: &Digest) -> PathBuf {
        self.blobs_dir().join(digest.blob_file_name())
    }

    /// Maps a digest to the absolute path of its blob.
    ///
    /// The blob must be a regular file that can be opened for reading.
    pub async fn resolve(&self, digest: &Digest) -> Result<PathBuf, StoreError> {
        let path = self.blob_path(digest);

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(StoreError::BlobNotFound {
                    digest: digest.clone(),
                    path,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::BlobNotFound {
                    digest: digest.clone(),
                    path,
                })
            }
            Err(source) => return Err(StoreError::BlobUnreadable { path, source }),
        }

        if let Err(source) = tokio::fs::File::open(&path).await {
            return Err(StoreError::BlobUnreadable { path, source });
        }

        trace!(%digest, path = %path.display(), "resolved blob");
        Ok(path)
    }

    /// Verifies the store root and its manifests directory can be listed.
    pub async fn check_root(&self) -> Result<(), StoreError> {
        for dir in [self.root.clone(), self.manifests_dir()] {
            tokio::fs::read_dir(&dir)
                .await
                .map_err(|source| StoreError::RootUnreadable { path: dir, source })?;
        }
        Ok(())
    }

    /// Splits `path` into the segments it has below the store root.
    ///
    /// These are the `path` entries written into torrent file lists, so the
    /// swarm reproduces the store layout under the torrent's name directory.
    pub fn relative_segments(&self, path: &Path) -> Option<Vec<String>> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let segments: Option<Vec<String>> = relative
            .components()
            .map(|c| match c {
                Component::Normal(s) => s.to_str().map(String::from),
                _ => None,
            })
            .collect();
        segments.filter(|s| !s.is_empty())
    }
}
