//! On-disk cache of built torrent artifacts.
//!
//! Each artifact lives at `<dir>/<stem>.torrent` next to a `<stem>.torrent.key`
//! sidecar holding the [`CacheKey`] it was built from. Whether an existing
//! artifact is reused depends on the [`CachePolicy`]:
//!
//! - [`CachePolicy::Content`] reuses it only while the sidecar matches the
//!   current key, so a changed manifest or blob set triggers a rebuild.
//! - [`CachePolicy::Existence`] reuses any artifact that exists.
//!
//! Writes are atomic (temporary file, fsync, rename), and callers serialize
//! the whole check-build-store sequence of one artifact through
//! [`TorrentCache::lock`].

mod atomic;
mod error;
mod key;

pub use error::CacheError;
pub use key::CacheKey;

use crate::constants::{KEY_EXTENSION, TORRENT_EXTENSION};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

/// When an existing artifact may be served instead of rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// Reuse whenever the artifact file exists.
    Existence,
    /// Reuse only if the artifact was built from the current inputs.
    #[default]
    Content,
}

impl FromStr for CachePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "existence" => Ok(CachePolicy::Existence),
            "content" => Ok(CachePolicy::Content),
            other => Err(format!("unknown cache policy: {other}")),
        }
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CachePolicy::Existence => "existence",
            CachePolicy::Content => "content",
        })
    }
}

pub struct TorrentCache {
    dir: PathBuf,
    policy: CachePolicy,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TorrentCache {
    pub fn new(dir: impl Into<PathBuf>, policy: CachePolicy) -> Self {
        Self {
            dir: dir.into(),
            policy,
            locks: DashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Final path of the artifact named `stem`.
    pub fn artifact_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{stem}.{TORRENT_EXTENSION}"))
    }

    /// Path of the key sidecar belonging to `artifact`.
    pub fn key_path(artifact: &Path) -> PathBuf {
        let mut name = artifact.as_os_str().to_owned();
        name.push(".");
        name.push(KEY_EXTENSION);
        PathBuf::from(name)
    }

    /// Acquires the write lock for the artifact named `stem`.
    ///
    /// Held across lookup, build and store so concurrent passes never race on
    /// one target file.
    pub async fn lock(&self, stem: &str) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(stem.to_string()).or_default().clone();
        lock.lock_owned().await
    }

    /// Returns the artifact path if the existing artifact may be reused.
    pub async fn lookup(
        &self,
        artifact: &Path,
        key: &CacheKey,
    ) -> Result<Option<PathBuf>, CacheError> {
        match tokio::fs::metadata(artifact).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CacheError::Read {
                    path: artifact.to_path_buf(),
                    source,
                })
            }
        }

        if self.policy == CachePolicy::Existence {
            debug!(path = %artifact.display(), "artifact exists, reusing");
            return Ok(Some(artifact.to_path_buf()));
        }

        let key_path = Self::key_path(artifact);
        let stored = match tokio::fs::read_to_string(&key_path).await {
            Ok(stored) => stored,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %artifact.display(), "artifact has no key, rebuilding");
                return Ok(None);
            }
            Err(source) => {
                return Err(CacheError::Read {
                    path: key_path,
                    source,
                })
            }
        };

        if key.matches(&stored) {
            debug!(path = %artifact.display(), %key, "artifact key matches, reusing");
            Ok(Some(artifact.to_path_buf()))
        } else {
            debug!(path = %artifact.display(), "artifact key is stale, rebuilding");
            Ok(None)
        }
    }

    /// Atomically writes `bytes` to `artifact`, then its key sidecar.
    pub async fn store(
        &self,
        artifact: &Path,
        bytes: &[u8],
        key: &CacheKey,
    ) -> Result<PathBuf, CacheError> {
        if let Some(parent) = artifact.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| CacheError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        atomic::write_atomic(artifact, bytes).await?;
        atomic::write_atomic(&Self::key_path(artifact), key.as_str().as_bytes()).await?;

        info!(path = %artifact.display(), bytes = bytes.len(), "wrote torrent");
        Ok(artifact.to_path_buf())
    }
}
