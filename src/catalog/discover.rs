//! Store traversal. Reads directory listings only: no manifest is parsed and
//! nothing is written here.

use super::error::{BuildError, CatalogError};
use crate::constants::MANIFESTS_DIR;
use crate::manifest::{ManifestFile, ManifestLocation};
use crate::store::{BlobStore, Digest};
use std::collections::btree_map::{BTreeMap, Entry};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A model found during traversal, before its manifest is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredModel {
    pub location: ManifestLocation,
    /// Other manifests mapping to the same name, not used.
    pub shadowed: Vec<PathBuf>,
}

/// Lists every model in the store, one per canonical name.
///
/// When a name appears more than once, the manifest a lookup in `namespace`
/// would find wins (see [`ManifestLocation::preference`]).
///
/// Only a store root or manifests directory that cannot be listed is an
/// error; unreadable subdirectories and unrecognized paths are logged and
/// skipped.
pub async fn discover(
    store: &BlobStore,
    namespace: &str,
) -> Result<Vec<DiscoveredModel>, CatalogError> {
    store.check_root().await.map_err(CatalogError::StoreUnreadable)?;

    let manifests_dir = store.manifests_dir();
    let (paths, errors) = walk(&manifests_dir).await;
    for (path, error) in errors {
        warn!(path = %path.display(), %error, "cannot list manifest directory, skipping");
    }

    Ok(select(&manifests_dir, namespace, paths))
}

/// Classifies manifest paths and keeps the preferred manifest for each name.
/// Output is sorted by name.
pub fn select(
    manifests_dir: &Path,
    namespace: &str,
    paths: Vec<PathBuf>,
) -> Vec<DiscoveredModel> {
    let mut locations: Vec<ManifestLocation> = paths
        .iter()
        .filter_map(|path| match ManifestLocation::from_path(manifests_dir, path) {
            Ok(location) => Some(location),
            Err(error) => {
                warn!(%error, "skipping manifest");
                None
            }
        })
        .collect();
    locations.sort_by(|a, b| a.preference(namespace).cmp(&b.preference(namespace)));

    let mut models: BTreeMap<String, DiscoveredModel> = BTreeMap::new();
    for location in locations {
        match models.entry(location.name.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(DiscoveredModel {
                    location,
                    shadowed: Vec::new(),
                });
            }
            Entry::Occupied(mut slot) => {
                debug!(
                    name = %location.name,
                    kept = %slot.get().location.path.display(),
                    ignored = %location.path.display(),
                    "duplicate model name"
                );
                slot.get_mut().shadowed.push(location.path);
            }
        }
    }

    models.into_values().collect()
}

/// Every file under `manifests/` and `blobs/`, ordered by torrent path.
///
/// Blob digests are recovered from their file names; manifests and files
/// whose names are not digests carry none.
pub async fn store_files(store: &BlobStore) -> Result<Vec<ManifestFile>, BuildError> {
    let mut files = Vec::new();

    for dir in [store.manifests_dir(), store.blobs_dir()] {
        let (paths, errors) = walk(&dir).await;
        if let Some((path, source)) = errors.into_iter().next() {
            return Err(BuildError::Walk { path, source });
        }

        for path in paths {
            let Some(torrent_path) = store.relative_segments(&path) else {
                continue;
            };
            let size = tokio::fs::metadata(&path)
                .await
                .map_err(|source| BuildError::Walk {
                    path: path.clone(),
                    source,
                })?
                .len();
            let digest = if torrent_path[0] == MANIFESTS_DIR {
                None
            } else {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|n| n.replacen('-', ":", 1).parse::<Digest>().ok())
            };

            files.push(ManifestFile {
                digest,
                size,
                path,
                torrent_path,
            });
        }
    }

    files.sort_by(|a, b| a.torrent_path.cmp(&b.torrent_path));
    Ok(files)
}

/// Recursively lists regular files below `root`, following symlinks.
///
/// Each directory is entered once by canonical path, so symlink cycles and
/// links back into the tree are not walked twice. Returns the files found
/// and every directory that could not be read.
async fn walk(root: &Path) -> (Vec<PathBuf>, Vec<(PathBuf, std::io::Error)>) {
    let mut files = Vec::new();
    let mut errors = Vec::new();
    let mut visited = HashSet::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let real = match tokio::fs::canonicalize(&dir).await {
            Ok(real) => real,
            Err(e) => {
                errors.push((dir, e));
                continue;
            }
        };
        if !visited.insert(real) {
            debug!(path = %dir.display(), "directory already walked, skipping");
            continue;
        }

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                errors.push((dir, e));
                continue;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    errors.push((dir.clone(), e));
                    break;
                }
            };

            let path = entry.path();
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_dir() => pending.push(path),
                Ok(meta) if meta.is_file() => files.push(path),
                Ok(_) => {}
                Err(error) => debug!(path = %path.display(), %error, "skipping entry"),
            }
        }
    }

    (files, errors)
}
