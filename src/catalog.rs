//! Model catalog: discovery, per-model builds and the published snapshot.
//!
//! A refresh runs in two steps. [`discover`] walks the manifests directory
//! and picks one manifest per model name without reading any of them. Each
//! discovered model is then built independently: its manifest is parsed,
//! blobs resolved, and the torrent reused from the cache or rebuilt.
//!
//! A model whose build fails is still listed, without an artifact; a model
//! whose manifest cannot be read is left out. Only an unreadable store
//! aborts the pass. Every pass ends by publishing a new
//! [`CatalogSnapshot`]; readers holding the previous one are unaffected.

mod discover;
mod error;

pub use discover::{discover, select, store_files, DiscoveredModel};
pub use error::{BuildError, CatalogError};

use crate::cache::{CacheKey, TorrentCache};
use crate::constants::{DEFAULT_TORRENT_NAME, MANIFESTS_DIR, STORE_ARTIFACT_STEM};
use crate::manifest::{ManifestFile, ManifestResolver, ModelManifest, ModelName};
use crate::metainfo::{MetainfoBuilder, MetainfoError, TorrentDescriptor};
use crate::store::BlobStore;
use parking_lot::RwLock;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// One entry of the catalog listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Model {
    /// Canonical `model:tag` name.
    pub name: String,
    /// Manifest size plus the size of every layer.
    pub size: u64,
    /// Manifest the model was discovered from.
    pub path: PathBuf,
    /// Built artifact; absent when the build failed.
    pub torrent_file: Option<PathBuf>,
    pub info_hash: Option<String>,
    /// Unix time of the pass that discovered the model.
    pub created_at: i64,
}

/// A torrent written (or reused) by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub info_hash: String,
    /// Total bytes the torrent describes.
    pub size: u64,
}

/// Immutable result of one discovery pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogSnapshot {
    /// Sorted by name.
    pub models: Vec<Model>,
    pub store_torrent: Option<Artifact>,
    pub published_at: i64,
}

impl CatalogSnapshot {
    /// Looks a model up by canonical name.
    pub fn get(&self, name: &str) -> Option<&Model> {
        self.models
            .binary_search_by(|m| m.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.models[i])
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Models that have a torrent.
    pub fn built(&self) -> usize {
        self.models.iter().filter(|m| m.torrent_file.is_some()).count()
    }
}

#[derive(Debug, Clone)]
pub struct CatalogOptions {
    pub announce: String,
    /// `info.name` of every torrent.
    pub label: String,
    pub model_piece_length: u64,
    pub store_piece_length: u64,
    pub max_concurrent_builds: usize,
    /// Also build `models.torrent` over the whole store.
    pub store_torrent: bool,
}

/// Torrent label for a store: its root directory name, or `models`.
pub fn store_label(root: &Path) -> String {
    root.file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_TORRENT_NAME)
        .to_string()
}

pub struct ModelCatalog {
    resolver: ManifestResolver,
    cache: TorrentCache,
    options: CatalogOptions,
    snapshot: RwLock<Arc<CatalogSnapshot>>,
    refresh: Mutex<()>,
}

impl ModelCatalog {
    pub fn new(resolver: ManifestResolver, cache: TorrentCache, options: CatalogOptions) -> Self {
        Self {
            resolver,
            cache,
            options,
            snapshot: RwLock::new(Arc::new(CatalogSnapshot::default())),
            refresh: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &BlobStore {
        self.resolver.store()
    }

    pub fn cache(&self) -> &TorrentCache {
        &self.cache
    }

    pub fn options(&self) -> &CatalogOptions {
        &self.options
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.snapshot.read().clone()
    }

    /// Runs one discovery pass and publishes its snapshot.
    ///
    /// Passes never overlap; a call made while one is running waits for it
    /// and then runs its own. Dropping the returned future cancels the pass
    /// and its builds without publishing anything.
    pub async fn refresh(self: &Arc<Self>) -> Result<Arc<CatalogSnapshot>, CatalogError> {
        let _pass = self.refresh.lock().await;
        let started = Instant::now();
        let created_at = unix_now();

        let discovered = discover(self.store(), self.resolver.namespace()).await?;
        let found = discovered.len();

        let permits = Arc::new(Semaphore::new(self.options.max_concurrent_builds.max(1)));
        let mut builds = JoinSet::new();
        for model in discovered {
            let catalog = Arc::clone(self);
            let permits = Arc::clone(&permits);
            builds.spawn(async move {
                let _permit = permits.acquire_owned().await;
                catalog.catalog_entry(model, created_at).await
            });
        }

        let mut models = Vec::with_capacity(found);
        while let Some(joined) = builds.join_next().await {
            match joined {
                Ok(Some(model)) => models.push(model),
                Ok(None) => {}
                Err(error) => warn!(%error, "model build task failed"),
            }
        }
        models.sort_by(|a, b| a.name.cmp(&b.name));

        let store_torrent = if self.options.store_torrent {
            match self.build_store().await {
                Ok(artifact) => Some(artifact),
                Err(error) => {
                    warn!(%error, "failed to build store torrent");
                    None
                }
            }
        } else {
            None
        };

        let snapshot = Arc::new(CatalogSnapshot {
            models,
            store_torrent,
            published_at: unix_now(),
        });
        *self.snapshot.write() = Arc::clone(&snapshot);

        info!(
            discovered = found,
            listed = snapshot.len(),
            built = snapshot.built(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "catalog refreshed"
        );
        Ok(snapshot)
    }

    async fn catalog_entry(&self, model: DiscoveredModel, created_at: i64) -> Option<Model> {
        let name = model.location.name.to_string();
        let path = model.location.path.clone();

        let manifest = match self.resolver.load(model.location).await {
            Ok(manifest) => manifest,
            Err(error) => {
                warn!(model = %name, %error, "skipping model");
                return None;
            }
        };

        let mut entry = Model {
            name,
            size: manifest.declared_size(),
            path,
            torrent_file: None,
            info_hash: None,
            created_at,
        };

        match self.build_manifest(&manifest).await {
            Ok(artifact) => {
                entry.size = artifact.size;
                entry.torrent_file = Some(artifact.path);
                entry.info_hash = Some(artifact.info_hash);
            }
            Err(error) => warn!(model = %entry.name, %error, "model has no torrent"),
        }

        Some(entry)
    }

    /// Builds (or reuses) the torrent of a single model by name.
    pub async fn build(&self, name: &str) -> Result<Artifact, BuildError> {
        let location = self.resolver.locate(name).await?;
        let manifest = self.resolver.load(location).await?;
        self.build_manifest(&manifest).await
    }

    async fn build_manifest(&self, manifest: &ModelManifest) -> Result<Artifact, BuildError> {
        let files = self.resolver.files(manifest).await?;
        let name = &manifest.location.name;
        let builder = self.model_builder(name);
        let key = CacheKey::compute(&builder, &files, &[manifest.raw.as_ref()]);

        self.build_cached(&name.file_stem(), &builder, &files, &key)
            .await
    }

    /// Builds (or reuses) the torrent covering the whole store.
    pub async fn build_store(&self) -> Result<Artifact, BuildError> {
        let files = store_files(self.store()).await?;

        let mut manifests = Vec::new();
        for file in files.iter().filter(|f| f.torrent_path[0] == MANIFESTS_DIR) {
            let bytes = tokio::fs::read(&file.path)
                .await
                .map_err(|source| MetainfoError::Hashing {
                    path: file.path.clone(),
                    source,
                })?;
            manifests.push(bytes);
        }
        let content: Vec<&[u8]> = manifests.iter().map(Vec::as_slice).collect();

        let builder = MetainfoBuilder::new(&self.options.label, &self.options.announce)
            .piece_length(self.options.store_piece_length)
            .comment(format!("Model store: {}", self.options.label));
        let key = CacheKey::compute(&builder, &files, &content);

        self.build_cached(STORE_ARTIFACT_STEM, &builder, &files, &key)
            .await
    }

    fn model_builder(&self, name: &ModelName) -> MetainfoBuilder {
        MetainfoBuilder::new(&self.options.label, &self.options.announce)
            .piece_length(self.options.model_piece_length)
            .comment(format!("Model: {name}"))
    }

    async fn build_cached(
        &self,
        stem: &str,
        builder: &MetainfoBuilder,
        files: &[ManifestFile],
        key: &CacheKey,
    ) -> Result<Artifact, BuildError> {
        let _guard = self.cache.lock(stem).await;
        let target = self.cache.artifact_path(stem);
        let size = files.iter().map(|f| f.size).sum();

        if let Some(path) = self.cache.lookup(&target, key).await? {
            match read_info_hash(&path).await {
                Ok(info_hash) => {
                    debug!(artifact = %path.display(), "reusing torrent");
                    return Ok(Artifact {
                        path,
                        info_hash,
                        size,
                    });
                }
                Err(error) => {
                    warn!(artifact = %path.display(), %error, "cached torrent unreadable, rebuilding")
                }
            }
        }

        let descriptor = builder.build(files).await?;
        let bytes = descriptor.encode()?;
        let info_hash = descriptor.info_hash()?.to_hex();
        let path = self.cache.store(&target, &bytes, key).await?;

        Ok(Artifact {
            path,
            info_hash,
            size,
        })
    }
}

async fn read_info_hash(path: &Path) -> Result<String, BuildError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| crate::cache::CacheError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(TorrentDescriptor::from_bytes(&bytes)?.info_hash()?.to_hex())
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests;
