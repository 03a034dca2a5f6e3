use super::document::ManifestDocument;
use super::error::ManifestError;
use super::layout::{ManifestLayout, ManifestLocation};
use super::name::ModelName;
use crate::store::{BlobStore, Digest, StoreError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

/// What to do when a manifest references a blob the store does not have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingBlobPolicy {
    /// Fail the model's build with `BlobNotFound`.
    #[default]
    Fail,
    /// Leave the layer out of the file list and log a warning.
    Skip,
}

/// One file a model's torrent carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFile {
    /// Content digest; `None` for the manifest file itself.
    pub digest: Option<Digest>,
    /// Size in bytes as declared by the manifest (or the manifest's own size).
    pub size: u64,
    /// Absolute path in the store.
    pub path: PathBuf,
    /// Path segments relative to the store root, as written to the torrent.
    pub torrent_path: Vec<String>,
}

/// A located and parsed manifest whose blobs have not been resolved yet.
#[derive(Debug, Clone)]
pub struct ModelManifest {
    pub location: ManifestLocation,
    pub raw: Bytes,
    pub document: ManifestDocument,
}

impl ModelManifest {
    /// Size of the manifest file plus every declared layer.
    pub fn declared_size(&self) -> u64 {
        self.document
            .layers_size()
            .and_then(|layers| layers.checked_add(self.raw.len() as u64))
            .unwrap_or(u64::MAX)
    }
}

/// A manifest together with its resolved file list.
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    pub manifest: ModelManifest,
    pub files: Vec<ManifestFile>,
}

impl ResolvedModel {
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// Locates manifests by model name and resolves their layers to blob paths.
#[derive(Debug, Clone)]
pub struct ManifestResolver {
    store: BlobStore,
    namespace: String,
    missing_blob: MissingBlobPolicy,
}

impl ManifestResolver {
    pub fn new(
        store: BlobStore,
        namespace: impl Into<String>,
        missing_blob: MissingBlobPolicy,
    ) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            missing_blob,
        }
    }

    pub fn store(&self) -> &BlobStore {
        &self.store
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Resolves a model name to its manifest and ordered file list.
    pub async fn resolve(&self, name: &str) -> Result<ResolvedModel, ManifestError> {
        let location = self.locate(name).await?;
        self.resolve_location(location).await
    }

    /// Loads the manifest at an already known location and resolves it.
    pub async fn resolve_location(
        &self,
        location: ManifestLocation,
    ) -> Result<ResolvedModel, ManifestError> {
        let manifest = self.load(location).await?;
        let files = self.files(&manifest).await?;
        Ok(ResolvedModel { manifest, files })
    }

    /// Finds the manifest for `name`, trying the flat layout before the
    /// nested one.
    pub async fn locate(&self, name: &str) -> Result<ManifestLocation, ManifestError> {
        let name = ModelName::parse(name)?;
        let namespace_dir = self.store.manifests_dir().join(&self.namespace);

        for layout in ManifestLayout::ALL {
            for path in layout.candidates(&namespace_dir, &name) {
                if tokio::fs::metadata(&path)
                    .await
                    .is_ok_and(|meta| meta.is_file())
                {
                    debug!(%name, %layout, path = %path.display(), "located manifest");
                    return Ok(ManifestLocation {
                        name,
                        namespace: self.namespace.clone(),
                        layout,
                        path,
                    });
                }
            }
        }

        Err(ManifestError::NotFound {
            name: name.to_string(),
            namespace: self.namespace.clone(),
        })
    }

    /// Reads and parses the manifest at `location`.
    pub async fn load(&self, location: ManifestLocation) -> Result<ModelManifest, ManifestError> {
        let raw = match tokio::fs::read(&location.path).await {
            Ok(raw) => Bytes::from(raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ManifestError::NotFound {
                    name: location.name.to_string(),
                    namespace: location.namespace,
                })
            }
            Err(source) => {
                return Err(ManifestError::Read {
                    path: location.path,
                    source,
                })
            }
        };

        let document = ManifestDocument::from_slice(&raw).map_err(|e| ManifestError::Parse {
            path: location.path.clone(),
            reason: e.to_string(),
        })?;

        if document.layers_size().is_none() {
            return Err(ManifestError::Parse {
                path: location.path,
                reason: "declared layer sizes overflow".into(),
            });
        }

        Ok(ModelManifest {
            location,
            raw,
            document,
        })
    }

    /// Builds the ordered file list: the manifest itself, then every layer.
    pub async fn files(&self, manifest: &ModelManifest) -> Result<Vec<ManifestFile>, ManifestError> {
        let manifest_path = &manifest.location.path;
        let torrent_path = self.store.relative_segments(manifest_path).ok_or_else(|| {
            ManifestError::UnrecognizedLayout(manifest_path.clone())
        })?;

        let mut files = Vec::with_capacity(manifest.document.layers.len() + 1);
        files.push(ManifestFile {
            digest: None,
            size: manifest.raw.len() as u64,
            path: manifest_path.clone(),
            torrent_path,
        });

        for layer in &manifest.document.layers {
            let path = match self.store.resolve(&layer.digest).await {
                Ok(path) => path,
                Err(StoreError::BlobNotFound { digest, path })
                    if self.missing_blob == MissingBlobPolicy::Skip =>
                {
                    warn!(
                        model = %manifest.location.name,
                        %digest,
                        path = %path.display(),
                        "layer blob missing, leaving it out"
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let torrent_path = self
                .store
                .relative_segments(&path)
                .ok_or_else(|| ManifestError::UnrecognizedLayout(path.clone()))?;

            files.push(ManifestFile {
                digest: Some(layer.digest.clone()),
                size: layer.size,
                path,
                torrent_path,
            });
        }

        Ok(files)
    }
}
