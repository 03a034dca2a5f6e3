//! Blob store fixtures shared by unit tests.

use crate::constants::DEFAULT_NAMESPACE;
use crate::manifest::ManifestLayout;
use crate::store::{BlobStore, Digest};
use sha2::{Digest as _, Sha256};
use std::path::PathBuf;
use tempfile::TempDir;

pub struct StoreFixture {
    pub dir: TempDir,
    pub store: BlobStore,
}

impl StoreFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("models");
        std::fs::create_dir_all(root.join("manifests").join(DEFAULT_NAMESPACE)).unwrap();
        std::fs::create_dir_all(root.join("blobs")).unwrap();
        let store = BlobStore::new(root);
        Self { dir, store }
    }

    /// Writes `content` as a blob and returns its digest.
    pub fn add_blob(&self, content: &[u8]) -> Digest {
        let hex: String = Sha256::digest(content)
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        let digest = Digest::parse(&format!("sha256:{hex}")).unwrap();
        std::fs::write(self.store.blob_path(&digest), content).unwrap();
        digest
    }

    /// Writes a manifest listing `layers` and returns its path.
    pub fn add_manifest(
        &self,
        layout: ManifestLayout,
        model: &str,
        tag: &str,
        layers: &[(Digest, u64)],
    ) -> PathBuf {
        let body = manifest_json(layers);
        self.write_manifest(layout, model, tag, body.as_bytes())
    }

    pub fn write_manifest(
        &self,
        layout: ManifestLayout,
        model: &str,
        tag: &str,
        body: &[u8],
    ) -> PathBuf {
        let mut path = self.store.manifests_dir().join(DEFAULT_NAMESPACE);
        if layout == ManifestLayout::Namespaced {
            path.push("library");
        }
        path.push(model);
        std::fs::create_dir_all(&path).unwrap();
        path.push(tag);
        std::fs::write(&path, body).unwrap();
        path
    }

    /// Adds one blob per entry in `contents` and a flat manifest for them.
    pub fn add_model(&self, model: &str, tag: &str, contents: &[&[u8]]) -> PathBuf {
        let layers: Vec<(Digest, u64)> = contents
            .iter()
            .map(|c| (self.add_blob(c), c.len() as u64))
            .collect();
        self.add_manifest(ManifestLayout::Flat, model, tag, &layers)
    }
}

pub fn manifest_json(layers: &[(Digest, u64)]) -> String {
    let layers: Vec<serde_json::Value> = layers
        .iter()
        .map(|(digest, size)| {
            serde_json::json!({
                "mediaType": "application/vnd.ollama.image.model",
                "digest": digest.to_string(),
                "size": size,
            })
        })
        .collect();
    serde_json::json!({
        "schemaVersion": 2,
        "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
        "layers": layers,
    })
    .to_string()
}
