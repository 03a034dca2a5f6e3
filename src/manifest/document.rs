use crate::store::Digest;
use serde::Deserialize;

/// The parts of an OCI-style image manifest the builder needs.
///
/// `schemaVersion`, `mediaType` and `config` are accepted but play no part in
/// the torrent; only `layers` is required.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDocument {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub config: Option<Layer>,
    pub layers: Vec<Layer>,
}

/// One content-addressed layer: a digest and its declared size.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    #[serde(default)]
    pub media_type: Option<String>,
    pub digest: Digest,
    pub size: u64,
}

impl ManifestDocument {
    pub fn from_slice(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// Sum of declared layer sizes, `None` on overflow.
    pub fn layers_size(&self) -> Option<u64> {
        self.layers
            .iter()
            .try_fold(0u64, |acc, layer| acc.checked_add(layer.size))
    }
}
