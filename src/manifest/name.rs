use super::error::ManifestError;
use crate::constants::DEFAULT_TAG;
use crate::metainfo::hex_encode;
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::str::FromStr;

/// Bytes of the name digest kept in a disambiguated artifact stem.
const STEM_DIGEST_LEN: usize = 8;

/// A tag-qualified model name, `model:tag`.
///
/// Both parts end up as path segments when the manifest is located, so
/// anything that could step outside the manifests directory is refused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelName {
    model: String,
    tag: String,
}

impl ModelName {
    pub fn new(model: impl Into<String>, tag: impl Into<String>) -> Result<Self, ManifestError> {
        let model = model.into();
        let tag = tag.into();
        if !valid_segment(&model) || !valid_segment(&tag) || tag.contains(':') {
            return Err(ManifestError::InvalidName(format!("{model}:{tag}")));
        }
        Ok(Self { model, tag })
    }

    /// Parses `model[:tag]`, defaulting the tag to `latest`.
    pub fn parse(s: &str) -> Result<Self, ManifestError> {
        let (model, tag) = s.split_once(':').unwrap_or((s, DEFAULT_TAG));
        Self::new(model, tag).map_err(|_| ManifestError::InvalidName(s.to_string()))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// File-system friendly form used for artifact names.
    ///
    /// `model_tag` when neither part contains `_`. Otherwise the split point
    /// is ambiguous (`a_b:c` and `a:b_c`), so a digest of the full name is
    /// appended: `model_tag-<16 hex>`. A plain stem has exactly one `_` and a
    /// suffixed one at least two, so distinct names never share a stem.
    pub fn file_stem(&self) -> String {
        let stem = format!("{}_{}", self.model, self.tag);
        if !self.model.contains('_') && !self.tag.contains('_') {
            return stem;
        }
        let digest = Sha256::digest(self.to_string().as_bytes());
        format!("{stem}-{}", hex_encode(&digest[..STEM_DIGEST_LEN]))
    }
}

fn valid_segment(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && !s.contains(['/', '\\', '\0'])
}

impl FromStr for ModelName {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.model, self.tag)
    }
}
