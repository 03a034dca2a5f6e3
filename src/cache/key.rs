use crate::manifest::ManifestFile;
use crate::metainfo::{hex_encode, MetainfoBuilder};
use sha2::{Digest, Sha256};
use std::fmt;

/// Fingerprint of everything that determines a descriptor except its
/// creation date.
///
/// Two builds with equal keys produce torrents with the same info hash, so an
/// artifact stored under a key can be served for as long as the key holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Computes the key for building `files` with `builder`.
    ///
    /// `content` carries bytes that have no digest of their own, such as the
    /// manifests listed among `files`.
    pub fn compute(builder: &MetainfoBuilder, files: &[ManifestFile], content: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();

        field(&mut hasher, builder.name().as_bytes());
        field(&mut hasher, builder.announce().as_bytes());
        field(&mut hasher, &builder.target_piece_length().to_be_bytes());
        field(&mut hasher, b"private");
        field(&mut hasher, builder.comment_text().unwrap_or("").as_bytes());

        field(&mut hasher, &(files.len() as u64).to_be_bytes());
        for file in files {
            field(&mut hasher, &(file.torrent_path.len() as u64).to_be_bytes());
            for segment in &file.torrent_path {
                field(&mut hasher, segment.as_bytes());
            }
            field(&mut hasher, &file.size.to_be_bytes());
            let digest = file.digest.as_ref().map(|d| d.to_string()).unwrap_or_default();
            field(&mut hasher, digest.as_bytes());
        }

        field(&mut hasher, &(content.len() as u64).to_be_bytes());
        for bytes in content {
            field(&mut hasher, bytes);
        }

        CacheKey(hex_encode(&hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares against the contents of a key sidecar, ignoring surrounding
    /// whitespace.
    pub fn matches(&self, stored: &str) -> bool {
        stored.trim() == self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Length-prefixed so adjacent fields cannot run into each other.
fn field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}
