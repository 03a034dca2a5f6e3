use super::digest::Digest;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The manifest references content that is not in the store.
    #[error("blob {digest} not found at {}", path.display())]
    BlobNotFound { digest: Digest, path: PathBuf },

    #[error("blob at {} is not readable: {source}", path.display())]
    BlobUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("store directory {} is not readable: {source}", path.display())]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
