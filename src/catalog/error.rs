use crate::cache::CacheError;
use crate::manifest::ManifestError;
use crate::metainfo::MetainfoError;
use crate::store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Why one torrent could not be built. Never aborts a discovery pass.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Metainfo(#[from] MetainfoError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("failed to list {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures that abort a whole discovery pass.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("model store is unreadable: {0}")]
    StoreUnreadable(#[source] StoreError),
}
