use crate::store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("invalid model name {0:?}")]
    InvalidName(String),

    /// Neither the flat nor the nested layout holds a manifest for the name.
    #[error("no manifest for {name} in namespace {namespace}")]
    NotFound { name: String, namespace: String },

    #[error("malformed manifest {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("unrecognized manifest layout at {}", .0.display())]
    UnrecognizedLayout(PathBuf),

    #[error("failed to read manifest {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}
