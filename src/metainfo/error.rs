use std::path::PathBuf;
use thiserror::Error;

use crate::bencode::BencodeError;

/// Errors raised while hashing, assembling or reading torrent metainfo.
#[derive(Debug, Error)]
pub enum MetainfoError {
    /// Reading a constituent file failed part-way; no pieces are kept.
    #[error("failed to hash {}: {source}", path.display())]
    Hashing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The descriptor would be structurally invalid.
    #[error("cannot encode torrent: {0}")]
    Encoding(String),

    /// A torrent file being read back is not valid bencode.
    #[error("bencode error: {0}")]
    Bencode(#[from] BencodeError),

    /// A required field is missing from the torrent file.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field has an invalid value or type.
    #[error("invalid field: {0}")]
    InvalidField(&'static str),

    /// The info hash has an invalid length.
    #[error("invalid info hash length")]
    InvalidInfoHashLength,
}

impl MetainfoError {
    pub(crate) fn encoding(reason: impl Into<String>) -> Self {
        MetainfoError::Encoding(reason.into())
    }
}
