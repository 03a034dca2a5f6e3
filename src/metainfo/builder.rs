//! Builder for private multi-file torrents over store files.
//!
//! # Examples
//!
//! ```no_run
//! use modelseed::manifest::{ManifestResolver, MissingBlobPolicy};
//! use modelseed::metainfo::MetainfoBuilder;
//! use modelseed::store::BlobStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = BlobStore::new("/usr/share/ollama/.ollama/models");
//! let resolver = ManifestResolver::new(store, "registry.ollama.ai", MissingBlobPolicy::Fail);
//! let model = resolver.resolve("llama3:8b").await?;
//!
//! let torrent = MetainfoBuilder::new("models", "http://10.0.0.2:8081/ollama/announce")
//!     .piece_length(32 * 1024)
//!     .comment("Model: llama3:8b")
//!     .build(&model.files)
//!     .await?;
//!
//! std::fs::write("llama3_8b.torrent", torrent.encode()?)?;
//! # Ok(())
//! # }
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use super::descriptor::{FileEntry, InfoDict, TorrentDescriptor};
use super::error::MetainfoError;
use super::pieces::{piece_length_for, PieceHashes, PieceHasher};
use crate::constants::{CREATED_BY, MODEL_PIECE_LENGTH, READ_CHUNK_SIZE, TORRENT_ENCODING};
use crate::manifest::ManifestFile;

/// Builds a [`TorrentDescriptor`] from an ordered file list.
///
/// The private flag is always set: the torrents this crate produces are only
/// meant to be served by the configured tracker.
#[derive(Debug, Clone)]
pub struct MetainfoBuilder {
    /// Label written to `info.name`; clients use it as the download directory.
    name: String,
    announce: String,
    /// Target piece length, clamped to the content size at build time.
    piece_length: u64,
    comment: Option<String>,
    created_by: Option<String>,
    /// Fixed creation timestamp; defaults to the time of the build.
    creation_date: Option<i64>,
    encoding: Option<String>,
    chunk_size: usize,
}

impl MetainfoBuilder {
    pub fn new(name: impl Into<String>, announce: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            announce: announce.into(),
            piece_length: MODEL_PIECE_LENGTH,
            comment: None,
            created_by: Some(CREATED_BY.to_string()),
            creation_date: None,
            encoding: Some(TORRENT_ENCODING.to_string()),
            chunk_size: READ_CHUNK_SIZE,
        }
    }

    /// Sets the target piece length in bytes.
    pub fn piece_length(mut self, length: u64) -> Self {
        self.piece_length = length;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = Some(created_by.into());
        self
    }

    /// Sets the creation date (Unix timestamp).
    pub fn creation_date(mut self, timestamp: i64) -> Self {
        self.creation_date = Some(timestamp);
        self
    }

    /// Sets the read buffer used while hashing.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn announce(&self) -> &str {
        &self.announce
    }

    pub fn target_piece_length(&self) -> u64 {
        self.piece_length
    }

    pub fn comment_text(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Hashes `files` in order and assembles the descriptor.
    pub async fn build(&self, files: &[ManifestFile]) -> Result<TorrentDescriptor, MetainfoError> {
        if files.is_empty() {
            return Err(MetainfoError::encoding("file list is empty"));
        }
        if self.piece_length == 0 {
            return Err(MetainfoError::encoding("piece length must be positive"));
        }

        let total = files
            .iter()
            .try_fold(0u64, |acc, f| acc.checked_add(f.size))
            .ok_or_else(|| MetainfoError::encoding("total length overflows"))?;
        if total == 0 {
            return Err(MetainfoError::encoding("content is empty"));
        }

        let piece_length = piece_length_for(total, self.piece_length);
        let pieces = PieceHasher::new(piece_length)
            .chunk_size(self.chunk_size)
            .hash_files(files)
            .await?;

        debug!(
            name = %self.name,
            files = files.len(),
            total,
            piece_length,
            pieces = pieces.len(),
            "hashed torrent content"
        );

        let entries = files
            .iter()
            .map(|f| FileEntry {
                length: f.size,
                path: f.torrent_path.clone(),
            })
            .collect();

        self.assemble(entries, piece_length, pieces)
    }

    /// Assembles a descriptor from already computed pieces.
    ///
    /// Fails if the pieces do not match the file list at `piece_length`.
    pub fn assemble(
        &self,
        files: Vec<FileEntry>,
        piece_length: u64,
        pieces: PieceHashes,
    ) -> Result<TorrentDescriptor, MetainfoError> {
        let descriptor = TorrentDescriptor {
            announce: self.announce.clone(),
            comment: self.comment.clone(),
            created_by: self.created_by.clone(),
            creation_date: Some(self.creation_date.unwrap_or_else(unix_now)),
            encoding: self.encoding.clone(),
            info: InfoDict {
                name: self.name.clone(),
                piece_length,
                pieces,
                files,
                private: true,
            },
        };

        if descriptor.announce.is_empty() {
            return Err(MetainfoError::encoding("announce URL is empty"));
        }
        descriptor.info.validate()?;

        Ok(descriptor)
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
