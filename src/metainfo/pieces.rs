//! Piece hashing over an ordered list of files.
//!
//! The files of a torrent form one logical byte stream in their declared
//! order. Pieces are cut from that stream, not from individual files, so a
//! piece may start in one file and end in the next; only the final piece may
//! be shorter than the piece length.

use super::error::MetainfoError;
use crate::constants::{PIECE_HASH_LEN, READ_CHUNK_SIZE};
use crate::manifest::ManifestFile;
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::io::{Error, ErrorKind};
use tokio::io::AsyncReadExt;
use tracing::trace;

/// Ordered SHA-1 piece digests; index `i` covers piece `i` of the stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PieceHashes(Vec<[u8; PIECE_HASH_LEN]>);

impl PieceHashes {
    /// Splits a concatenated `pieces` blob; `None` if its length is not a
    /// multiple of the digest width.
    pub fn from_blob(blob: &[u8]) -> Option<Self> {
        if blob.len() % PIECE_HASH_LEN != 0 {
            return None;
        }
        let hashes = blob
            .chunks_exact(PIECE_HASH_LEN)
            .map(|chunk| {
                let mut arr = [0u8; PIECE_HASH_LEN];
                arr.copy_from_slice(chunk);
                arr
            })
            .collect();
        Some(PieceHashes(hashes))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&[u8; PIECE_HASH_LEN]> {
        self.0.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8; PIECE_HASH_LEN]> {
        self.0.iter()
    }

    /// The concatenated blob stored under `info.pieces`.
    pub fn to_blob(&self) -> Bytes {
        Bytes::from(self.0.concat())
    }
}

/// Clamps the target piece length to the content size.
///
/// Content smaller than the target becomes a single piece exactly as long as
/// the content. Returns 0 for empty content, which the builder rejects.
pub fn piece_length_for(total: u64, target: u64) -> u64 {
    target.min(total)
}

/// Incremental piece hasher fed with consecutive slices of the stream.
///
/// Keeps one running SHA-1 state and the number of bytes already in the
/// current piece, so memory use does not depend on the piece length.
#[derive(Clone)]
pub struct PieceAccumulator {
    piece_length: u64,
    hasher: Sha1,
    filled: u64,
    total: u64,
    pieces: Vec<[u8; PIECE_HASH_LEN]>,
}

impl PieceAccumulator {
    pub fn new(piece_length: u64) -> Result<Self, MetainfoError> {
        if piece_length == 0 {
            return Err(MetainfoError::encoding("piece length must be positive"));
        }
        Ok(Self {
            piece_length,
            hasher: Sha1::new(),
            filled: 0,
            total: 0,
            pieces: Vec::new(),
        })
    }

    /// Appends `data` to the stream, completing as many pieces as it fills.
    pub fn update(&mut self, mut data: &[u8]) {
        self.total += data.len() as u64;

        while !data.is_empty() {
            let room = self.piece_length - self.filled;
            let take = usize::try_from(room).map_or(data.len(), |room| room.min(data.len()));

            self.hasher.update(&data[..take]);
            self.filled += take as u64;
            data = &data[take..];

            if self.filled == self.piece_length {
                self.pieces.push(self.hasher.finalize_reset().into());
                self.filled = 0;
            }
        }
    }

    /// Bytes fed so far.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Completed pieces so far (the partial one is not counted).
    pub fn completed(&self) -> usize {
        self.pieces.len()
    }

    /// Hashes any remaining bytes as the terminal piece.
    pub fn finish(mut self) -> PieceHashes {
        if self.filled > 0 {
            self.pieces.push(self.hasher.finalize().into());
        }
        PieceHashes(self.pieces)
    }
}

/// Streams files from disk through a [`PieceAccumulator`].
#[derive(Debug, Clone)]
pub struct PieceHasher {
    piece_length: u64,
    chunk_size: usize,
}

impl PieceHasher {
    pub fn new(piece_length: u64) -> Self {
        Self {
            piece_length,
            chunk_size: READ_CHUNK_SIZE,
        }
    }

    /// Overrides the read buffer size.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Hashes the concatenation of `files` in order.
    ///
    /// Each file must hold exactly its declared size, otherwise the file list
    /// written next to these pieces would not describe the hashed bytes. Any
    /// failure discards everything hashed so far.
    pub async fn hash_files(&self, files: &[ManifestFile]) -> Result<PieceHashes, MetainfoError> {
        let mut acc = PieceAccumulator::new(self.piece_length)?;
        let mut buf = vec![0u8; self.chunk_size];

        for file in files {
            let hashing = |source: Error| MetainfoError::Hashing {
                path: file.path.clone(),
                source,
            };

            let mut reader = tokio::fs::File::open(&file.path).await.map_err(hashing)?;
            let mut read = 0u64;

            loop {
                let n = reader.read(&mut buf).await.map_err(hashing)?;
                if n == 0 {
                    break;
                }
                read += n as u64;
                if read > file.size {
                    return Err(hashing(Error::new(
                        ErrorKind::InvalidData,
                        format!("file is larger than its declared {} bytes", file.size),
                    )));
                }
                acc.update(&buf[..n]);
            }

            if read < file.size {
                return Err(hashing(Error::new(
                    ErrorKind::UnexpectedEof,
                    format!("read {read} of {} declared bytes", file.size),
                )));
            }

            trace!(
                path = %file.path.display(),
                bytes = read,
                pieces = acc.completed(),
                "hashed file"
            );
        }

        Ok(acc.finish())
    }
}
