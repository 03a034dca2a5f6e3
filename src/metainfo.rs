//! Torrent metainfo ([BEP-3]) for model files.
//!
//! The files of a model are hashed as one logical stream with
//! [`PieceHasher`], assembled into a private multi-file [`TorrentDescriptor`]
//! by [`MetainfoBuilder`] and serialized with the canonical bencode encoding.
//!
//! # Torrent Structure
//!
//! - **announce** - tracker URL, the only peer source (the torrent is private)
//! - **comment**, **created by**, **creation date**, **encoding**
//! - **info** - hashed to form the info hash
//!   - `name` - store label, used as the download directory
//!   - `piece length` - clamped to the content size
//!   - `pieces` - concatenated SHA-1 digests, one per piece
//!   - `files` - `length` + `path` per file, in hashing order
//!   - `private` - always `1`
//!
//! Encoding a descriptor twice yields identical bytes; only `creation date`
//! changes between two builds of the same content.
//!
//! [BEP-3]: http://bittorrent.org/beps/bep_0003.html

mod builder;
mod descriptor;
mod error;
mod info_hash;
mod pieces;

pub use builder::MetainfoBuilder;
pub use descriptor::{FileEntry, InfoDict, TorrentDescriptor};
pub use error::MetainfoError;
pub use info_hash::InfoHash;
pub(crate) use info_hash::hex_encode;
pub use pieces::{piece_length_for, PieceAccumulator, PieceHashes, PieceHasher};
