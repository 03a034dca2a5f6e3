//! modelseed - BitTorrent metainfo for a local Ollama model store
//!
//! Models in an Ollama store are a manifest plus content-addressed blobs.
//! This crate turns each model into a private multi-file torrent so the
//! blobs can be shared between hosts, and serves those torrents over HTTP.
//!
//! # Modules
//!
//! - [`bencode`] - BEP-3 canonical Bencode encoding/decoding
//! - [`store`] - Blob store layout and digest handling
//! - [`manifest`] - Model names, manifest discovery and parsing
//! - [`metainfo`] - Piece hashing and torrent construction
//! - [`cache`] - Persisted torrents keyed by their inputs
//! - [`catalog`] - Store scans and the published model list
//! - [`config`] - Layered configuration
//! - [`http`] - The HTTP API

pub mod bencode;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod http;
pub mod manifest;
pub mod metainfo;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use bencode::{decode, encode, BencodeError, Value};
pub use cache::{CacheError, CacheKey, CachePolicy, TorrentCache};
pub use catalog::{BuildError, CatalogError, CatalogSnapshot, Model, ModelCatalog};
pub use config::{Config, ConfigError};
pub use manifest::{ManifestError, ManifestResolver, ModelName};
pub use metainfo::{InfoHash, MetainfoBuilder, MetainfoError, TorrentDescriptor};
pub use store::{BlobStore, Digest, StoreError};
