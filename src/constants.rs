//! Store layout names, protocol constants and tuning defaults.

// ============================================================================
// Store layout
// ============================================================================

/// Directory below the store root holding per-model manifests.
pub const MANIFESTS_DIR: &str = "manifests";

/// Directory below the store root holding content-addressed blobs.
pub const BLOBS_DIR: &str = "blobs";

/// Registry namespace manifests are resolved in when none is configured.
pub const DEFAULT_NAMESPACE: &str = "registry.ollama.ai";

/// Path segment that marks the nested (`<namespace>/library/...`) layout.
pub const LIBRARY_SEGMENT: &str = "library";

/// Tag assumed when a model name carries none.
pub const DEFAULT_TAG: &str = "latest";

// ============================================================================
// Torrent construction
// ============================================================================

/// Width of a v1 piece digest (SHA-1).
pub const PIECE_HASH_LEN: usize = 20;

/// Target piece length for single-model torrents (32 KiB).
///
/// Models are small enough relative to this that the smaller pieces keep
/// swarm granularity fine without making the metainfo unreasonably large.
pub const MODEL_PIECE_LENGTH: u64 = 32 * 1024;

/// Target piece length for the full-store torrent (1 MiB).
pub const STORE_PIECE_LENGTH: u64 = 1024 * 1024;

/// Read buffer used when streaming files through the piece hasher.
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Torrent `name` used when the store root has no usable final component.
pub const DEFAULT_TORRENT_NAME: &str = "models";

/// Value of the top-level `encoding` key.
pub const TORRENT_ENCODING: &str = "UTF-8";

/// Value of the top-level `created by` key.
pub const CREATED_BY: &str = concat!("modelseed/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Artifacts
// ============================================================================

/// Extension of torrent artifacts.
pub const TORRENT_EXTENSION: &str = "torrent";

/// Extension appended to an artifact path for its cache-key sidecar.
pub const KEY_EXTENSION: &str = "key";

/// File stem of the full-store artifact.
pub const STORE_ARTIFACT_STEM: &str = "models";

/// Directory below the store root used for artifacts when none is configured.
pub const DEFAULT_ARTIFACT_DIR: &str = "torrents";

// ============================================================================
// HTTP and tracker
// ============================================================================

/// MIME type of torrent files.
pub const TORRENT_CONTENT_TYPE: &str = "application/x-bittorrent";

/// Default HTTP listen port.
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Port of the companion tracker when the announce URL is derived.
pub const DEFAULT_TRACKER_PORT: u16 = 8081;

/// Path of the companion tracker's announce endpoint.
pub const DEFAULT_ANNOUNCE_PATH: &str = "/ollama/announce";
