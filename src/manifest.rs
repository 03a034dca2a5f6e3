//! Model manifest resolution.
//!
//! A model is described by a JSON manifest listing the content-addressed
//! layers it is made of. Resolving a model name produces the ordered list of
//! files a torrent for that model must carry: the manifest itself first, then
//! every layer blob in manifest order.
//!
//! Manifests live in one of two layouts below `manifests/<namespace>/`, see
//! [`ManifestLayout`].
//!
//! ```no_run
//! use modelseed::manifest::{ManifestResolver, MissingBlobPolicy};
//! use modelseed::store::BlobStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = ManifestResolver::new(
//!     BlobStore::new("/home/me/.ollama/models"),
//!     "registry.ollama.ai",
//!     MissingBlobPolicy::Fail,
//! );
//! let resolved = resolver.resolve("llama3:8b").await?;
//! for file in &resolved.files {
//!     println!("{} {}", file.torrent_path.join("/"), file.size);
//! }
//! # Ok(())
//! # }
//! ```

mod document;
mod error;
mod layout;
mod name;
mod resolver;

pub use document::{Layer, ManifestDocument};
pub use error::ManifestError;
pub use layout::{ManifestLayout, ManifestLocation};
pub use name::ModelName;
pub use resolver::{ManifestFile, ManifestResolver, MissingBlobPolicy, ModelManifest, ResolvedModel};
