//! Content-addressable asset registry.
//!
//! The [`Registry`] owns the durable [`Store`](hoard_store::Store) and two
//! memory caches in front of it (blobs and metadata), invokes the format
//! importers, and fingerprints every blob with BLAKE3 before it is stored:
//! identical bytes are only ever stored once, under the id of whichever
//! registration got there first.
//!
//! Reads go memory cache, then store, then `None`. Writes go store first and
//! only then cache, so a failed write never leaves a phantom cache entry.

mod cache;
pub mod error;
mod import;
mod inflight;
mod models;
mod registry;

pub use crate::cache::CacheStats;
pub use crate::models::{ImportDefaults, ImportOptions, ImportedAsset, NewAsset, QueryFilter, Registration, TypeDefaults};
pub use crate::registry::{Registry, fingerprint};
pub use hoard_store::{AssetMetadata, StoreCounts};
