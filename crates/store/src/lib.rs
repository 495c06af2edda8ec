//! Durable storage for the asset registry.
//!
//! A single SQLite database holds three kinds of record:
//! - **Metadata**: one row per asset, with its tags in a side table so that
//!   tag queries hit an index instead of scanning JSON.
//! - **Files**: the raw blob, keyed by asset id.
//! - **Fingerprints**: BLAKE3 content hash to asset id. The hash is the
//!   primary key, which is what makes registration deduplicate.
//!
//! Multi-record writes ([`Store::insert_asset`], [`Store::delete_asset`],
//! [`Store::save_metadata`]) run in one transaction, so a crash never leaves
//! a blob without metadata or a fingerprint pointing at nothing.

mod db;
pub mod error;
mod models;
mod store;

pub use crate::db::Location;
pub use crate::models::{AssetMetadata, ContentFingerprint, Insertion, truncate_to_millis};
pub use crate::store::{Store, StoreCounts};
