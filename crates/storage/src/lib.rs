//! Directory handles for asset ingestion.
//!
//! A "directory handle" is anything the ingestion service can walk and read
//! files from. Handles are read-only: assets are copied into the durable
//! store by the registry, never written back to where they were found.

pub mod backend;
pub mod error;
pub mod file;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::file::FileInfo;
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
