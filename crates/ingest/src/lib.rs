//! Batch ingestion of asset directories.
//!
//! The flow is: [`select_directory`] to get a read-only handle,
//! [`scan_directory`] to find and classify every importable file below it,
//! then [`batch_import`] (or [`batch_import_stream`]) to push each file
//! through the [`Registry`](hoard_registry::Registry). Files are imported
//! strictly one at a time; a failure is recorded against its file and the
//! batch carries on.

mod batch;
mod directory;
pub mod error;
mod scan;

pub use crate::batch::{BatchEvent, FileError, ImportProgress, batch_import, batch_import_stream};
pub use crate::directory::{is_supported, select_directory};
pub use crate::scan::{FileTypeStats, ScannedFile, file_type_stats, scan_directory};
