//! Ingestion Error Types
//!
//! Per-file failures never surface here: the batch importer records them in
//! its progress report and moves on. What remains is choosing the directory.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An ingestion error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The selected path could not be opened as a directory handle.
    #[display("cannot open {} as an asset directory", _0.display())]
    Directory(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            // Picking the same path again won't help.
            Self::Directory(_) => false,
        }
    }
}
