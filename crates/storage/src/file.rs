use std::path::{Path, PathBuf};
use time::UtcDateTime;

/// File metadata returned by storage backends while listing a directory
/// handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Relative path from the handle root
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: UtcDateTime,
}
impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: impl Into<UtcDateTime>) -> Self {
        Self {
            path: path.into(),
            size,
            modified: modified.into(),
        }
    }

    /// Final path component, falling back to the whole path for the
    /// (theoretical) case of a path without one.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }

    /// Lowercased extension, if any.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.path)
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}
