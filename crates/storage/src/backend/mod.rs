//! Directory handle trait and implementations.
//!
//! A [`StorageBackend`] is a read-only view over a tree of files: enough to
//! enumerate everything below a root and read individual files back. The
//! ingestion service never needs to write, rename or delete anything it
//! finds.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::error::Result;
use crate::file::FileInfo;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::Path;
use std::pin::Pin;

pub(crate) type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// Unified, read-only interface for directory handles.
///
/// # Path Handling
/// All paths are relative to the handle root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations
/// enforce this validation.
///
/// # Examples
///
/// ```
/// use futures::TryStreamExt;
/// use hoard_storage::{backend::StorageBackend, error::Result};
///
/// async fn total_bytes(backend: &dyn StorageBackend) -> Result<u64> {
///     let mut total = 0;
///     let mut files = backend.list_stream();
///     while let Some(info) = files.try_next().await? {
///         total += info.size;
///     }
///     Ok(total)
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Human-readable name of the handle (used for logging only).
    fn name(&self) -> &str;

    /// List every file below the root.
    ///
    /// Default implementation collects [`list_stream()`](Self::list_stream)
    /// into a [`Vec`], failing on the first error.
    async fn list(&self) -> Result<Vec<FileInfo>> {
        self.list_stream().try_collect().await
    }

    /// Stream metadata for every file below the root, recursively.
    ///
    /// Entries that cannot be inspected are yielded as `Err` items without
    /// ending the stream, so callers can decide whether one unreadable
    /// entry should abort the whole walk. No ordering is guaranteed.
    fn list_stream<'a>(&'a self) -> FileInfoStream<'a>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Get file metadata without reading contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn stat(&self, path: &Path) -> Result<FileInfo>;
}
