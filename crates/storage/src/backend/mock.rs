//! In-memory directory handle for testing.

use super::FileInfoStream;
use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::file::FileInfo;
use crate::path::validate as validate_path;
use async_stream::stream;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use time::UtcDateTime;
use tokio::sync::RwLock;

/// In-memory directory handle for testing.
///
/// Files live in a map behind a [`RwLock`], so tests can add files after
/// construction with [`insert`](Self::insert) while the handle is shared.
///
/// # Examples
///
/// ```
/// use hoard_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("props/crate.glb", b"glTF...".to_vec()),
/// ]);
/// let data = backend.read(Path::new("props/crate.glb")).await.map_err(|e| e.to_string())?;
/// assert_eq!(data, b"glTF...");
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<BTreeMap<PathBuf, (UtcDateTime, Vec<u8>)>>,
}

impl MockBackend {
    /// Create a mock handle pre-populated with files.
    ///
    /// Panics if any path fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let now = UtcDateTime::now();
        let storage = files
            .into_iter()
            .map(|(path, data)| (Self::validated(path.into()), (now, data.into())))
            .collect();
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(storage),
        }
    }

    /// Change the name of the mock handle.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add (or replace) a file after construction.
    pub async fn insert(&self, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) {
        let path = Self::validated(path.into());
        self.storage.write().await.insert(path, (UtcDateTime::now(), data.into()));
    }

    fn validated(path: PathBuf) -> PathBuf {
        match validate_path(&path) {
            Ok(validated) => validated,
            // Deliberate: a broken fixture is a broken test.
            Err(_) => panic!("MockBackend: invalid path {}", path.display()),
        }
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, Vec<u8>); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self) -> FileInfoStream<'a> {
        Box::pin(stream! {
            // Snapshot under the read lock, then drop it before yielding.
            let entries: Vec<FileInfo> = {
                let guard = self.storage.read().await;
                guard
                    .iter()
                    .map(|(path, (inserted, data))| FileInfo::new(path.clone(), data.len() as u64, *inserted))
                    .collect()
            };
            for entry in entries {
                yield Ok(entry);
            }
        })
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        let guard = self.storage.read().await;
        let (_inserted, data) = guard.get(&path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.clone())))?;
        Ok(data.clone())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let path = validate_path(path)?;
        let guard = self.storage.read().await;
        let (inserted, data) = guard.get(&path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.clone())))?;
        Ok(FileInfo::new(path.clone(), data.len() as u64, *inserted))
    }
}
