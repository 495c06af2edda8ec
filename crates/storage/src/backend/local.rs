//! Local filesystem directory handle.
//!
//! Files are read with `tokio::fs`; the walk is an explicit stack of
//! directories so that arbitrarily deep trees never recurse.

use crate::backend::FileInfoStream;
use crate::error::{ErrorKind, Result};
use crate::{FileInfo, StorageBackend, path::validate as validate_path};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::collections::HashSet;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};

enum WalkEntry {
    File(FileInfo),
    Descend(PathBuf),
    Skip,
}

/// Read-only handle over a directory on the local filesystem.
///
/// # Examples
///
/// ```no_run
/// use hoard_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::open("downloads", "/home/me/Downloads/asset-pack")
///     .map_err(|e| e.to_string())?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct LocalBackend {
    name: String,
    root: PathBuf,
}
impl LocalBackend {
    /// Open an existing directory as a handle.
    ///
    /// # Errors
    /// - [`InvalidPath`](ErrorKind::InvalidPath) if `root` is relative,
    /// - [`NotFound`](ErrorKind::NotFound) if it does not exist,
    /// - [`NotADirectory`](ErrorKind::NotADirectory) if it is a file.
    pub fn open(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        // Sync metadata call: happens once per handle and keeps the
        // constructor usable outside of an async context.
        let metadata = std::fs::metadata(&root).map_err(|e| Self::map_io_error(e, &root))?;
        if !metadata.is_dir() {
            exn::bail!(ErrorKind::NotADirectory(root));
        }
        Ok(Self { name: name.into(), root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    fn relative_path(&self, absolute: impl AsRef<Path>) -> Result<PathBuf> {
        let absolute = absolute.as_ref();
        let relative = absolute.strip_prefix(&self.root).or_raise(|| {
            ErrorKind::BackendError(format!("path `{:?}` is not within root `{:?}`", absolute, self.root))
        })?;
        validate_path(relative)
    }

    fn file_info(path: &Path, metadata: &Metadata) -> Result<FileInfo> {
        let modified = metadata.modified().map_err(ErrorKind::Io)?;
        Ok(FileInfo::new(path, metadata.len(), modified))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    // Errors can't be `?`-ed inside the stream! macro, so everything fallible
    // about a single entry lives here.
    async fn process_entry(&self, entry: DirEntry) -> Result<WalkEntry> {
        let path = entry.path();
        // Follows symlinks, so a link to a directory is walked like one.
        let metadata = fs::metadata(&path).await.map_err(|e| Self::map_io_error(e, &path))?;
        if metadata.is_dir() {
            return Ok(WalkEntry::Descend(path));
        }
        if metadata.is_file() {
            let relative = self.relative_path(&path)?;
            return Ok(WalkEntry::File(Self::file_info(&relative, &metadata)?));
        }
        Ok(WalkEntry::Skip)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self) -> FileInfoStream<'a> {
        let mut stack = vec![self.root.clone()];
        let mut visited = HashSet::new();
        Box::pin(stream! {
            'dirs: while let Some(current) = stack.pop() {
                // Symlinked directories are followed, so a link back up the
                // tree would otherwise never terminate.
                match fs::canonicalize(&current).await {
                    Ok(real) => {
                        if !visited.insert(real) {
                            continue 'dirs;
                        }
                    },
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, &current)));
                        continue 'dirs;
                    },
                }
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, &current)));
                        continue 'dirs;
                    }
                };
                'entries: loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break 'entries,
                        Err(e) => {
                            yield Err(exn::Exn::from(Self::map_io_error(e, &current)));
                            break 'entries;
                        },
                    };
                    match self.process_entry(entry).await {
                        Ok(WalkEntry::File(f)) => yield Ok(f),
                        Ok(WalkEntry::Descend(d)) => stack.push(d),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => yield Err(e),
                    };
                }
            }
        })
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::read(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let abs_path = self.absolute_path(path)?;
        let metadata = fs::metadata(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        Self::file_info(&validate_path(path)?, &metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn populate(root: &Path, files: &[(&str, &[u8])]) {
        for (path, data) in files {
            let path = root.join(path);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, data).unwrap();
        }
    }

    #[test]
    fn test_open_requirements() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::open("pack", temp_dir.path()).is_ok());
        let err = LocalBackend::open("pack", "relative/path").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
        let err = LocalBackend::open("pack", temp_dir.path().join("missing")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        populate(temp_dir.path(), &[("file.png", b"png")]);
        let err = LocalBackend::open("pack", temp_dir.path().join("file.png")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotADirectory(_)));
    }

    #[test]
    fn test_path_conversion() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::open("pack", temp_dir.path()).unwrap();
        let abs = temp_dir.path().join("props/crate.glb");
        assert_eq!(backend.absolute_path("props/crate.glb").unwrap(), abs);
        assert_eq!(backend.relative_path(&abs).unwrap(), Path::new("props/crate.glb"));
        assert!(backend.absolute_path("../escape.glb").is_err());
        assert!(backend.relative_path("/elsewhere/file.png").is_err());
    }

    #[tokio::test]
    async fn test_recursive_listing() {
        let temp_dir = tempfile::tempdir().unwrap();
        populate(
            temp_dir.path(),
            &[
                ("hero.glb", b"a"),
                ("audio/sfx/hit.wav", b"bb"),
                ("audio/music/theme.ogg", b"ccc"),
                ("textures/deep/er/still/brick.png", b"dddd"),
            ],
        );
        let backend = LocalBackend::open("pack", temp_dir.path()).unwrap();
        let mut files = backend.list().await.unwrap();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        let paths: Vec<_> = files.iter().map(|f| f.path.to_string_lossy().into_owned()).collect();
        assert_eq!(
            paths,
            ["audio/music/theme.ogg", "audio/sfx/hit.wav", "hero.glb", "textures/deep/er/still/brick.png"]
        );
        assert_eq!(files[3].size, 4);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_cycle_is_walked_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        populate(temp_dir.path(), &[("audio/hit.wav", b"RIFF")]);
        std::os::unix::fs::symlink(temp_dir.path(), temp_dir.path().join("audio/up")).unwrap();
        let backend = LocalBackend::open("pack", temp_dir.path()).unwrap();
        let files = backend.list().await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, Path::new("audio/hit.wav"));
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::open("pack", temp_dir.path()).unwrap();
        let files: Vec<_> = backend.list_stream().try_collect().await.unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_read_and_stat() {
        let temp_dir = tempfile::tempdir().unwrap();
        populate(temp_dir.path(), &[("sky/dawn.hdr", b"#?RADIANCE")]);
        let backend = LocalBackend::open("pack", temp_dir.path()).unwrap();
        assert_eq!(backend.read(Path::new("sky/dawn.hdr")).await.unwrap(), b"#?RADIANCE");
        let info = backend.stat(Path::new("sky/dawn.hdr")).await.unwrap();
        assert_eq!(info.path, Path::new("sky/dawn.hdr"));
        assert_eq!(info.size, 10);
        let err = backend.read(Path::new("sky/dusk.hdr")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        // Directories are not files.
        let err = backend.stat(Path::new("sky")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_path_security() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::open("pack", temp_dir.path()).unwrap();
        assert!(backend.read(Path::new("../etc/passwd")).await.is_err());
        assert!(backend.stat(Path::new("a/../../b")).await.is_err());
    }
}
