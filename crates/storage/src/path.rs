//! Path validation for directory handles.
//!
//! Every path handed to a backend is relative to the handle root; this module
//! makes sure it stays that way.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a path relative to a directory handle root, resolving `.` and
/// `..` components without ever leaving the root.
///
/// > **Note:** This does **not** normalize backslashes, non-UTF8 bytes, or
/// >           platform-specific weirdness. Null bytes are explicitly rejected.
///
/// # Returns
/// Returns the normalized path if valid, or [`InvalidPath`](crate::error::ErrorKind::InvalidPath)
/// if invalid.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use hoard_storage::validate_path;
/// // Valid paths
/// assert!(validate_path("characters/hero.glb").is_ok());
/// assert!(validate_path("a/../sky.hdr").is_ok()); // (never leaves the root)
/// // Invalid paths
/// assert!(validate_path("../secrets.wav").is_err());
/// assert!(validate_path("a/../../b").is_err()); // (leaves the root)
/// // Paths get resolved
/// assert_eq!(
///     validate_path("props/../textures/./brick.png/").unwrap(),
///     Path::new("textures/brick.png")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let invalid = || exn::Exn::from(ErrorKind::InvalidPath(path.to_path_buf()));
    let mut resolved = Vec::new();
    for component in path.components() {
        match component {
            // Null bytes survive Path::components() on Unix.
            Component::Normal(s) if s.as_encoded_bytes().contains(&0) => return Err(invalid()),
            Component::Normal(s) => resolved.push(s),
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => return Err(invalid()),
            Component::ParentDir => {
                resolved.pop().ok_or_else(invalid)?;
            },
        }
    }
    if resolved.is_empty() {
        return Err(invalid());
    }
    Ok(resolved.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        assert_eq!(validate(Path::new("characters/hero.glb")).unwrap(), Path::new("characters/hero.glb"));
        assert_eq!(validate(Path::new("sky.hdr")).unwrap(), Path::new("sky.hdr"));
    }

    #[test]
    fn test_path_normalization() {
        assert_eq!(validate(Path::new("audio//sfx//hit.wav")).unwrap(), Path::new("audio/sfx/hit.wav"));
        assert_eq!(validate(Path::new("./audio/./hit.wav")).unwrap(), Path::new("audio/hit.wav"));
        assert_eq!(validate(Path::new("textures/")).unwrap(), Path::new("textures"));
        assert_eq!(validate(Path::new("a/b/..")).unwrap(), Path::new("a"));
    }

    #[test]
    fn test_escaping_root() {
        assert!(validate(Path::new("../outside.glb")).is_err());
        assert!(validate(Path::new("textures/../../b.png")).is_err());
        assert!(validate(Path::new("..")).is_err());
    }

    #[test]
    fn test_rejected_inputs() {
        assert!(validate(Path::new("hero\0.glb")).is_err());
        // Normalizes to nothing
        for empty in ["", ".", "./", "//"] {
            assert!(validate(Path::new(empty)).is_err(), "{empty:?} should be rejected");
        }
    }
}
