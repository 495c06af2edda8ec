//! Import Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::fmt::Display;

/// An import error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for import operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Every variant names the file it concerns so that batch reports stay
/// readable once the error has been flattened to a message.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The file's extension, MIME type or content does not belong to the
    /// importer it was handed to. Don't retry; pick another importer.
    #[display("unsupported format for {file}: {reason}")]
    UnsupportedFormat { file: String, reason: String },
    /// The container was recognised but its content is corrupt.
    #[display("failed to decode {file}: {reason}")]
    Decode { file: String, reason: String },
    /// Decoding succeeded but the preview image could not be encoded.
    #[display("failed to encode thumbnail for {_0}")]
    Thumbnail(#[error(not(source))] String),
    /// A string did not name any known asset type.
    #[display("unknown asset type: {_0}")]
    UnknownAssetType(#[error(not(source))] String),
}

impl ErrorKind {
    pub fn unsupported(file: impl Into<String>, reason: impl Display) -> Self {
        Self::UnsupportedFormat { file: file.into(), reason: reason.to_string() }
    }

    pub fn decode(file: impl Into<String>, reason: impl Display) -> Self {
        Self::Decode { file: file.into(), reason: reason.to_string() }
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Same bytes in, same failure out.
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(
            ErrorKind::unsupported("song.aiff", "extension `aiff` is not audio").to_string(),
            "unsupported format for song.aiff: extension `aiff` is not audio"
        );
        assert_eq!(ErrorKind::decode("hero.glb", "truncated container").to_string(), "failed to decode hero.glb: truncated container");
        assert!(!ErrorKind::Thumbnail("sky.hdr".into()).is_retryable());
    }
}
