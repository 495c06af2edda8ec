use std::path::Path;

use super::AssetType;
use crate::error::{ErrorKind, Result};

/// A file handed to an importer: a display name, an optional MIME type and
/// the raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub mime: Option<String>,
    pub data: Vec<u8>,
}
impl SourceFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), mime: None, data: data.into() }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Lowercased extension of [`name`](Self::name), if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name).extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase)
    }

    /// File name without extension; used as the default display name.
    pub fn stem(&self) -> &str {
        Path::new(&self.name).file_stem().and_then(|stem| stem.to_str()).unwrap_or(&self.name)
    }

    /// Classify by extension first, then by MIME type.
    pub fn asset_type(&self) -> Option<AssetType> {
        self.extension()
            .and_then(|ext| AssetType::from_extension(&ext))
            .or_else(|| self.mime.as_deref().and_then(AssetType::from_mime))
    }

    /// Fail with [`UnsupportedFormat`](ErrorKind::UnsupportedFormat) unless
    /// the extension or MIME type belongs to `kind`.
    pub(crate) fn ensure(&self, kind: AssetType) -> Result<()> {
        if self.extension().is_some_and(|ext| kind.extensions().contains(&ext.as_str())) {
            return Ok(());
        }
        if self.mime.as_deref().and_then(AssetType::from_mime) == Some(kind) {
            return Ok(());
        }
        let found = match (self.extension(), self.mime.as_deref()) {
            (Some(ext), _) => format!("extension `{ext}`"),
            (None, Some(mime)) => format!("MIME type `{mime}`"),
            (None, None) => "no extension or MIME type".to_string(),
        };
        exn::bail!(ErrorKind::unsupported(&self.name, format!("{found} is not a supported {kind} format")));
    }
}

/// The result of a successful import: the original bytes (stored as the
/// blob, never transcoded), format metadata and an optional PNG thumbnail.
#[derive(Debug, Clone, PartialEq)]
pub struct Imported<M> {
    pub data: Vec<u8>,
    pub metadata: M,
    pub thumbnail: Option<Vec<u8>>,
}
