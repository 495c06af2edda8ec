use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
    str::FromStr,
};

use crate::error::{Error, ErrorKind};

/// The closed set of asset kinds the registry knows how to import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    /// glTF 2.0 scene (`.glb`, `.gltf`)
    Model,
    /// Sound clip (`.wav`, `.mp3`, `.ogg`, `.flac`)
    Audio,
    /// Plain raster image
    Texture,
    /// High dynamic range equirectangular panorama (`.hdr`, `.exr`)
    Hdr,
}
impl AssetType {
    pub const ALL: [AssetType; 4] = [Self::Model, Self::Audio, Self::Texture, Self::Hdr];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Audio => "audio",
            Self::Texture => "texture",
            Self::Hdr => "hdr",
        }
    }

    /// Lowercase file extensions (without the dot) claimed by this type.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Model => &["glb", "gltf"],
            Self::Audio => &["wav", "mp3", "ogg", "flac"],
            Self::Texture => &["png", "jpg", "jpeg", "webp", "bmp", "tga", "gif"],
            Self::Hdr => &["hdr", "exr"],
        }
    }

    /// MIME types accepted in place of an extension.
    pub fn mime_types(&self) -> &'static [&'static str] {
        match self {
            Self::Model => &["model/gltf-binary", "model/gltf+json"],
            Self::Audio => &[
                "audio/wav",
                "audio/wave",
                "audio/x-wav",
                "audio/mpeg",
                "audio/mp3",
                "audio/ogg",
                "audio/vorbis",
                "audio/flac",
                "audio/x-flac",
            ],
            Self::Texture => &[
                "image/png",
                "image/jpeg",
                "image/webp",
                "image/bmp",
                "image/x-tga",
                "image/x-targa",
                "image/gif",
            ],
            Self::Hdr => &["image/vnd.radiance", "image/x-hdr", "image/x-exr", "image/aces"],
        }
    }

    /// Classify a file extension, case-insensitively. Unknown extensions are
    /// `None`: they are skipped, not errors.
    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        Self::ALL.into_iter().find(|kind| kind.extensions().contains(&extension.as_str()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref().extension().and_then(|ext| ext.to_str()).and_then(Self::from_extension)
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        // Drop parameters such as `; codecs=vorbis`.
        let essence = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|kind| kind.mime_types().contains(&essence.as_str()))
    }
}
impl Display for AssetType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
impl FromStr for AssetType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "model" | "models" | "mesh" => Self::Model,
            "audio" | "sound" => Self::Audio,
            "texture" | "textures" | "image" => Self::Texture,
            "hdr" | "hdri" | "environment" => Self::Hdr,
            _ => exn::bail!(ErrorKind::UnknownAssetType(s.to_string())),
        })
    }
}
