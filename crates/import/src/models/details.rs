use serde::{Deserialize, Serialize};

use super::AssetType;
use crate::importers::{AudioMetadata, HdrMetadata, ModelMetadata, TextureMetadata};

/// Format-specific facts extracted by an importer, kept alongside the generic
/// asset metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FormatDetails {
    Model(ModelMetadata),
    Audio(AudioMetadata),
    Hdr(HdrMetadata),
    Texture(TextureMetadata),
}
impl FormatDetails {
    pub fn asset_type(&self) -> AssetType {
        match self {
            Self::Model(_) => AssetType::Model,
            Self::Audio(_) => AssetType::Audio,
            Self::Hdr(_) => AssetType::Hdr,
            Self::Texture(_) => AssetType::Texture,
        }
    }
}
impl From<ModelMetadata> for FormatDetails {
    fn from(value: ModelMetadata) -> Self {
        Self::Model(value)
    }
}
impl From<AudioMetadata> for FormatDetails {
    fn from(value: AudioMetadata) -> Self {
        Self::Audio(value)
    }
}
impl From<HdrMetadata> for FormatDetails {
    fn from(value: HdrMetadata) -> Self {
        Self::Hdr(value)
    }
}
impl From<TextureMetadata> for FormatDetails {
    fn from(value: TextureMetadata) -> Self {
        Self::Texture(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_is_tagged() {
        let details = FormatDetails::from(TextureMetadata {
            width: 64,
            height: 32,
            format: "png".into(),
            color: "Rgba8".into(),
            power_of_two: true,
        });
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["kind"], "texture");
        assert_eq!(json["width"], 64);
        let back: FormatDetails = serde_json::from_value(json).unwrap();
        assert_eq!(back.asset_type(), AssetType::Texture);
        assert_eq!(back, details);
    }
}
