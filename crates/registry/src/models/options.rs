use hoard_import::AssetType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Per-import overrides. Anything left as `None` falls back to the file name
/// or to [`ImportDefaults`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOptions {
    pub name: Option<String>,
    pub category: Option<String>,
    pub tags: Option<BTreeSet<String>>,
}
impl ImportOptions {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefaults {
    pub category: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}
impl TypeDefaults {
    fn new(category: &str, tags: &[&str]) -> Self {
        Self { category: category.to_string(), tags: tags.iter().map(|t| t.to_string()).collect() }
    }
}

/// Category and tags applied when an import doesn't name its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportDefaults {
    pub model: TypeDefaults,
    pub audio: TypeDefaults,
    pub hdr: TypeDefaults,
    pub texture: TypeDefaults,
}
impl Default for ImportDefaults {
    fn default() -> Self {
        Self {
            model: TypeDefaults::new("models", &["3d", "model"]),
            audio: TypeDefaults::new("audio", &["audio"]),
            hdr: TypeDefaults::new("environments", &["environment", "hdr"]),
            texture: TypeDefaults::new("textures", &["texture"]),
        }
    }
}
impl ImportDefaults {
    pub fn for_type(&self, asset_type: AssetType) -> &TypeDefaults {
        match asset_type {
            AssetType::Model => &self.model,
            AssetType::Audio => &self.audio,
            AssetType::Hdr => &self.hdr,
            AssetType::Texture => &self.texture,
        }
    }
}
