mod audio;
mod mesh;
mod panorama;
mod texture;

pub use self::audio::AudioMetadata;
pub use self::mesh::{Bounds, ModelMetadata};
pub use self::panorama::{EnvironmentMap, HdrMetadata};
pub use self::texture::TextureMetadata;
use crate::error::Result;
use crate::models::{Imported, SourceFile};
use crate::settings::ImportSettings;

/// Entry points for every supported format, sharing one decode context.
///
/// All methods are synchronous and CPU bound; async callers should run them
/// on a blocking thread. Each takes the [`SourceFile`] by value because the
/// original bytes are handed back untouched in [`Imported::data`].
#[derive(Debug, Clone, Default)]
pub struct Importers {
    settings: ImportSettings,
}
impl Importers {
    pub fn new(settings: ImportSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    pub fn import_model(&self, file: SourceFile) -> Result<Imported<ModelMetadata>> {
        mesh::import(file, &self.settings)
    }

    pub fn import_audio(&self, file: SourceFile) -> Result<Imported<AudioMetadata>> {
        audio::import(file)
    }

    /// Also returns the environment map, which is for the caller only.
    pub fn import_hdr(&self, file: SourceFile) -> Result<(Imported<HdrMetadata>, EnvironmentMap)> {
        panorama::import(file, &self.settings)
    }

    pub fn import_texture(&self, file: SourceFile) -> Result<Imported<TextureMetadata>> {
        texture::import(file, &self.settings)
    }
}
