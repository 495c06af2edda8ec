//! Decode-then-register entry points.

use exn::ResultExt;
use hoard_import::error::ErrorKind as ImportErrorKind;
use hoard_import::{
    AssetType, AudioMetadata, EnvironmentMap, FormatDetails, HdrMetadata, Imported, Importers, ModelMetadata,
    SourceFile, TextureMetadata,
};
use tracing::instrument;

use crate::Registry;
use crate::error::{ErrorKind, Propagate, Result};
use crate::models::{ImportOptions, ImportedAsset, NewAsset};

impl Registry {
    /// Run an importer on the blocking pool; decoding is CPU-bound.
    async fn decode<T, F>(&self, import: F) -> Result<T>
    where
        F: FnOnce(&Importers) -> hoard_import::error::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let importers = self.importers.clone();
        tokio::task::spawn_blocking(move || import(&importers)).await.or_raise(|| ErrorKind::Task)?.propagate()
    }

    async fn register_imported<M>(
        &self,
        name: String,
        asset_type: AssetType,
        imported: Imported<M>,
        options: ImportOptions,
    ) -> Result<ImportedAsset<M>>
    where
        M: Clone + Into<FormatDetails>,
    {
        let defaults = self.defaults.for_type(asset_type);
        let asset = NewAsset::new(options.name.unwrap_or(name), asset_type)
            .with_category(options.category.unwrap_or_else(|| defaults.category.clone()))
            .with_tags(options.tags.unwrap_or_else(|| defaults.tags.clone()))
            .with_thumbnail(imported.thumbnail)
            .with_details(imported.metadata.clone());
        let registration = self.register(asset, &imported.data).await?;
        Ok(ImportedAsset {
            id: registration.id,
            metadata: imported.metadata,
            deduplicated: registration.deduplicated,
        })
    }

    /// Import a glTF 2.0 (`.gltf`) or binary glTF (`.glb`) model.
    #[instrument(skip_all, fields(file = %file.name))]
    pub async fn import_model(&self, file: SourceFile, options: ImportOptions) -> Result<ImportedAsset<ModelMetadata>> {
        self.ensure_initialized()?;
        let name = file.name.clone();
        let imported = self.decode(move |importers| importers.import_model(file)).await?;
        self.register_imported(name, AssetType::Model, imported, options).await
    }

    #[instrument(skip_all, fields(file = %file.name))]
    pub async fn import_audio(&self, file: SourceFile, options: ImportOptions) -> Result<ImportedAsset<AudioMetadata>> {
        self.ensure_initialized()?;
        let name = file.name.clone();
        let imported = self.decode(move |importers| importers.import_audio(file)).await?;
        self.register_imported(name, AssetType::Audio, imported, options).await
    }

    /// Import an equirectangular HDR panorama. The environment map is built
    /// fresh on every call, deduplicated or not, and is never persisted.
    #[instrument(skip_all, fields(file = %file.name))]
    pub async fn import_hdr(
        &self,
        file: SourceFile,
        options: ImportOptions,
    ) -> Result<(ImportedAsset<HdrMetadata>, EnvironmentMap)> {
        self.ensure_initialized()?;
        let name = file.name.clone();
        let (imported, env_map) = self.decode(move |importers| importers.import_hdr(file)).await?;
        let asset = self.register_imported(name, AssetType::Hdr, imported, options).await?;
        Ok((asset, env_map))
    }

    #[instrument(skip_all, fields(file = %file.name))]
    pub async fn import_texture(
        &self,
        file: SourceFile,
        options: ImportOptions,
    ) -> Result<ImportedAsset<TextureMetadata>> {
        self.ensure_initialized()?;
        let name = file.name.clone();
        let imported = self.decode(move |importers| importers.import_texture(file)).await?;
        self.register_imported(name, AssetType::Texture, imported, options).await
    }

    /// Classify `file` by extension (or MIME type) and hand it to the
    /// matching importer.
    pub async fn import_file(&self, file: SourceFile, options: ImportOptions) -> Result<ImportedAsset<FormatDetails>> {
        self.ensure_initialized()?;
        let Some(asset_type) = file.asset_type() else {
            let kind = ImportErrorKind::unsupported(&file.name, "not a recognised asset file");
            exn::bail!(ErrorKind::Import(kind));
        };
        match asset_type {
            AssetType::Model => self.import_model(file, options).await.map(ImportedAsset::into_details),
            AssetType::Audio => self.import_audio(file, options).await.map(ImportedAsset::into_details),
            AssetType::Hdr => self.import_hdr(file, options).await.map(|(asset, _env_map)| asset.into_details()),
            AssetType::Texture => self.import_texture(file, options).await.map(ImportedAsset::into_details),
        }
    }
}
