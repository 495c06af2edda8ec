//! Format importers for the asset registry.
//!
//! Each importer turns the raw bytes of one file into format metadata and,
//! where it makes sense, a PNG thumbnail. The original bytes are always what
//! gets stored; nothing is transcoded.
//!
//! ```no_run
//! use hoard_import::{Importers, SourceFile};
//!
//! # fn example() -> hoard_import::error::Result<()> {
//! let importers = Importers::default();
//! let file = SourceFile::new("brick.png", std::fs::read("brick.png").unwrap_or_default());
//! let imported = importers.import_texture(file)?;
//! println!("{}x{}", imported.metadata.width, imported.metadata.height);
//! # Ok(())
//! # }
//! ```

pub mod error;
mod importers;
pub mod models;
mod settings;
mod thumbnail;

pub use crate::importers::{
    AudioMetadata, Bounds, EnvironmentMap, HdrMetadata, Importers, ModelMetadata, TextureMetadata,
};
pub use crate::models::{AssetType, FormatDetails, Imported, SourceFile};
pub use crate::settings::{ImportSettings, MAX_PANORAMA_WIDTH, MAX_THUMBNAIL_SIZE};
