//! Layered configuration for hoard.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults,
//! 2. a TOML file (`--config`, else `config.toml` in the platform config
//!    directory if it exists),
//! 3. `HOARD_*` environment variables, with `__` separating nested keys
//!    (`HOARD_IMPORT__THUMBNAIL_SIZE=64`).
//!
//! ```toml
//! database = "/srv/assets/hoard.db"
//!
//! [import]
//! thumbnail_size = 256
//!
//! [defaults.texture]
//! category = "materials"
//! tags = ["pbr"]
//! ```

pub mod error;

use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use hoard_import::{ImportSettings, MAX_PANORAMA_WIDTH, MAX_THUMBNAIL_SIZE};
use hoard_registry::ImportDefaults;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ErrorKind, Result};

const ENV_PREFIX: &str = "HOARD_";
const CONFIG_FILE: &str = "config.toml";
const DATABASE_FILE: &str = "assets.db";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file. Parent directories are created on first open.
    pub database: PathBuf,
    pub import: ImportSettings,
    /// Category and tags for imports that don't specify their own.
    pub defaults: ImportDefaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: project_dirs()
                .map(|dirs| dirs.data_dir().join(DATABASE_FILE))
                .unwrap_or_else(|| PathBuf::from(DATABASE_FILE)),
            import: ImportSettings::default(),
            defaults: ImportDefaults::default(),
        }
    }
}

impl Config {
    /// Load and validate. An explicit `file` must exist; the default file is
    /// optional.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(file)?.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// The merged sources, for callers layering further providers on top.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        match file {
            Some(file) => {
                if !file.is_file() {
                    return Err(std::io::Error::from(std::io::ErrorKind::NotFound)).or_raise(|| ErrorKind::Load);
                }
                debug!(file = %file.display(), "loading configuration file");
                figment = figment.merge(Toml::file_exact(file));
            },
            None => {
                if let Some(file) = default_config_file().filter(|file| file.is_file()) {
                    debug!(file = %file.display(), "loading configuration file");
                    figment = figment.merge(Toml::file_exact(file));
                }
            },
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("import.thumbnail_size", self.import.thumbnail_size),
            ("import.panorama_width", self.import.panorama_width),
            ("import.environment_levels", self.import.environment_levels),
        ];
        for (key, value) in positive {
            if value == 0 {
                exn::bail!(ErrorKind::Invalid { key, reason: "must be greater than zero" });
            }
        }
        let bounded = [
            ("import.thumbnail_size", self.import.thumbnail_size, MAX_THUMBNAIL_SIZE),
            ("import.panorama_width", self.import.panorama_width, MAX_PANORAMA_WIDTH),
        ];
        for (key, value, max) in bounded {
            if value > max {
                exn::bail!(ErrorKind::Invalid { key, reason: "exceeds the supported maximum" });
            }
        }
        if self.import.panorama_width % 2 != 0 {
            exn::bail!(ErrorKind::Invalid { key: "import.panorama_width", reason: "must be even" });
        }
        if self.database.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid { key: "database", reason: "must not be empty" });
        }
        Ok(())
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "hoard")
}

/// `config.toml` in the platform config directory.
pub fn default_config_file() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use hoard_import::AssetType;
    use rstest::rstest;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert!(config.database.ends_with(DATABASE_FILE));
        assert_eq!(config.import, ImportSettings::default());
    }

    #[test]
    fn test_file_then_environment() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "hoard.toml",
                r#"
                    database = "/tmp/hoard/assets.db"

                    [import]
                    thumbnail_size = 256

                    [defaults.texture]
                    category = "materials"
                    tags = ["pbr"]
                "#,
            )?;
            jail.set_env("HOARD_IMPORT__THUMBNAIL_SIZE", "64");
            jail.set_env("HOARD_IMPORT__ENVIRONMENT_LEVELS", "4");
            let config = Config::load(Some(Path::new("hoard.toml"))).unwrap();
            assert_eq!(config.database, PathBuf::from("/tmp/hoard/assets.db"));
            assert_eq!(config.import.thumbnail_size, 64);
            assert_eq!(config.import.environment_levels, 4);
            assert_eq!(config.import.panorama_width, ImportSettings::default().panorama_width);
            let texture = config.defaults.for_type(AssetType::Texture);
            assert_eq!(texture.category, "materials");
            assert!(texture.tags.contains("pbr"));
            // Untouched types keep their defaults.
            assert_eq!(config.defaults.model, ImportDefaults::default().model);
            Ok(())
        });
    }

    #[rstest]
    #[case("thumbnail_size = 0")]
    #[case("panorama_width = 0")]
    #[case("environment_levels = 0")]
    fn test_zero_sizes_rejected(#[case] line: &str) {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("hoard.toml");
        std::fs::write(&file, format!("[import]\n{line}\n")).unwrap();
        let err = Config::load(Some(&file)).unwrap_err();
        assert!(matches!(*err, ErrorKind::Invalid { reason: "must be greater than zero", .. }));
    }

    #[rstest]
    #[case("thumbnail_size = 65536", "exceeds the supported maximum")]
    #[case("panorama_width = 8192", "exceeds the supported maximum")]
    #[case("panorama_width = 255", "must be even")]
    fn test_unsupported_sizes_rejected(#[case] line: &str, #[case] expected: &str) {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("hoard.toml");
        std::fs::write(&file, format!("[import]\n{line}\n")).unwrap();
        let err = Config::load(Some(&file)).unwrap_err();
        assert!(matches!(*err, ErrorKind::Invalid { reason, .. } if reason == expected));
    }

    #[test]
    fn test_largest_sizes_accepted() {
        let mut config = Config::default();
        config.import.thumbnail_size = MAX_THUMBNAIL_SIZE;
        config.import.panorama_width = MAX_PANORAMA_WIDTH;
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_explicit_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&temp_dir.path().join("nope.toml"))).unwrap_err();
        assert_eq!(*err, ErrorKind::Load);
    }

    #[test]
    fn test_malformed_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("hoard.toml");
        std::fs::write(&file, "[import]\nthumbnail_size = \"big\"\n").unwrap();
        let err = Config::load(Some(&file)).unwrap_err();
        assert_eq!(*err, ErrorKind::Load);
    }
}
