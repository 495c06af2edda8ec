use serde::{Deserialize, Serialize};

/// Largest thumbnail edge an importer will render.
pub const MAX_THUMBNAIL_SIZE: u32 = 2048;
/// Largest panorama thumbnail width an importer will render.
pub const MAX_PANORAMA_WIDTH: u32 = 4096;

/// Reusable decode context shared by every importer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Edge length, in pixels, of square model and texture thumbnails.
    pub thumbnail_size: u32,
    /// Width, in pixels, of the 2:1 panorama thumbnail.
    pub panorama_width: u32,
    /// Number of levels in the environment map mip chain (including the
    /// full-resolution level).
    pub environment_levels: u32,
}
impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            thumbnail_size: 128,
            panorama_width: 256,
            environment_levels: 6,
        }
    }
}
impl ImportSettings {
    /// [`thumbnail_size`](Self::thumbnail_size) clamped to `1..=MAX_THUMBNAIL_SIZE`.
    pub fn thumbnail_edge(&self) -> u32 {
        self.thumbnail_size.clamp(1, MAX_THUMBNAIL_SIZE)
    }

    /// [`panorama_width`](Self::panorama_width) clamped to
    /// `2..=MAX_PANORAMA_WIDTH` and rounded down to even, so the preview is
    /// exactly twice as wide as it is tall.
    pub fn panorama_preview_width(&self) -> u32 {
        self.panorama_width.clamp(2, MAX_PANORAMA_WIDTH) & !1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 1)]
    #[case(128, 128)]
    #[case(65_536, MAX_THUMBNAIL_SIZE)]
    #[case(u32::MAX, MAX_THUMBNAIL_SIZE)]
    fn test_thumbnail_edge(#[case] configured: u32, #[case] expected: u32) {
        let settings = ImportSettings { thumbnail_size: configured, ..Default::default() };
        assert_eq!(settings.thumbnail_edge(), expected);
    }

    #[rstest]
    #[case(0, 2)]
    #[case(255, 254)]
    #[case(256, 256)]
    #[case(u32::MAX, MAX_PANORAMA_WIDTH)]
    fn test_panorama_preview_width(#[case] configured: u32, #[case] expected: u32) {
        let settings = ImportSettings { panorama_width: configured, ..Default::default() };
        assert_eq!(settings.panorama_preview_width(), expected);
    }
}
