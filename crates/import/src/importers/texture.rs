//! Plain raster textures.

use exn::ResultExt;
use image::{GenericImageView, ImageFormat};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{ErrorKind, Result};
use crate::models::{AssetType, Imported, SourceFile};
use crate::settings::ImportSettings;
use crate::thumbnail::{encode_png, fit_centered};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureMetadata {
    pub width: u32,
    pub height: u32,
    /// Container format, as its canonical extension (`png`, `jpg`, ...).
    pub format: String,
    /// Decoded color type, e.g. `Rgba8` or `L8`.
    pub color: String,
    /// Both dimensions are powers of two (mipmap friendly).
    pub power_of_two: bool,
}

/// Detect the container from the magic bytes, falling back to the extension
/// for formats without a signature (TGA).
fn detect_format(file: &SourceFile) -> Result<ImageFormat> {
    let format = image::guess_format(&file.data)
        .ok()
        .or_else(|| file.extension().and_then(|ext| ImageFormat::from_extension(ext)))
        .ok_or_else(|| ErrorKind::unsupported(&file.name, "unrecognised image container"))?;
    match format {
        ImageFormat::Png
        | ImageFormat::Jpeg
        | ImageFormat::WebP
        | ImageFormat::Bmp
        | ImageFormat::Tga
        | ImageFormat::Gif => Ok(format),
        other => exn::bail!(ErrorKind::unsupported(&file.name, format!("{other:?} is not a texture format"))),
    }
}

#[instrument(skip_all, fields(file = %file.name, size = file.data.len()))]
pub(crate) fn import(file: SourceFile, settings: &ImportSettings) -> Result<Imported<TextureMetadata>> {
    file.ensure(AssetType::Texture)?;
    let format = detect_format(&file)?;
    let image = image::load_from_memory_with_format(&file.data, format)
        .or_raise(|| ErrorKind::decode(&file.name, format!("corrupt {format:?} image data")))?;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        exn::bail!(ErrorKind::decode(&file.name, "image has no pixels"));
    }
    let metadata = TextureMetadata {
        width,
        height,
        format: format.extensions_str().first().copied().unwrap_or("unknown").to_string(),
        color: format!("{:?}", image.color()),
        power_of_two: width.is_power_of_two() && height.is_power_of_two(),
    };
    let thumbnail = encode_png(fit_centered(&image, settings.thumbnail_edge()), &file.name)?;
    debug!(width, height, format = %metadata.format, "decoded texture");
    Ok(Imported { data: file.data, metadata, thumbnail: Some(thumbnail) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MAX_THUMBNAIL_SIZE;
    use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
    use rstest::rstest;
    use std::io::Cursor;

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }

    #[rstest]
    #[case(ImageFormat::Png, "brick.png", 64, 64, "png", true)]
    #[case(ImageFormat::Bmp, "decal.bmp", 48, 16, "bmp", false)]
    #[case(ImageFormat::Tga, "ui/icon.tga", 32, 8, "tga", true)]
    fn test_import_texture(
        #[case] format: ImageFormat,
        #[case] name: &str,
        #[case] width: u32,
        #[case] height: u32,
        #[case] expected_format: &str,
        #[case] power_of_two: bool,
    ) {
        let data = encode(DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]))), format);
        let imported = import(SourceFile::new(name, data.clone()), &ImportSettings::default()).unwrap();
        assert_eq!(imported.data, data);
        assert_eq!(imported.metadata.width, width);
        assert_eq!(imported.metadata.height, height);
        assert_eq!(imported.metadata.format, expected_format);
        assert_eq!(imported.metadata.power_of_two, power_of_two);
        let thumb = image::load_from_memory(&imported.thumbnail.unwrap()).unwrap();
        assert_eq!(thumb.dimensions(), (128, 128));
    }

    #[test]
    fn test_jpeg_color_type() {
        let data = encode(DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([200, 100, 50]))), ImageFormat::Jpeg);
        let imported = import(SourceFile::new("photo.jpg", data), &ImportSettings::default()).unwrap();
        assert_eq!(imported.metadata.format, "jpg");
        assert_eq!(imported.metadata.color, "Rgb8");
    }

    #[test]
    fn test_corrupt_texture() {
        let mut data = encode(DynamicImage::ImageRgba8(RgbaImage::new(8, 8)), ImageFormat::Png);
        data.truncate(20);
        let err = import(SourceFile::new("broken.png", data), &ImportSettings::default()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Decode { file, .. } if file == "broken.png"));
        // The decoder's error hangs below ours.
        assert_eq!(err.frame().children().len(), 1);
    }

    #[test]
    fn test_oversized_thumbnail_setting_is_clamped() {
        let data = encode(DynamicImage::ImageRgba8(RgbaImage::new(8, 8)), ImageFormat::Png);
        let settings = ImportSettings { thumbnail_size: 65_536, ..Default::default() };
        let thumbnail = import(SourceFile::new("tiny.png", data), &settings).unwrap().thumbnail.unwrap();
        let thumbnail = image::load_from_memory(&thumbnail).unwrap();
        assert_eq!(thumbnail.dimensions(), (MAX_THUMBNAIL_SIZE, MAX_THUMBNAIL_SIZE));
    }

    #[test]
    fn test_rejects_non_texture() {
        let err = import(SourceFile::new("sky.hdr", b"#?RADIANCE\n".to_vec()), &ImportSettings::default()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat { .. }));
        // Right extension, wrong content.
        let err = import(SourceFile::new("fake.png", b"#?RADIANCE\n".to_vec()), &ImportSettings::default()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat { .. }));
    }
}
