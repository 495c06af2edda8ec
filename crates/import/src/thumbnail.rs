//! Shared thumbnail helpers: fitting, canvas placement and PNG encoding.

use exn::ResultExt;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage, imageops::FilterType};
use std::io::Cursor;

use crate::error::{ErrorKind, Result};

/// Scale `image` to fit inside an `edge`×`edge` square, preserving the aspect
/// ratio, and centre it on a transparent canvas of exactly that size.
pub(crate) fn fit_centered(image: &DynamicImage, edge: u32) -> RgbaImage {
    let edge = edge.max(1);
    let fitted = image.resize(edge, edge, FilterType::Triangle).to_rgba8();
    let mut canvas = RgbaImage::from_pixel(edge, edge, Rgba([0, 0, 0, 0]));
    let x = (edge - fitted.width().min(edge)) / 2;
    let y = (edge - fitted.height().min(edge)) / 2;
    image::imageops::overlay(&mut canvas, &fitted, i64::from(x), i64::from(y));
    canvas
}

pub(crate) fn encode_png(image: impl Into<DynamicImage>, file: &str) -> Result<Vec<u8>> {
    let image: DynamicImage = image.into();
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .or_raise(|| ErrorKind::Thumbnail(file.to_string()))?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    #[test]
    fn test_fit_centered_letterboxes() {
        let wide = DynamicImage::ImageRgba8(RgbaImage::from_pixel(200, 100, Rgba([255, 0, 0, 255])));
        let canvas = fit_centered(&wide, 64);
        assert_eq!(canvas.dimensions(), (64, 64));
        // Transparent above and below, opaque in the middle band.
        assert_eq!(canvas.get_pixel(32, 2)[3], 0);
        assert_eq!(canvas.get_pixel(32, 32), &Rgba([255, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(32, 61)[3], 0);
    }

    #[test]
    fn test_encode_png() {
        let png = encode_png(RgbaImage::new(4, 4), "tiny.png").unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.dimensions(), (4, 4));
    }
}
