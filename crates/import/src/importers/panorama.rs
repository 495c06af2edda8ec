//! High dynamic range equirectangular panoramas.
//!
//! Besides the stored blob and an LDR preview, the importer hands the caller
//! an [`EnvironmentMap`]: a box-filtered mip chain of linear levels plus nine
//! L2 spherical harmonic coefficients of the cosine-convolved radiance, which
//! is everything an image-based lighting pass needs. The map is derived data
//! and is never persisted.

use exn::ResultExt;
use glam::Vec3;
use image::{ImageFormat, Rgb, Rgb32FImage, RgbImage, imageops::FilterType};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use tracing::{debug, instrument};

use crate::error::{ErrorKind, Result};
use crate::models::{AssetType, Imported, SourceFile};
use crate::settings::ImportSettings;
use crate::thumbnail::encode_png;

// Widest level used for the irradiance projection.
const SH_SAMPLE_WIDTH: u32 = 128;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HdrMetadata {
    pub width: u32,
    pub height: u32,
    /// `hdr` (Radiance RGBE) or `exr` (OpenEXR).
    pub format: String,
    /// The panorama has the 2:1 aspect of an equirectangular projection.
    pub equirectangular: bool,
    pub peak_luminance: f32,
    pub average_luminance: f32,
    /// Levels in the generated environment map.
    pub environment_levels: u32,
}

/// Prefiltered environment lighting derived from a panorama.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentMap {
    levels: Vec<Rgb32FImage>,
    irradiance: [Vec3; 9],
}
impl EnvironmentMap {
    fn build(base: Rgb32FImage, level_count: u32) -> Self {
        let mut levels = vec![base];
        while levels.len() < level_count.max(1) as usize {
            let Some(last) = levels.last() else { break };
            if last.width() == 1 && last.height() == 1 {
                break;
            }
            let next = downsample(last);
            levels.push(next);
        }
        let sample = levels
            .iter()
            .find(|level| level.width() <= SH_SAMPLE_WIDTH)
            .or(levels.last())
            .map(project_irradiance)
            .unwrap_or([Vec3::ZERO; 9]);
        Self { levels, irradiance: sample }
    }

    /// Mip chain, full resolution first, each level half the previous.
    pub fn levels(&self) -> &[Rgb32FImage] {
        &self.levels
    }

    /// Irradiance spherical harmonic coefficients, band-major
    /// (`l=0`, `l=1 m=-1..1`, `l=2 m=-2..2`), already convolved with the
    /// clamped cosine lobe.
    pub fn irradiance_coefficients(&self) -> &[Vec3; 9] {
        &self.irradiance
    }

    /// Diffuse irradiance arriving at a surface with the given normal
    /// (+Y is up, the top edge of the panorama).
    pub fn irradiance(&self, normal: Vec3) -> Vec3 {
        let basis = sh9(normal.try_normalize().unwrap_or(Vec3::Y));
        self.irradiance
            .iter()
            .zip(basis)
            .fold(Vec3::ZERO, |acc, (coefficient, y)| acc + *coefficient * y)
            .max(Vec3::ZERO)
    }
}

fn sh9(d: Vec3) -> [f32; 9] {
    [
        0.282_095,
        0.488_603 * d.y,
        0.488_603 * d.z,
        0.488_603 * d.x,
        1.092_548 * d.x * d.y,
        1.092_548 * d.y * d.z,
        0.315_392 * (3.0 * d.z * d.z - 1.0),
        1.092_548 * d.x * d.z,
        0.546_274 * (d.x * d.x - d.y * d.y),
    ]
}

/// Project radiance onto SH, weighting each texel by its solid angle, then
/// apply the cosine lobe's per-band factors.
fn project_irradiance(level: &Rgb32FImage) -> [Vec3; 9] {
    let (width, height) = level.dimensions();
    let d_phi = 2.0 * PI / width as f32;
    let d_theta = PI / height as f32;
    let mut coefficients = [Vec3::ZERO; 9];
    for (x, y, Rgb([r, g, b])) in level.enumerate_pixels() {
        let theta = (y as f32 + 0.5) * d_theta;
        let phi = (x as f32 + 0.5) * d_phi;
        let direction = Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
        let weight = theta.sin() * d_theta * d_phi;
        let radiance = Vec3::new(*r, *g, *b) * weight;
        for (coefficient, basis) in coefficients.iter_mut().zip(sh9(direction)) {
            *coefficient += radiance * basis;
        }
    }
    let bands = [PI, 2.0 * PI / 3.0, PI / 4.0];
    for (i, coefficient) in coefficients.iter_mut().enumerate() {
        let band = match i {
            0 => 0,
            1..=3 => 1,
            _ => 2,
        };
        *coefficient *= bands[band];
    }
    coefficients
}

/// Box filter to half size. `imageops::resize` clamps float samples to
/// `0.0..=1.0`, which would flatten every highlight.
fn downsample(source: &Rgb32FImage) -> Rgb32FImage {
    let (sw, sh) = source.dimensions();
    let (dw, dh) = ((sw / 2).max(1), (sh / 2).max(1));
    Rgb32FImage::from_fn(dw, dh, |x, y| {
        let (x0, y0) = (x * sw / dw, y * sh / dh);
        let (x1, y1) = (((x + 1) * sw / dw).max(x0 + 1), ((y + 1) * sh / dh).max(y0 + 1));
        let mut sum = Vec3::ZERO;
        for sy in y0..y1 {
            for sx in x0..x1 {
                let Rgb([r, g, b]) = *source.get_pixel(sx, sy);
                sum += Vec3::new(r, g, b);
            }
        }
        let mean = sum / ((x1 - x0) * (y1 - y0)) as f32;
        Rgb([mean.x, mean.y, mean.z])
    })
}

fn luminance(Rgb([r, g, b]): &Rgb<f32>) -> f32 {
    0.2126 * r + 0.7152 * g + 0.0722 * b
}

/// Reinhard tone map followed by display gamma.
fn tone_map(level: &Rgb32FImage) -> RgbImage {
    let encode = |c: f32| ((c / (1.0 + c)).powf(1.0 / 2.2) * 255.0).round().clamp(0.0, 255.0) as u8;
    RgbImage::from_fn(level.width(), level.height(), |x, y| {
        let Rgb([r, g, b]) = *level.get_pixel(x, y);
        Rgb([encode(r), encode(g), encode(b)])
    })
}

fn detect_format(file: &SourceFile) -> Result<ImageFormat> {
    let format = image::guess_format(&file.data)
        .ok()
        .or_else(|| file.extension().and_then(|ext| ImageFormat::from_extension(ext)))
        .ok_or_else(|| ErrorKind::unsupported(&file.name, "unrecognised HDR container"))?;
    match format {
        ImageFormat::Hdr | ImageFormat::OpenExr => Ok(format),
        other => exn::bail!(ErrorKind::unsupported(&file.name, format!("{other:?} is not a high dynamic range format"))),
    }
}

#[instrument(skip_all, fields(file = %file.name, size = file.data.len()))]
pub(crate) fn import(file: SourceFile, settings: &ImportSettings) -> Result<(Imported<HdrMetadata>, EnvironmentMap)> {
    file.ensure(AssetType::Hdr)?;
    let format = detect_format(&file)?;
    let mut base = image::load_from_memory_with_format(&file.data, format)
        .or_raise(|| ErrorKind::decode(&file.name, format!("corrupt {format:?} image data")))?
        .into_rgb32f();
    let (width, height) = base.dimensions();
    if width == 0 || height == 0 {
        exn::bail!(ErrorKind::decode(&file.name, "panorama has no pixels"));
    }
    // NaN and negative radiance would poison every derived level.
    for pixel in base.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            if !channel.is_finite() || *channel < 0.0 {
                *channel = 0.0;
            }
        }
    }
    let (peak, total) = base
        .pixels()
        .map(luminance)
        .fold((0.0f32, 0.0f64), |(peak, total), l| (peak.max(l), total + f64::from(l)));

    let env_map = EnvironmentMap::build(base, settings.environment_levels);

    // Tone map the smallest level that still covers the preview, then scale
    // the LDR result to the exact 2:1 size.
    let thumb_width = settings.panorama_preview_width();
    let source = env_map
        .levels()
        .iter()
        .rev()
        .find(|level| level.width() >= thumb_width)
        .unwrap_or(&env_map.levels()[0]);
    let preview = image::imageops::resize(&tone_map(source), thumb_width, thumb_width / 2, FilterType::Triangle);
    let thumbnail = encode_png(preview, &file.name)?;

    let metadata = HdrMetadata {
        width,
        height,
        format: (if format == ImageFormat::Hdr { "hdr" } else { "exr" }).to_string(),
        equirectangular: width == height * 2,
        peak_luminance: peak,
        average_luminance: (total / (f64::from(width) * f64::from(height))) as f32,
        environment_levels: env_map.levels().len() as u32,
    };
    debug!(width, height, levels = metadata.environment_levels, equirectangular = metadata.equirectangular, "decoded panorama");
    Ok((Imported { data: file.data, metadata, thumbnail: Some(thumbnail) }, env_map))
}
