//! Image conversion utilities between `image` buffers and ndarray layers.

use crate::{Error, Result};
use image::{imageops::FilterType, DynamicImage, RgbImage, RgbaImage};
use ndarray::Array3;
use std::borrow::Cow;
use std::path::Path;

/// Normalize any decoded image to 8-bit RGBA
///
/// Grayscale, gray+alpha and RGB inputs get a fully opaque alpha channel.
#[must_use]
pub fn normalize_to_rgba(image: DynamicImage) -> RgbaImage {
    match image {
        DynamicImage::ImageRgba8(rgba) => rgba,
        other => {
            log::debug!("Converting {:?} image to RGBA", other.color());
            other.to_rgba8()
        }
    }
}

/// Load an image file as 8-bit RGBA
///
/// # Errors
///
/// Returns `Error::Image` if the file cannot be read or decoded, and
/// `Error::OverlayError` if it has a zero dimension.
pub fn load_rgba<P: AsRef<Path>>(path: P) -> Result<RgbaImage> {
    let path = path.as_ref();
    let decoded = image::open(path).map_err(|e| {
        log::warn!("Failed to load '{}': {e}", path.display());
        Error::from(e)
    })?;
    let rgba = normalize_to_rgba(decoded);

    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(Error::OverlayError(format!(
            "Overlay '{}' has zero size",
            path.display()
        )));
    }

    Ok(rgba)
}

/// Downscale a frame by `scale` for detection
///
/// Scales of 1.0 or more (and degenerate scales) borrow the input unchanged.
#[must_use]
pub fn downscale_rgb(frame: &RgbImage, scale: f64) -> Cow<'_, RgbImage> {
    if !(scale > 0.0 && scale < 1.0) {
        return Cow::Borrowed(frame);
    }
    let width = super::safe_cast::scaled_dimension(frame.width(), scale);
    let height = super::safe_cast::scaled_dimension(frame.height(), scale);
    Cow::Owned(image::imageops::resize(frame, width, height, FilterType::Triangle))
}

/// Convert an RGBA image to an `Array3<f32>` of shape (height, width, 4) in [0, 1]
#[must_use]
pub fn rgba_to_array3_f32(image: &RgbaImage) -> Array3<f32> {
    let (width, height) = image.dimensions();
    Array3::from_shape_fn((height as usize, width as usize, 4), |(row, col, ch)| {
        #[allow(clippy::cast_possible_truncation)] // row/col come from u32 dimensions
        let pixel = image.get_pixel(col as u32, row as u32);
        f32::from(pixel[ch]) / 255.0
    })
}

/// Convert an `Array3<f32>` of shape (height, width, 4) in [0, 1] to an RGBA image
///
/// # Errors
///
/// Returns `Error::InvalidInput` if the array does not have four channels or
/// its dimensions overflow u32.
pub fn array3_f32_to_rgba(array: &Array3<f32>) -> Result<RgbaImage> {
    let (height, width, channels) = array.dim();
    if channels != 4 {
        return Err(Error::InvalidInput(format!(
            "Expected 4 channels, got {channels}"
        )));
    }

    let width = u32::try_from(width).map_err(|_| Error::InvalidInput(format!("Width {width} too large")))?;
    let height = u32::try_from(height).map_err(|_| Error::InvalidInput(format!("Height {height} too large")))?;

    let data: Vec<u8> = array.iter().map(|&v| unit_to_u8(v)).collect();

    RgbaImage::from_raw(width, height, data)
        .ok_or_else(|| Error::InvalidInput("Layer buffer does not match its dimensions".to_string()))
}

/// Map a [0, 1] float to the nearest byte, clamping out-of-range values
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Clamped to [0, 255]
pub fn unit_to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
