//! Safe casting utilities for pixel geometry

/// Clamp and convert f64 to i32 for pixel coordinates
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Clamping ensures safe truncation
pub fn f64_to_i32_clamp(value: f64, min: i32, max: i32) -> i32 {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };

    if !value.is_finite() {
        return min;
    }

    let clamped = value.clamp(f64::from(min), f64::from(max));
    (clamped as i32).clamp(min, max)
}

/// Scale an image dimension, flooring and never going below one pixel
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Clamped to [1, u32::MAX]
pub fn scaled_dimension(length: u32, scale: f64) -> u32 {
    let scaled = f64::from(length) * scale;
    if !scaled.is_finite() || scaled < 1.0 {
        return 1;
    }
    scaled.min(f64::from(u32::MAX)).floor() as u32
}
