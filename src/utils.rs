//! Utility functions for scalar math, casts and pixel buffer conversions.

pub mod image_conversion;
pub mod safe_cast;

/// Clamp `value` into `[min, max]`
///
/// Unlike `f64::clamp` this never panics: swapped bounds are reordered and a
/// NaN input collapses to `min`.
#[must_use]
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };
    value.max(min).min(max)
}

/// Euclidean distance between two points
#[must_use]
pub fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}
