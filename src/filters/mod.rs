//! Temporal smoothing for tracked faces.
//!
//! Both smoothers are plain parameter objects built from the per-frame
//! configuration snapshot; the smoothed state itself lives on each track.

/// Motion-adaptive smoothing for position and pose
pub mod adaptive;

/// Fixed-retain exponential smoothing for scale
pub mod exponential;

/// Blend a previous value toward a new one
///
/// `retain` is the weight of the previous value: 0 follows `raw` instantly,
/// values close to 1 barely move.
#[must_use]
pub fn blend(previous: f64, raw: f64, retain: f64) -> f64 {
    retain.mul_add(previous - raw, raw)
}
