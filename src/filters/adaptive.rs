use super::blend;
use crate::{
    constants::{MAX_PITCH, MAX_YAW},
    pose_estimation::RawPose,
    utils::{clamp, distance},
};

/// Smoothed position and pose of one track
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SmoothedPose {
    pub cx: f64,
    pub cy: f64,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl From<&RawPose> for SmoothedPose {
    fn from(raw: &RawPose) -> Self {
        Self {
            cx: raw.nose.x,
            cy: raw.nose.y,
            yaw: raw.yaw,
            pitch: raw.pitch,
            roll: raw.roll,
        }
    }
}

/// Exponential smoother whose retain factor drops as motion grows
///
/// Still faces are smoothed with `smooth`, fast motion relaxes toward
/// `min_smooth` so the overlay keeps up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveFilter {
    smooth: f64,
    min_smooth: f64,
}

impl AdaptiveFilter {
    /// Create a new adaptive filter
    ///
    /// # Panics
    ///
    /// Panics if either factor is not in the range [0, 1)
    #[must_use]
    pub fn new(smooth: f64, min_smooth: f64) -> Self {
        assert!((0.0..1.0).contains(&smooth), "Smooth must be in [0, 1)");
        assert!((0.0..1.0).contains(&min_smooth), "Min smooth must be in [0, 1)");
        Self { smooth, min_smooth }
    }

    /// Normalized motion between the previous state and a new measurement, in [0, 1]
    #[must_use]
    pub fn motion(previous: &SmoothedPose, raw: &RawPose, bbox_width: f64) -> f64 {
        let motion_pos = distance((raw.nose.x, raw.nose.y), (previous.cx, previous.cy)) / bbox_width.max(1.0);
        let motion_pose =
            0.5 * ((raw.yaw - previous.yaw).abs() / MAX_YAW + (raw.pitch - previous.pitch).abs() / MAX_PITCH);
        clamp(motion_pos + motion_pose, 0.0, 1.0)
    }

    /// Retain factor for a given motion
    #[must_use]
    pub fn alpha(&self, motion: f64) -> f64 {
        self.smooth.mul_add(1.0 - motion, self.min_smooth * motion)
    }

    /// Advance `previous` one step toward `raw`
    #[must_use]
    pub fn apply(&self, previous: &SmoothedPose, raw: &RawPose, bbox_width: f64) -> SmoothedPose {
        let alpha = self.alpha(Self::motion(previous, raw, bbox_width));
        log::trace!("Adaptive smoothing alpha {alpha:.3}");

        SmoothedPose {
            cx: blend(previous.cx, raw.nose.x, alpha),
            cy: blend(previous.cy, raw.nose.y, alpha),
            yaw: blend(previous.yaw, raw.yaw, alpha),
            pitch: blend(previous.pitch, raw.pitch, alpha),
            roll: blend(previous.roll, raw.roll, alpha),
        }
    }
}
