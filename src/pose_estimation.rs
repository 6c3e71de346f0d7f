//! Head pose and scale estimation from 2D detection geometry.
//!
//! There is no 3D model here: yaw and pitch come from how far the nose sits
//! from the box center, roll from the angle of the line between the eyes.

use crate::{
    constants::{EPSILON, FALLBACK_EYE_OFFSET, MAX_PITCH, MAX_YAW},
    detection::{Detection, Keypoints, Point},
    utils::clamp,
};

/// Unsmoothed pose measured from a single detection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPose {
    /// Nose position in pixels
    pub nose: Point,
    /// Yaw in degrees, positive when the nose is left of center
    pub yaw: f64,
    /// Pitch in degrees, positive when the nose is below center
    pub pitch: f64,
    /// Roll in degrees from the eye line
    pub roll: f64,
}

/// Keypoints of `detection`, or synthetic ones around the box center
///
/// The synthetic eyes lie on a horizontal line so the fallback roll is zero.
#[must_use]
pub fn keypoints_or_fallback(detection: &Detection) -> Keypoints {
    detection.keypoints.unwrap_or_else(|| {
        let center = detection.bbox.center();
        Keypoints {
            right_eye: Point::new(center.x - FALLBACK_EYE_OFFSET, center.y),
            left_eye: Point::new(center.x + FALLBACK_EYE_OFFSET, center.y),
            nose: center,
        }
    })
}

/// Roll in degrees of the line from the right eye to the left eye
///
/// Coinciding eyes give zero.
#[must_use]
pub fn roll_from_eyes(right_eye: Point, left_eye: Point) -> f64 {
    let dx = left_eye.x - right_eye.x;
    let dy = left_eye.y - right_eye.y;
    if dx == 0.0 && dy == 0.0 {
        return 0.0;
    }
    dy.atan2(dx).to_degrees()
}

/// Estimate the raw pose of one detection
#[must_use]
pub fn estimate_pose(detection: &Detection) -> RawPose {
    let keypoints = keypoints_or_fallback(detection);
    let bbox = &detection.bbox;
    let center = bbox.center();

    let norm_x = clamp((keypoints.nose.x - center.x) / (bbox.width / 2.0 + EPSILON), -1.0, 1.0);
    let norm_y = clamp((keypoints.nose.y - center.y) / (bbox.height / 2.0 + EPSILON), -1.0, 1.0);

    RawPose {
        nose: keypoints.nose,
        yaw: -norm_x * MAX_YAW,
        pitch: norm_y * MAX_PITCH,
        roll: roll_from_eyes(keypoints.right_eye, keypoints.left_eye),
    }
}

/// Baseline overlay scale of a new track
///
/// Maps the overlay height onto the face height; 1.0 without an overlay height.
#[must_use]
pub fn base_scale(face_height: f64, overlay_height: u32) -> f64 {
    if overlay_height == 0 {
        1.0
    } else {
        face_height / f64::from(overlay_height)
    }
}

/// Scale the overlay should take for a face of `bbox_height`
///
/// Relative to the track baseline; without a baseline height the overlay
/// height is used directly.
#[must_use]
pub fn target_scale(bbox_height: f64, base_face_height: f64, base_scale: f64, overlay_height: u32) -> f64 {
    if base_face_height != 0.0 {
        (bbox_height / base_face_height) * base_scale
    } else if overlay_height != 0 {
        bbox_height / f64::from(overlay_height)
    } else {
        1.0
    }
}
