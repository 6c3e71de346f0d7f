//! Face detection types and the detector seam.
//!
//! Detection itself is external: anything implementing [`FaceDetector`]
//! can feed the engine. Detectors report boxes and keypoints normalized to
//! `[0, 1]` so the engine can run them on a downscaled frame and map the
//! results back onto the original.

use crate::{Error, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;

/// A 2D point
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn scaled(self, sx: f64, sy: f64) -> Self {
        Self::new(self.x * sx, self.y * sy)
    }

    fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Axis-aligned box given by its top-left corner and size
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Center of the box
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    fn scaled(self, sx: f64, sy: f64) -> Self {
        Self::new(self.x * sx, self.y * sy, self.width * sx, self.height * sy)
    }

    fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

/// The three facial keypoints the engine uses
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoints {
    pub right_eye: Point,
    pub left_eye: Point,
    pub nose: Point,
}

fn default_score() -> f32 {
    1.0
}

/// Detector output with coordinates normalized to the image size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// Normalized bounding box
    pub bbox: BoundingBox,
    /// Normalized keypoints, if the detector produced them
    #[serde(default)]
    pub keypoints: Option<Keypoints>,
    /// Detector confidence
    #[serde(default = "default_score")]
    pub score: f32,
}

impl RawDetection {
    #[must_use]
    pub fn new(bbox: BoundingBox, keypoints: Option<Keypoints>) -> Self {
        Self {
            bbox,
            keypoints,
            score: default_score(),
        }
    }

    /// True if every coordinate is finite and the box size is non-negative
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let keypoints_ok = self
            .keypoints
            .map_or(true, |k| k.right_eye.is_finite() && k.left_eye.is_finite() && k.nose.is_finite());
        self.bbox.is_finite() && self.bbox.width >= 0.0 && self.bbox.height >= 0.0 && keypoints_ok
    }

    /// Map into pixel space of a `width` x `height` frame
    #[must_use]
    pub fn denormalize(&self, width: u32, height: u32) -> Detection {
        let (sx, sy) = (f64::from(width), f64::from(height));
        Detection {
            bbox: self.bbox.scaled(sx, sy),
            keypoints: self.keypoints.map(|k| Keypoints {
                right_eye: k.right_eye.scaled(sx, sy),
                left_eye: k.left_eye.scaled(sx, sy),
                nose: k.nose.scaled(sx, sy),
            }),
            score: self.score,
        }
    }
}

/// A face detection in frame pixel coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Bounding box of the detected face
    pub bbox: BoundingBox,
    /// Keypoints, if available
    pub keypoints: Option<Keypoints>,
    /// Confidence score of the detection
    pub score: f32,
}

impl Detection {
    /// Create a detection from pixel-space values
    #[must_use]
    pub fn new(bbox: BoundingBox, keypoints: Option<Keypoints>) -> Self {
        Self {
            bbox,
            keypoints,
            score: default_score(),
        }
    }
}

/// External face detector
pub trait FaceDetector: Send {
    /// Detect faces in `image`, returning normalized detections
    ///
    /// # Errors
    ///
    /// Implementations report inference failures; the engine logs them and
    /// treats the frame as having no faces.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<RawDetection>>;

    /// Detector name for logging
    fn name(&self) -> &str;

    /// Release detector resources
    fn close(&mut self) {}
}

/// Recorded detections, one list per frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionScript {
    pub frames: Vec<Vec<RawDetection>>,
}

impl DetectionScript {
    /// Load a script from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or holds
    /// non-finite coordinates.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a script from YAML text
    ///
    /// # Errors
    ///
    /// Returns `Error::DetectionDataError` for malformed YAML or invalid
    /// detections.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let script: Self = serde_yaml::from_str(content)
            .map_err(|e| Error::DetectionDataError(format!("Failed to parse detections: {e}")))?;

        for (frame, detections) in script.frames.iter().enumerate() {
            if let Some(index) = detections.iter().position(|d| !d.is_valid()) {
                return Err(Error::DetectionDataError(format!(
                    "Invalid detection {index} in frame {frame}"
                )));
            }
        }

        Ok(script)
    }
}

/// Detector that replays recorded detections frame by frame
///
/// Once the recording runs out every further frame reports no faces.
#[derive(Debug, Default)]
pub struct ReplayDetector {
    frames: VecDeque<Vec<RawDetection>>,
}

impl ReplayDetector {
    #[must_use]
    pub fn new(frames: Vec<Vec<RawDetection>>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    /// Frames left to replay
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl From<DetectionScript> for ReplayDetector {
    fn from(script: DetectionScript) -> Self {
        Self::new(script.frames)
    }
}

impl FaceDetector for ReplayDetector {
    fn detect(&mut self, _image: &RgbImage) -> Result<Vec<RawDetection>> {
        Ok(self.frames.pop_front().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "ReplayDetector"
    }

    fn close(&mut self) {
        self.frames.clear();
    }
}
