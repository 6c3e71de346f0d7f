//! Configuration management for the face overlay engine

use crate::constants::{
    DEFAULT_DET_SCALE, DEFAULT_MANUAL_SCALE_PERCENT, DEFAULT_MATCH_MIN_DISTANCE, DEFAULT_MATCH_WIDTH_FRACTION,
    DEFAULT_MAX_FACES, DEFAULT_MIN_CONFIDENCE, DEFAULT_MIN_SMOOTH, DEFAULT_OFFSET_X, DEFAULT_OFFSET_Y, DEFAULT_PITCH_PERCENT,
    DEFAULT_ROLL_OFFSET, DEFAULT_SCALE_RETAIN, DEFAULT_SMOOTH, DEFAULT_TRACK_TIMEOUT_SECS, DEFAULT_YAW_PERCENT,
    MAX_MANUAL_SCALE_PERCENT,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tuning values the engine reads once per frame.
///
/// The surrounding application mutates these through the engine setters; every
/// call to `process_frame` works on one consistent copy.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Multiplier on the automatic scale, in percent
    pub manual_scale_percent: f64,
    /// Horizontal pixel offset added to the nose anchor
    pub offset_x: i32,
    /// Vertical pixel offset added to the nose anchor
    pub offset_y: i32,
    /// Multiplier on the estimated yaw, in percent
    pub yaw_percent: f64,
    /// Multiplier on the estimated pitch, in percent
    pub pitch_percent: f64,
    /// Degrees added to the estimated roll
    pub roll_offset: f64,
    /// Downscale factor applied to frames before detection
    pub det_scale: f64,
    /// Maximum number of detections considered per frame
    pub max_faces: usize,
    /// Detections scoring below this are ignored
    pub min_confidence: f32,
    /// Smoothing factor used when the face is still
    pub smooth: f64,
    /// Smoothing factor used under maximum motion
    pub min_smooth: f64,
    /// Fraction of the previous scale kept on each update
    pub scale_retain: f64,
    /// Seconds a track survives without a match
    pub track_timeout_secs: f64,
    /// Lower bound of the nose distance accepted as a match (pixels)
    pub match_min_distance: f64,
    /// Match distance as a fraction of the detection width
    pub match_width_fraction: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            manual_scale_percent: DEFAULT_MANUAL_SCALE_PERCENT,
            offset_x: DEFAULT_OFFSET_X,
            offset_y: DEFAULT_OFFSET_Y,
            yaw_percent: DEFAULT_YAW_PERCENT,
            pitch_percent: DEFAULT_PITCH_PERCENT,
            roll_offset: DEFAULT_ROLL_OFFSET,
            det_scale: DEFAULT_DET_SCALE,
            max_faces: DEFAULT_MAX_FACES,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            smooth: DEFAULT_SMOOTH,
            min_smooth: DEFAULT_MIN_SMOOTH,
            scale_retain: DEFAULT_SCALE_RETAIN,
            track_timeout_secs: DEFAULT_TRACK_TIMEOUT_SECS,
            match_min_distance: DEFAULT_MATCH_MIN_DISTANCE,
            match_width_fraction: DEFAULT_MATCH_WIDTH_FRACTION,
        }
    }
}

impl EngineConfig {
    /// Manual scale as a plain multiplier
    #[must_use]
    pub fn manual_scale(&self) -> f64 {
        self.manual_scale_percent / 100.0
    }

    /// Yaw sensitivity as a plain multiplier
    #[must_use]
    pub fn yaw_sensitivity(&self) -> f64 {
        self.yaw_percent / 100.0
    }

    /// Pitch sensitivity as a plain multiplier
    #[must_use]
    pub fn pitch_sensitivity(&self) -> f64 {
        self.pitch_percent / 100.0
    }

    /// Track timeout as a `Duration`
    ///
    /// Values `validate` would reject saturate instead of panicking.
    #[must_use]
    pub fn track_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.track_timeout_secs.max(0.0)).unwrap_or(Duration::MAX)
    }

    /// Distance within which a detection may claim an existing track
    #[must_use]
    pub fn match_threshold(&self, bbox_width: f64) -> f64 {
        self.match_min_distance.max(bbox_width * self.match_width_fraction)
    }

    /// Validate tuning values
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` naming the first out-of-range value.
    pub fn validate(&self) -> Result<()> {
        if !(self.manual_scale_percent > 0.0 && self.manual_scale_percent <= MAX_MANUAL_SCALE_PERCENT) {
            return Err(Error::ConfigError(format!(
                "Manual scale percent must be in (0, {MAX_MANUAL_SCALE_PERCENT}], got {}",
                self.manual_scale_percent
            )));
        }
        check_percent("Yaw", self.yaw_percent)?;
        check_percent("Pitch", self.pitch_percent)?;
        if !self.roll_offset.is_finite() {
            return Err(Error::ConfigError("Roll offset must be finite".to_string()));
        }
        if !(self.det_scale > 0.0 && self.det_scale <= 1.0) {
            return Err(Error::ConfigError(format!(
                "Detection scale must be in (0, 1], got {}",
                self.det_scale
            )));
        }
        if self.max_faces == 0 {
            return Err(Error::ConfigError("Max faces must be greater than 0".to_string()));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(Error::ConfigError(format!(
                "Minimum confidence must be in [0, 1], got {}",
                self.min_confidence
            )));
        }
        check_unit("Smooth", self.smooth)?;
        check_unit("Min smooth", self.min_smooth)?;
        check_unit("Scale retain", self.scale_retain)?;
        if Duration::try_from_secs_f64(self.track_timeout_secs).is_err() {
            return Err(Error::ConfigError(format!(
                "Track timeout must be a non-negative number of seconds, got {}",
                self.track_timeout_secs
            )));
        }
        if !(self.match_min_distance.is_finite() && self.match_min_distance >= 0.0) {
            return Err(Error::ConfigError(
                "Match minimum distance must be non-negative".to_string(),
            ));
        }
        if !(self.match_width_fraction.is_finite() && self.match_width_fraction >= 0.0) {
            return Err(Error::ConfigError(
                "Match width fraction must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_percent(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::ConfigError(format!(
            "{name} sensitivity percent must be non-negative, got {value}"
        )))
    }
}

// Smoothing factors must stay below 1.0 or the filter never follows the input.
fn check_unit(name: &str, value: f64) -> Result<()> {
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::ConfigError(format!("{name} must be in [0, 1), got {value}")))
    }
}

/// Application configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Overlay image configuration
    pub overlay: OverlayConfig,

    /// Manual placement and pose adjustments
    pub adjustment: AdjustmentConfig,

    /// Detection configuration
    pub detection: DetectionConfig,

    /// Smoothing configuration
    pub smoothing: SmoothingConfig,

    /// Track lifecycle configuration
    pub tracking: TrackingConfig,
}

/// Overlay image source configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Folder that overlay names are resolved against
    pub folder: Option<PathBuf>,

    /// Overlay loaded at startup
    pub default_overlay: Option<String>,
}

/// Manual adjustment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustmentConfig {
    /// Overlay size multiplier (percent)
    pub manual_scale_percent: f64,

    /// Horizontal offset (pixels)
    pub offset_x: i32,

    /// Vertical offset (pixels)
    pub offset_y: i32,

    /// Yaw sensitivity (percent)
    pub yaw_percent: f64,

    /// Pitch sensitivity (percent)
    pub pitch_percent: f64,

    /// Roll offset (degrees)
    pub roll_offset: f64,
}

/// Detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Downscale factor for the detector input
    pub det_scale: f64,

    /// Maximum number of faces to track
    pub max_faces: usize,

    /// Minimum detector confidence
    pub min_confidence: f32,
}

/// Smoothing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Smoothing when still
    pub smooth: f64,

    /// Smoothing under fast motion
    pub min_smooth: f64,

    /// Scale retain factor
    pub scale_retain: f64,
}

/// Tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Seconds before an unmatched track is evicted
    pub timeout_secs: f64,

    /// Minimum match distance (pixels)
    pub match_min_distance: f64,

    /// Match distance as a fraction of face width
    pub match_width_fraction: f64,
}

impl Default for AdjustmentConfig {
    fn default() -> Self {
        Self {
            manual_scale_percent: DEFAULT_MANUAL_SCALE_PERCENT,
            offset_x: DEFAULT_OFFSET_X,
            offset_y: DEFAULT_OFFSET_Y,
            yaw_percent: DEFAULT_YAW_PERCENT,
            pitch_percent: DEFAULT_PITCH_PERCENT,
            roll_offset: DEFAULT_ROLL_OFFSET,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            det_scale: DEFAULT_DET_SCALE,
            max_faces: DEFAULT_MAX_FACES,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            smooth: DEFAULT_SMOOTH,
            min_smooth: DEFAULT_MIN_SMOOTH,
            scale_retain: DEFAULT_SCALE_RETAIN,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TRACK_TIMEOUT_SECS,
            match_min_distance: DEFAULT_MATCH_MIN_DISTANCE,
            match_width_fraction: DEFAULT_MATCH_WIDTH_FRACTION,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the YAML is malformed.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Runtime tuning values described by this file
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            manual_scale_percent: self.adjustment.manual_scale_percent,
            offset_x: self.adjustment.offset_x,
            offset_y: self.adjustment.offset_y,
            yaw_percent: self.adjustment.yaw_percent,
            pitch_percent: self.adjustment.pitch_percent,
            roll_offset: self.adjustment.roll_offset,
            det_scale: self.detection.det_scale,
            max_faces: self.detection.max_faces,
            min_confidence: self.detection.min_confidence,
            smooth: self.smoothing.smooth,
            min_smooth: self.smoothing.min_smooth,
            scale_retain: self.smoothing.scale_retain,
            track_timeout_secs: self.tracking.timeout_secs,
            match_min_distance: self.tracking.match_min_distance,
            match_width_fraction: self.tracking.match_width_fraction,
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` for out-of-range tuning values or a
    /// missing overlay folder.
    pub fn validate(&self) -> Result<()> {
        self.engine_config().validate()?;

        if let Some(folder) = &self.overlay.folder {
            if !folder.is_dir() {
                return Err(Error::ConfigError(format!(
                    "Overlay folder not found: {}",
                    folder.display()
                )));
            }
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Face Overlay Configuration

# Overlay image source
overlay:
  folder: "masks"
  default_overlay: "face1.png"

# Manual adjustments applied on top of the automatic estimates
adjustment:
  manual_scale_percent: 200.0
  offset_x: 0
  offset_y: -25
  yaw_percent: 150.0
  pitch_percent: 150.0
  roll_offset: 0.0

# Detection
detection:
  det_scale: 0.75
  max_faces: 4
  min_confidence: 0.5

# Adaptive smoothing
smoothing:
  smooth: 0.6
  min_smooth: 0.2
  scale_retain: 0.88

# Track lifecycle and matching
tracking:
  timeout_secs: 1.0
  match_min_distance: 40.0
  match_width_fraction: 0.5
"#;
