//! Per-frame overlay engine.
//!
//! [`OverlayEngine`] owns the overlay image, the track arena, the tuning
//! configuration and the detector. It is `Send + Sync`: setters may be called
//! from other threads while frames are processed.
//!
//! Locking:
//! - `state` guards the overlay image and the track arena. Each frame holds
//!   it for the whole match, smooth and render pass, so an overlay swap lands
//!   between frames and always clears the tracks in the same step.
//! - `config` is only held long enough to copy or replace the tuning values.
//!   Each frame works from one snapshot.
//! - `detector` is locked around detection only.
//!
//! A poisoned lock is recovered, never propagated.

use crate::{
    compositor::{render_track, OverlayLayer},
    config::{Config, EngineConfig},
    constants::{
        DEFAULT_MANUAL_SCALE_PERCENT, DEFAULT_OFFSET_X, DEFAULT_OFFSET_Y, DEFAULT_PITCH_PERCENT,
        DEFAULT_ROLL_OFFSET, DEFAULT_YAW_PERCENT,
    },
    detection::{Detection, FaceDetector, RawDetection},
    tracking::{TrackSnapshot, TrackStore},
    utils::image_conversion::{downscale_rgb, load_rgba, normalize_to_rgba},
    Error, Result,
};
use image::{DynamicImage, RgbImage, RgbaImage};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

struct EngineState {
    overlay: Option<RgbaImage>,
    tracks: TrackStore,
    overlays_folder: Option<PathBuf>,
}

/// Face overlay engine
pub struct OverlayEngine {
    state: Mutex<EngineState>,
    config: Mutex<EngineConfig>,
    detector: Mutex<Option<Box<dyn FaceDetector>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for OverlayEngine {
    fn default() -> Self {
        Self::without_detector()
    }
}

impl OverlayEngine {
    /// Create an engine with default tuning around `detector`
    #[must_use]
    pub fn new(detector: Box<dyn FaceDetector>) -> Self {
        info!("Initializing overlay engine with {}", detector.name());
        Self::build(Some(detector), EngineConfig::default())
    }

    /// Create an engine that only processes caller-supplied detections
    #[must_use]
    pub fn without_detector() -> Self {
        Self::build(None, EngineConfig::default())
    }

    /// Create an engine with explicit tuning
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if `config` holds out-of-range values.
    pub fn with_config(detector: Option<Box<dyn FaceDetector>>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(detector, config))
    }

    /// Create an engine from a configuration file's contents
    ///
    /// Sets the overlay folder and loads the default overlay when configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the default
    /// overlay cannot be loaded.
    pub fn from_config(config: &Config, detector: Option<Box<dyn FaceDetector>>) -> Result<Self> {
        config.validate()?;
        let engine = Self::with_config(detector, config.engine_config())?;

        if let Some(folder) = &config.overlay.folder {
            engine.set_overlays_folder(folder)?;
        }
        if let Some(name) = &config.overlay.default_overlay {
            engine.set_overlay(name)?;
        }

        Ok(engine)
    }

    fn build(detector: Option<Box<dyn FaceDetector>>, config: EngineConfig) -> Self {
        Self {
            state: Mutex::new(EngineState {
                overlay: None,
                tracks: TrackStore::new(),
                overlays_folder: None,
            }),
            config: Mutex::new(config),
            detector: Mutex::new(detector),
        }
    }

    // ---------------- overlay control ----------------

    /// Load the overlay from an image file
    ///
    /// On failure the current overlay and tracks are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `Error::Image` if the file cannot be read or decoded.
    pub fn set_overlay_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let overlay = load_rgba(path)?;
        info!(
            "Loaded overlay '{}' ({}x{})",
            path.display(),
            overlay.width(),
            overlay.height()
        );
        self.install_overlay(overlay);
        Ok(())
    }

    /// Load an overlay by name, relative to the overlay folder if one is set
    ///
    /// # Errors
    ///
    /// Returns `Error::Image` if the resolved file cannot be read or decoded.
    pub fn set_overlay(&self, name: &str) -> Result<()> {
        let path = self.resolve_overlay(name);
        self.set_overlay_path(path)
    }

    /// Use an already decoded image as the overlay
    ///
    /// Grayscale, gray+alpha and RGB images get an opaque alpha channel.
    ///
    /// # Errors
    ///
    /// Returns `Error::OverlayError` if the image has a zero dimension.
    pub fn set_overlay_image(&self, image: impl Into<DynamicImage>) -> Result<()> {
        let overlay = normalize_to_rgba(image.into());
        if overlay.width() == 0 || overlay.height() == 0 {
            return Err(Error::OverlayError("Overlay image has zero size".to_string()));
        }
        debug!("Using {}x{} overlay image", overlay.width(), overlay.height());
        self.install_overlay(overlay);
        Ok(())
    }

    /// Remove the overlay; frames pass through unchanged afterwards
    pub fn clear_overlay(&self) {
        let mut state = lock(&self.state);
        state.overlay = None;
        state.tracks.clear();
        info!("Overlay cleared");
    }

    #[must_use]
    pub fn has_overlay(&self) -> bool {
        lock(&self.state).overlay.is_some()
    }

    /// Set the folder `set_overlay` resolves names against
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `folder` is not a directory.
    pub fn set_overlays_folder<P: AsRef<Path>>(&self, folder: P) -> Result<()> {
        let folder = folder.as_ref();
        if !folder.is_dir() {
            return Err(Error::InvalidInput(format!(
                "Overlay folder '{}' is not a directory",
                folder.display()
            )));
        }
        lock(&self.state).overlays_folder = Some(folder.to_path_buf());
        debug!("Overlay folder set to '{}'", folder.display());
        Ok(())
    }

    #[must_use]
    pub fn overlays_folder(&self) -> Option<PathBuf> {
        lock(&self.state).overlays_folder.clone()
    }

    fn resolve_overlay(&self, name: &str) -> PathBuf {
        let candidate = Path::new(name);
        match &lock(&self.state).overlays_folder {
            Some(folder) if candidate.is_relative() => folder.join(candidate),
            _ => candidate.to_path_buf(),
        }
    }

    fn install_overlay(&self, overlay: RgbaImage) {
        let mut state = lock(&self.state);
        state.overlay = Some(overlay);
        state.tracks.clear();
    }

    // ---------------- tuning ----------------

    /// Snapshot of the current tuning values
    #[must_use]
    pub fn config(&self) -> EngineConfig {
        lock(&self.config).clone()
    }

    /// Replace all tuning values at once
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if `config` holds out-of-range values.
    pub fn set_config(&self, config: EngineConfig) -> Result<()> {
        config.validate()?;
        *lock(&self.config) = config;
        Ok(())
    }

    fn update_config(&self, change: impl FnOnce(&mut EngineConfig)) -> Result<()> {
        let mut config = lock(&self.config);
        let mut updated = config.clone();
        change(&mut updated);
        updated.validate()?;
        *config = updated;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `Error::ConfigError` unless `percent` is in (0, 1000].
    pub fn set_manual_scale_percent(&self, percent: f64) -> Result<()> {
        self.update_config(|c| c.manual_scale_percent = percent)
    }

    pub fn set_offset_x(&self, pixels: i32) {
        lock(&self.config).offset_x = pixels;
    }

    pub fn set_offset_y(&self, pixels: i32) {
        lock(&self.config).offset_y = pixels;
    }

    /// # Errors
    ///
    /// Returns `Error::ConfigError` if `percent` is negative.
    pub fn set_yaw_percent(&self, percent: f64) -> Result<()> {
        self.update_config(|c| c.yaw_percent = percent)
    }

    /// # Errors
    ///
    /// Returns `Error::ConfigError` if `percent` is negative.
    pub fn set_pitch_percent(&self, percent: f64) -> Result<()> {
        self.update_config(|c| c.pitch_percent = percent)
    }

    /// # Errors
    ///
    /// Returns `Error::ConfigError` if `degrees` is not finite.
    pub fn set_roll_offset(&self, degrees: f64) -> Result<()> {
        self.update_config(|c| c.roll_offset = degrees)
    }

    /// # Errors
    ///
    /// Returns `Error::ConfigError` unless `scale` is in (0, 1].
    pub fn set_det_scale(&self, scale: f64) -> Result<()> {
        self.update_config(|c| c.det_scale = scale)
    }

    /// # Errors
    ///
    /// Returns `Error::ConfigError` if `max_faces` is zero.
    pub fn set_max_faces(&self, max_faces: usize) -> Result<()> {
        self.update_config(|c| c.max_faces = max_faces)
    }

    /// Ignore detections scoring below `confidence`
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` unless `confidence` is in [0, 1].
    pub fn set_min_confidence(&self, confidence: f32) -> Result<()> {
        self.update_config(|c| c.min_confidence = confidence)
    }

    /// Set the smoothing bounds used for still and fast-moving faces
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` unless both values are in [0, 1).
    pub fn set_smoothing(&self, smooth: f64, min_smooth: f64) -> Result<()> {
        self.update_config(|c| {
            c.smooth = smooth;
            c.min_smooth = min_smooth;
        })
    }

    /// # Errors
    ///
    /// Returns `Error::ConfigError` if `seconds` is negative, not finite or
    /// too large for a `Duration`.
    pub fn set_track_timeout(&self, seconds: f64) -> Result<()> {
        self.update_config(|c| c.track_timeout_secs = seconds)
    }

    /// Restore the adjustment values to their defaults and drop all tracks
    ///
    /// Detection, smoothing and tracking settings are kept.
    pub fn reset_to_defaults(&self) {
        {
            let mut config = lock(&self.config);
            config.manual_scale_percent = DEFAULT_MANUAL_SCALE_PERCENT;
            config.offset_x = DEFAULT_OFFSET_X;
            config.offset_y = DEFAULT_OFFSET_Y;
            config.yaw_percent = DEFAULT_YAW_PERCENT;
            config.pitch_percent = DEFAULT_PITCH_PERCENT;
            config.roll_offset = DEFAULT_ROLL_OFFSET;
        }
        lock(&self.state).tracks.clear();
        info!("Adjustments reset to defaults");
    }

    // ---------------- processing ----------------

    /// Detect faces in `frame` and draw the overlay onto each of them
    ///
    /// Returns a frame of the same size. Without an overlay, or for an
    /// empty frame, the input is returned unchanged.
    #[must_use]
    pub fn process_frame(&self, frame: &RgbImage) -> RgbImage {
        self.process_frame_at(frame, Instant::now())
    }

    /// [`process_frame`](Self::process_frame) with an explicit frame time
    #[must_use]
    pub fn process_frame_at(&self, frame: &RgbImage, now: Instant) -> RgbImage {
        if frame.width() == 0 || frame.height() == 0 || !self.has_overlay() {
            return frame.clone();
        }
        let config = self.config();
        let detections = self.detect(frame, config.det_scale);
        self.render_frame(frame, &detections, &config, now)
    }

    /// Draw the overlay for caller-supplied normalized detections
    #[must_use]
    pub fn process_detections(&self, frame: &RgbImage, detections: &[RawDetection]) -> RgbImage {
        self.process_detections_at(frame, detections, Instant::now())
    }

    /// [`process_detections`](Self::process_detections) with an explicit frame time
    #[must_use]
    pub fn process_detections_at(&self, frame: &RgbImage, detections: &[RawDetection], now: Instant) -> RgbImage {
        let config = self.config();
        self.render_frame(frame, detections, &config, now)
    }

    fn render_frame(
        &self,
        frame: &RgbImage,
        detections: &[RawDetection],
        config: &EngineConfig,
        now: Instant,
    ) -> RgbImage {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return frame.clone();
        }

        let detections: Vec<Detection> = detections
            .iter()
            .filter(|raw| {
                if !raw.is_valid() {
                    warn!("Skipping detection with invalid coordinates");
                    return false;
                }
                if raw.score < config.min_confidence {
                    debug!("Skipping detection with score {:.2}", raw.score);
                    return false;
                }
                true
            })
            .map(|raw| raw.denormalize(width, height))
            .collect();

        let mut state = lock(&self.state);
        let EngineState { overlay, tracks, .. } = &mut *state;
        let Some(overlay) = overlay.as_ref() else {
            return frame.clone();
        };

        let assigned = tracks.update(&detections, config, overlay.height(), now);

        let mut layer = OverlayLayer::new(width, height);
        for id in &assigned {
            if let Some(track) = tracks.get(*id) {
                render_track(&mut layer, overlay, &track.pose, track.scale_factor, config);
            }
        }

        tracks.evict_stale(now, config.track_timeout());
        drop(state);

        layer.blend_onto(frame)
    }

    fn detect(&self, frame: &RgbImage, det_scale: f64) -> Vec<RawDetection> {
        let mut detector = lock(&self.detector);
        let Some(detector) = detector.as_mut() else {
            return Vec::new();
        };

        let input = downscale_rgb(frame, det_scale);
        match detector.detect(&input) {
            Ok(detections) => detections,
            Err(e) => {
                warn!("{} failed: {e}", detector.name());
                Vec::new()
            }
        }
    }

    /// Live tracks sorted by id
    #[must_use]
    pub fn tracks(&self) -> Vec<TrackSnapshot> {
        lock(&self.state).tracks.snapshots()
    }

    #[must_use]
    pub fn has_detector(&self) -> bool {
        lock(&self.detector).is_some()
    }

    /// Release the detector
    ///
    /// Later frames see no new detections; existing tracks expire normally.
    pub fn close(&self) {
        if let Some(mut detector) = lock(&self.detector).take() {
            detector.close();
            info!("Closed {}", detector.name());
        }
    }
}

impl Drop for OverlayEngine {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BoundingBox, Keypoints, Point, ReplayDetector};
    use image::{Rgb, Rgba};
    use std::sync::{Arc, OnceLock, Weak};
    use std::time::Duration;

    struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn detect(&mut self, _image: &RgbImage) -> Result<Vec<RawDetection>> {
            Err(Error::DetectorError("model unavailable".to_string()))
        }

        fn name(&self) -> &str {
            "FailingDetector"
        }
    }

    /// Detector that retunes its own engine while the frame is in flight
    struct RetuningDetector {
        engine: Arc<OnceLock<Weak<OverlayEngine>>>,
    }

    impl FaceDetector for RetuningDetector {
        fn detect(&mut self, _image: &RgbImage) -> Result<Vec<RawDetection>> {
            if let Some(engine) = self.engine.get().and_then(Weak::upgrade) {
                engine.set_manual_scale_percent(400.0)?;
            }
            Ok(vec![centered_face()])
        }

        fn name(&self) -> &str {
            "RetuningDetector"
        }
    }

    fn plain_config() -> EngineConfig {
        EngineConfig {
            manual_scale_percent: 100.0,
            offset_x: 0,
            offset_y: 0,
            ..EngineConfig::default()
        }
    }

    fn centered_face() -> RawDetection {
        RawDetection::new(
            BoundingBox::new(0.4, 0.4, 0.2, 0.2),
            Some(Keypoints {
                right_eye: Point::new(0.45, 0.45),
                left_eye: Point::new(0.55, 0.45),
                nose: Point::new(0.5, 0.5),
            }),
        )
    }

    #[test]
    fn test_engine_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<OverlayEngine>();
    }

    #[test]
    fn test_no_overlay_passthrough() {
        let engine = OverlayEngine::new(Box::new(ReplayDetector::new(vec![vec![centered_face()]])));
        let frame = RgbImage::from_pixel(40, 30, Rgb([10, 20, 30]));
        assert_eq!(engine.process_frame(&frame), frame);
        assert!(engine.tracks().is_empty());
    }

    #[test]
    fn test_empty_frame_returned() {
        let engine = OverlayEngine::without_detector();
        engine
            .set_overlay_image(RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])))
            .unwrap();
        let frame = RgbImage::new(0, 0);
        assert_eq!(engine.process_detections(&frame, &[centered_face()]), frame);
    }

    #[test]
    fn test_detector_error_means_no_faces() {
        let engine = OverlayEngine::new(Box::new(FailingDetector));
        engine
            .set_overlay_image(RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])))
            .unwrap();
        let frame = RgbImage::from_pixel(40, 30, Rgb([10, 20, 30]));
        assert_eq!(engine.process_frame(&frame), frame);
        assert!(engine.tracks().is_empty());
    }

    #[test]
    fn test_overlay_swap_resets_tracks() {
        let engine = OverlayEngine::without_detector();
        engine
            .set_overlay_image(RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])))
            .unwrap();
        let frame = RgbImage::new(100, 100);
        let _ = engine.process_detections(&frame, &[centered_face()]);
        assert_eq!(engine.tracks().len(), 1);

        engine
            .set_overlay_image(RgbaImage::from_pixel(8, 8, Rgba([0, 255, 0, 255])))
            .unwrap();
        assert!(engine.tracks().is_empty());
    }

    #[test]
    fn test_failed_load_keeps_overlay() {
        let engine = OverlayEngine::without_detector();
        engine
            .set_overlay_image(RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])))
            .unwrap();
        let _ = engine.process_detections(&RgbImage::new(100, 100), &[centered_face()]);

        assert!(engine.set_overlay_path("/nonexistent/mask.png").is_err());
        assert!(engine.has_overlay());
        assert_eq!(engine.tracks().len(), 1);
    }

    #[test]
    fn test_zero_size_overlay_rejected() {
        let engine = OverlayEngine::without_detector();
        assert!(matches!(
            engine.set_overlay_image(RgbaImage::new(0, 5)),
            Err(Error::OverlayError(_))
        ));
        assert!(!engine.has_overlay());
    }

    #[test]
    fn test_setters_validate() {
        let engine = OverlayEngine::without_detector();
        assert!(engine.set_manual_scale_percent(0.0).is_err());
        assert!(engine.set_det_scale(1.5).is_err());
        assert!(engine.set_smoothing(1.0, 0.2).is_err());
        assert!(engine.set_max_faces(0).is_err());
        assert_eq!(engine.config(), EngineConfig::default());

        engine.set_yaw_percent(80.0).unwrap();
        engine.set_offset_x(12);
        assert_eq!(engine.config().yaw_percent, 80.0);
        assert_eq!(engine.config().offset_x, 12);
    }

    #[test]
    fn test_reset_to_defaults() {
        let engine = OverlayEngine::without_detector();
        engine
            .set_overlay_image(RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])))
            .unwrap();
        engine.set_manual_scale_percent(50.0).unwrap();
        engine.set_offset_y(40);
        engine.set_max_faces(2).unwrap();
        let _ = engine.process_detections(&RgbImage::new(100, 100), &[centered_face()]);

        engine.reset_to_defaults();
        let config = engine.config();
        assert_eq!(config.manual_scale_percent, DEFAULT_MANUAL_SCALE_PERCENT);
        assert_eq!(config.offset_y, DEFAULT_OFFSET_Y);
        assert_eq!(config.max_faces, 2);
        assert!(engine.tracks().is_empty());
        assert!(engine.has_overlay());
    }

    #[test]
    fn test_close_releases_detector() {
        let engine = OverlayEngine::new(Box::new(ReplayDetector::new(vec![
            vec![centered_face()],
            vec![centered_face()],
        ])));
        engine
            .set_overlay_image(RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])))
            .unwrap();
        let start = Instant::now();
        let frame = RgbImage::new(100, 100);

        let _ = engine.process_frame_at(&frame, start);
        assert_eq!(engine.tracks().len(), 1);

        engine.close();
        assert!(!engine.has_detector());
        let _ = engine.process_frame_at(&frame, start + Duration::from_millis(100));
        assert_eq!(engine.tracks().len(), 1);
        let _ = engine.process_frame_at(&frame, start + Duration::from_secs(2));
        assert!(engine.tracks().is_empty());
    }

    #[test]
    fn test_out_of_range_tuning_rejected() {
        let engine = OverlayEngine::without_detector();
        engine
            .set_overlay_image(RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])))
            .unwrap();

        assert!(matches!(engine.set_track_timeout(1e20), Err(Error::ConfigError(_))));
        assert!(matches!(
            engine.set_manual_scale_percent(1e12),
            Err(Error::ConfigError(_))
        ));
        assert!(engine.set_min_confidence(-0.1).is_err());
        assert_eq!(engine.config(), EngineConfig::default());

        let frame = RgbImage::new(32, 32);
        let output = engine.process_detections(&frame, &[centered_face()]);
        assert_eq!(output.dimensions(), (32, 32));
    }

    #[test]
    fn test_low_confidence_detection_skipped() {
        let engine = OverlayEngine::without_detector();
        engine
            .set_overlay_image(RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])))
            .unwrap();
        let frame = RgbImage::new(100, 100);

        let mut weak = centered_face();
        weak.score = 0.3;
        assert_eq!(engine.process_detections(&frame, &[weak.clone()]), frame);
        assert!(engine.tracks().is_empty());

        engine.set_min_confidence(0.2).unwrap();
        let _ = engine.process_detections(&frame, &[weak]);
        assert_eq!(engine.tracks().len(), 1);
    }

    #[test]
    fn test_frame_uses_one_config_snapshot() {
        let handle = Arc::new(OnceLock::new());
        let detector = RetuningDetector {
            engine: Arc::clone(&handle),
        };
        let engine = Arc::new(OverlayEngine::with_config(Some(Box::new(detector)), plain_config()).unwrap());
        let _ = handle.set(Arc::downgrade(&engine));
        engine
            .set_overlay_image(RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])))
            .unwrap();

        // 20 px face over a 4 px overlay: 20x20 sprite at 100%, 80x80 at 400%
        let output = engine.process_frame(&RgbImage::new(100, 100));
        assert_eq!(output.get_pixel(50, 50), &Rgb([255, 0, 0]));
        assert_eq!(output.get_pixel(15, 50), &Rgb([0, 0, 0]));
        assert_eq!(engine.config().manual_scale_percent, 400.0);
    }

    #[test]
    fn test_invalid_detection_skipped() {
        let engine = OverlayEngine::without_detector();
        engine
            .set_overlay_image(RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])))
            .unwrap();
        let mut bad = centered_face();
        bad.bbox.x = f64::INFINITY;
        let _ = engine.process_detections(&RgbImage::new(50, 50), &[bad, centered_face()]);
        assert_eq!(engine.tracks().len(), 1);
    }
}
