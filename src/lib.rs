//! Face overlay engine for live video.
//!
//! This library draws an alpha-masked overlay image onto every face in a
//! video stream, following each face's position, size and head pose:
//! - Greedy nearest-neighbor tracking keeps one identity per face
//! - Yaw, pitch and roll are estimated from the detection's keypoints
//! - Motion-adaptive smoothing removes jitter without lagging fast moves
//! - A pseudo-3D perspective warp tilts the overlay to match the pose
//!
//! Face detection is external: implement [`detection::FaceDetector`] for
//! any model, or feed detections directly with
//! [`OverlayEngine::process_detections`](engine::OverlayEngine::process_detections).
//!
//! The per-frame pipeline:
//! 1. Detect faces on a downscaled copy of the frame
//! 2. Match detections to tracks and estimate their raw pose
//! 3. Smooth position, pose and scale per track
//! 4. Resize, warp and composite one overlay per matched track
//! 5. Blend the composite layer onto the frame
//!
//! # Examples
//!
//! ## Replaying recorded detections
//!
//! ```no_run
//! use face_overlay::{
//!     detection::{BoundingBox, Keypoints, Point, RawDetection, ReplayDetector},
//!     engine::OverlayEngine,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let face = RawDetection::new(
//!     BoundingBox::new(0.4, 0.3, 0.2, 0.3),
//!     Some(Keypoints {
//!         right_eye: Point::new(0.45, 0.4),
//!         left_eye: Point::new(0.55, 0.4),
//!         nose: Point::new(0.5, 0.47),
//!     }),
//! );
//! let engine = OverlayEngine::new(Box::new(ReplayDetector::new(vec![vec![face]])));
//! engine.set_overlay_path("masks/face1.png")?;
//!
//! let frame = image::open("frame.png")?.to_rgb8();
//! let output = engine.process_frame(&frame);
//! output.save("out.png")?;
//!
//! for track in engine.tracks() {
//!     println!("Track {}: yaw {:.1}°", track.id, track.pose.yaw);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Tuning at runtime
//!
//! ```no_run
//! use face_overlay::engine::OverlayEngine;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = OverlayEngine::without_detector();
//! engine.set_manual_scale_percent(150.0)?;
//! engine.set_offset_y(-40);
//! engine.set_smoothing(0.7, 0.25)?;
//!
//! // Back to the default adjustments; also forgets all tracks
//! engine.reset_to_defaults();
//! # Ok(())
//! # }
//! ```

/// Composite layer, overlay placement and blending
pub mod compositor;

/// Configuration management
pub mod config;

/// Constants used throughout the engine
pub mod constants;

/// Detection types and the external detector seam
pub mod detection;

/// The per-frame overlay engine
pub mod engine;

/// Error types and result handling
pub mod error;

/// Temporal smoothing of track state
pub mod filters;

/// Pose and scale estimation from detection geometry
pub mod pose_estimation;

/// Track store and greedy matcher
pub mod tracking;

/// Utility functions for math, casts and image buffers
pub mod utils;

/// Pseudo-3D perspective warp
pub mod warp;

pub use engine::OverlayEngine;
pub use error::{Error, Result};
