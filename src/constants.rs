//! Constants used throughout the engine

/// Yaw angle mapped from a nose at the bounding box edge (degrees)
pub const MAX_YAW: f64 = 55.0;

/// Pitch angle mapped from a nose at the bounding box edge (degrees)
pub const MAX_PITCH: f64 = 35.0;

/// Focal length of the pinhole projection used by the pseudo-3D warp
pub const WARP_FOCAL_LENGTH: f64 = 500.0;

/// Warp fast-path thresholds (degrees)
pub const WARP_MIN_PITCH: f64 = 1.0;
pub const WARP_MIN_YAW: f64 = 1.0;
pub const WARP_MIN_ROLL: f64 = 0.5;

/// Eye offset (pixels) used when keypoints are missing
pub const FALLBACK_EYE_OFFSET: f64 = 10.0;

/// Default adjustment parameters
pub const DEFAULT_MANUAL_SCALE_PERCENT: f64 = 200.0;
pub const DEFAULT_OFFSET_X: i32 = 0;
pub const DEFAULT_OFFSET_Y: i32 = -25;
pub const DEFAULT_YAW_PERCENT: f64 = 150.0;
pub const DEFAULT_PITCH_PERCENT: f64 = 150.0;
pub const DEFAULT_ROLL_OFFSET: f64 = 0.0;

/// Upper bound accepted for the manual scale (percent)
pub const MAX_MANUAL_SCALE_PERCENT: f64 = 1000.0;

/// Default detection parameters
pub const DEFAULT_DET_SCALE: f64 = 0.75;
pub const DEFAULT_MAX_FACES: usize = 4;
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

/// Sprites larger than this multiple of the frame size are not rendered
pub const MAX_SPRITE_FRAME_RATIO: u32 = 4;

/// Default smoothing parameters
pub const DEFAULT_SMOOTH: f64 = 0.60;
pub const DEFAULT_MIN_SMOOTH: f64 = 0.20;
pub const DEFAULT_SCALE_RETAIN: f64 = 0.88;

/// Default tracking parameters
pub const DEFAULT_TRACK_TIMEOUT_SECS: f64 = 1.0;
pub const DEFAULT_MATCH_MIN_DISTANCE: f64 = 40.0;
pub const DEFAULT_MATCH_WIDTH_FRACTION: f64 = 0.5;

/// Numeric precision epsilon for divisions by face size
pub const EPSILON: f64 = 1e-6;
