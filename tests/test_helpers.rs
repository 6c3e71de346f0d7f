//! Helper functions and utilities for tests

#![allow(dead_code)]

use face_overlay::{
    config::EngineConfig,
    detection::{BoundingBox, Keypoints, Point, RawDetection},
    engine::OverlayEngine,
};
use image::{Rgb, RgbImage, Rgba, RgbaImage};

/// Frontal face in pixel units, normalized against a `frame` sized frame
///
/// The nose sits at the box center and the eyes are level, so the raw
/// pose is zero in every axis.
pub fn frontal_face(nose: (f64, f64), size: (f64, f64), frame: (u32, u32)) -> RawDetection {
    let (fw, fh) = (f64::from(frame.0), f64::from(frame.1));
    let (w, h) = size;
    RawDetection::new(
        BoundingBox::new((nose.0 - w / 2.0) / fw, (nose.1 - h / 2.0) / fh, w / fw, h / fh),
        Some(Keypoints {
            right_eye: Point::new((nose.0 - w / 4.0) / fw, nose.1 / fh),
            left_eye: Point::new((nose.0 + w / 4.0) / fw, nose.1 / fh),
            nose: Point::new(nose.0 / fw, nose.1 / fh),
        }),
    )
}

/// Solid color frame
pub fn solid_frame(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb(color))
}

/// Frame with a deterministic gradient so pixel mixups show
pub fn gradient_frame(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) * 3 % 256) as u8])
    })
}

/// Solid color overlay
pub fn solid_overlay(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(color))
}

/// Tuning without manual scaling or offsets
pub fn plain_config() -> EngineConfig {
    EngineConfig {
        manual_scale_percent: 100.0,
        offset_x: 0,
        offset_y: 0,
        ..EngineConfig::default()
    }
}

/// Detector-less engine with plain tuning and the given overlay
pub fn engine_with_overlay(overlay: RgbaImage) -> OverlayEngine {
    let engine = OverlayEngine::with_config(None, plain_config()).unwrap();
    engine.set_overlay_image(overlay).unwrap();
    engine
}
