//! Overlay loading from disk and overlay folder resolution

mod test_helpers;

use face_overlay::{engine::OverlayEngine, Error};
use image::{GrayAlphaImage, GrayImage, Luma, LumaA, Rgb, RgbImage};
use tempfile::TempDir;
use test_helpers::{frontal_face, plain_config, solid_frame, solid_overlay};

fn engine() -> OverlayEngine {
    OverlayEngine::with_config(None, plain_config()).unwrap()
}

#[test]
fn test_load_rgba_png() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mask.png");
    solid_overlay(4, 4, [255, 0, 0, 255]).save(&path).unwrap();

    let engine = engine();
    engine.set_overlay_path(&path).unwrap();
    assert!(engine.has_overlay());

    let frame = solid_frame(16, 16, [0, 0, 0]);
    let output = engine.process_detections(&frame, &[frontal_face((8.0, 8.0), (4.0, 4.0), (16, 16))]);
    assert_eq!(output.get_pixel(8, 8), &Rgb([255, 0, 0]));
}

#[test]
fn test_grayscale_overlay_is_opaque() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gray.png");
    GrayImage::from_pixel(4, 4, Luma([200])).save(&path).unwrap();

    let engine = engine();
    engine.set_overlay_path(&path).unwrap();

    let frame = solid_frame(16, 16, [0, 0, 0]);
    let output = engine.process_detections(&frame, &[frontal_face((8.0, 8.0), (4.0, 4.0), (16, 16))]);
    assert_eq!(output.get_pixel(8, 8), &Rgb([200, 200, 200]));
}

#[test]
fn test_gray_alpha_overlay_keeps_alpha() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gray_alpha.png");
    GrayAlphaImage::from_pixel(4, 4, LumaA([255, 0])).save(&path).unwrap();

    let engine = engine();
    engine.set_overlay_path(&path).unwrap();

    let frame = solid_frame(16, 16, [30, 60, 90]);
    let output = engine.process_detections(&frame, &[frontal_face((8.0, 8.0), (4.0, 4.0), (16, 16))]);
    assert_eq!(output, frame);
}

#[test]
fn test_rgb_overlay_image() {
    let engine = engine();
    engine
        .set_overlay_image(RgbImage::from_pixel(4, 4, Rgb([0, 0, 255])))
        .unwrap();

    let frame = solid_frame(16, 16, [0, 0, 0]);
    let output = engine.process_detections(&frame, &[frontal_face((8.0, 8.0), (4.0, 4.0), (16, 16))]);
    assert_eq!(output.get_pixel(8, 8), &Rgb([0, 0, 255]));
}

#[test]
fn test_overlay_by_name_in_folder() {
    let dir = TempDir::new().unwrap();
    solid_overlay(4, 4, [0, 255, 0, 255]).save(dir.path().join("face1.png")).unwrap();

    let engine = engine();
    engine.set_overlays_folder(dir.path()).unwrap();
    assert_eq!(engine.overlays_folder().as_deref(), Some(dir.path()));

    engine.set_overlay("face1.png").unwrap();
    assert!(engine.has_overlay());
    assert!(engine.set_overlay("missing.png").is_err());
    assert!(engine.has_overlay());
}

#[test]
fn test_absolute_name_ignores_folder() {
    let folder = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let path = elsewhere.path().join("other.png");
    solid_overlay(2, 2, [1, 2, 3, 255]).save(&path).unwrap();

    let engine = engine();
    engine.set_overlays_folder(folder.path()).unwrap();
    engine.set_overlay(path.to_str().unwrap()).unwrap();
    assert!(engine.has_overlay());
}

#[test]
fn test_folder_must_exist() {
    let dir = TempDir::new().unwrap();
    let engine = engine();
    let result = engine.set_overlays_folder(dir.path().join("nope"));
    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert!(engine.overlays_folder().is_none());
}

#[test]
fn test_undecodable_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.png");
    std::fs::write(&path, b"not a png").unwrap();

    let engine = engine();
    assert!(matches!(engine.set_overlay_path(&path), Err(Error::Image(_))));
    assert!(!engine.has_overlay());
}

#[test]
fn test_clear_overlay() {
    let engine = engine();
    engine.set_overlay_image(solid_overlay(4, 4, [255, 0, 0, 255])).unwrap();
    let frame = solid_frame(16, 16, [0, 0, 0]);
    let _ = engine.process_detections(&frame, &[frontal_face((8.0, 8.0), (4.0, 4.0), (16, 16))]);
    assert_eq!(engine.tracks().len(), 1);

    engine.clear_overlay();
    assert!(!engine.has_overlay());
    assert!(engine.tracks().is_empty());
    let output = engine.process_detections(&frame, &[frontal_face((8.0, 8.0), (4.0, 4.0), (16, 16))]);
    assert_eq!(output, frame);
    assert!(engine.tracks().is_empty());
}
