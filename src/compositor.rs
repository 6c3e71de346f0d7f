//! Overlay transformation and alpha compositing.
//!
//! Every matched track gets its own resized and warped copy of the overlay,
//! stacked onto a transparent float layer with the "over" operator. The
//! finished layer is blended onto the camera frame once.

use crate::{
    config::EngineConfig,
    constants::{EPSILON, MAX_SPRITE_FRAME_RATIO},
    filters::adaptive::SmoothedPose,
    utils::{
        image_conversion::{array3_f32_to_rgba, rgba_to_array3_f32, unit_to_u8},
        safe_cast::{f64_to_i32_clamp, scaled_dimension},
    },
    warp::{rotate_image, WarpAngles},
    Result,
};
use image::{imageops::FilterType, RgbImage, RgbaImage};
use ndarray::{s, Array3, Axis, Zip};
use std::borrow::Cow;

#[allow(clippy::cast_possible_truncation)] // Layer math runs in f32
const EPSILON_F32: f32 = EPSILON as f32;

/// Region of the frame an overlay covers
///
/// The overlay is cropped from its top-left corner to `width` x `height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Place an overlay of `overlay_size` centered at `center` in a frame of `frame_size`
///
/// The top-left corner is clamped to the frame, the far edges are clipped.
/// Returns `None` if nothing of the overlay is visible.
#[must_use]
pub fn placement(frame_size: (u32, u32), center: (i32, i32), overlay_size: (u32, u32)) -> Option<Placement> {
    let (frame_w, frame_h) = (i64::from(frame_size.0), i64::from(frame_size.1));
    let (overlay_w, overlay_h) = (i64::from(overlay_size.0), i64::from(overlay_size.1));

    let x1 = (i64::from(center.0) - overlay_w / 2).max(0);
    let y1 = (i64::from(center.1) - overlay_h / 2).max(0);
    let x2 = (x1 + overlay_w).min(frame_w);
    let y2 = (y1 + overlay_h).min(frame_h);

    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    // All four values lie in [0, frame size] here
    Some(Placement {
        x: u32::try_from(x1).ok()?,
        y: u32::try_from(y1).ok()?,
        width: u32::try_from(x2 - x1).ok()?,
        height: u32::try_from(y2 - y1).ok()?,
    })
}

/// Size of the overlay after automatic and manual scaling
#[must_use]
pub fn sprite_size(overlay: &RgbaImage, scale_factor: f64, config: &EngineConfig) -> (u32, u32) {
    let final_scale = scale_factor * config.manual_scale();
    (
        scaled_dimension(overlay.width(), final_scale),
        scaled_dimension(overlay.height(), final_scale),
    )
}

/// True if a sprite of `size` is small enough to render into a `frame_size` frame
///
/// Only the clipped region is ever visible, so sprites many times larger than
/// the frame are refused before any pixel buffer is allocated for them.
#[must_use]
pub fn sprite_fits(size: (u32, u32), frame_size: (u32, u32)) -> bool {
    u64::from(size.0) <= u64::from(frame_size.0) * u64::from(MAX_SPRITE_FRAME_RATIO)
        && u64::from(size.1) <= u64::from(frame_size.1) * u64::from(MAX_SPRITE_FRAME_RATIO)
}

/// Resize and warp the overlay for one track
#[must_use]
pub fn transform_overlay(overlay: &RgbaImage, pose: &SmoothedPose, scale_factor: f64, config: &EngineConfig) -> RgbaImage {
    let (width, height) = sprite_size(overlay, scale_factor, config);

    let resized = if (width, height) == overlay.dimensions() {
        Cow::Borrowed(overlay)
    } else {
        Cow::Owned(image::imageops::resize(overlay, width, height, FilterType::Triangle))
    };

    let angles = WarpAngles::new(
        pose.pitch * config.pitch_sensitivity(),
        pose.yaw * config.yaw_sensitivity(),
        pose.roll + config.roll_offset,
    );

    match rotate_image(&resized, angles) {
        Cow::Owned(warped) => warped,
        Cow::Borrowed(_) => resized.into_owned(),
    }
}

/// Pixel center of a track's overlay, including the configured offsets
#[must_use]
pub fn overlay_center(pose: &SmoothedPose, config: &EngineConfig) -> (i32, i32) {
    let cx = f64_to_i32_clamp(pose.cx.trunc(), i32::MIN / 2, i32::MAX / 2);
    let cy = f64_to_i32_clamp(pose.cy.trunc(), i32::MIN / 2, i32::MAX / 2);
    (cx.saturating_add(config.offset_x), cy.saturating_add(config.offset_y))
}

/// Transparent RGBA accumulation layer with straight (non-premultiplied) alpha
#[derive(Debug, Clone)]
pub struct OverlayLayer {
    data: Array3<f32>,
}

impl OverlayLayer {
    /// Fully transparent layer of the given size
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: Array3::zeros((height as usize, width as usize, 4)),
        }
    }

    /// Layer as (height, width, 4) floats in [0, 1]
    #[must_use]
    pub const fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Composite `sprite` over the layer inside `placement`
    pub fn composite(&mut self, sprite: &RgbaImage, placement: Placement) {
        let (x, y) = (placement.x as usize, placement.y as usize);
        let width = (placement.width.min(sprite.width())) as usize;
        let height = (placement.height.min(sprite.height())) as usize;
        let (layer_h, layer_w, _) = self.data.dim();
        let width = width.min(layer_w.saturating_sub(x));
        let height = height.min(layer_h.saturating_sub(y));
        if width == 0 || height == 0 {
            return;
        }

        let source = rgba_to_array3_f32(sprite);
        let source = source.slice(s![..height, ..width, ..]);
        let mut target = self.data.slice_mut(s![y..y + height, x..x + width, ..]);

        Zip::from(target.lanes_mut(Axis(2)))
            .and(source.lanes(Axis(2)))
            .for_each(|mut dst, src| {
                let src_a = src[3];
                let dst_a = dst[3];
                let out_a = src_a + dst_a * (1.0 - src_a);
                let denom = out_a.max(EPSILON_F32);
                for c in 0..3 {
                    let value = (src[c] * src_a + dst[c] * dst_a * (1.0 - src_a)) / denom;
                    dst[c] = value.clamp(0.0, 1.0);
                }
                dst[3] = out_a.clamp(0.0, 1.0);
            });
    }

    /// Blend the layer onto `frame`, returning the composited frame
    ///
    /// Frames whose size differs from the layer are returned unchanged.
    #[must_use]
    pub fn blend_onto(&self, frame: &RgbImage) -> RgbImage {
        let (layer_h, layer_w, _) = self.data.dim();
        let mut output = frame.clone();
        if (layer_w, layer_h) != (frame.width() as usize, frame.height() as usize) {
            log::warn!("Layer size does not match frame; skipping blend");
            return output;
        }

        for (x, y, pixel) in output.enumerate_pixels_mut() {
            let (row, col) = (y as usize, x as usize);
            let alpha = self.data[[row, col, 3]];
            if alpha <= 0.0 {
                continue;
            }
            for c in 0..3 {
                let base = f32::from(pixel[c]) / 255.0;
                pixel[c] = unit_to_u8(self.data[[row, col, c]] * alpha + base * (1.0 - alpha));
            }
        }

        output
    }

    /// Layer as an 8-bit RGBA image
    ///
    /// # Errors
    ///
    /// Returns an error if the layer dimensions overflow u32.
    pub fn to_rgba(&self) -> Result<RgbaImage> {
        array3_f32_to_rgba(&self.data)
    }
}

/// Render one track's overlay into `layer`
///
/// Returns false if the overlay fell entirely outside the frame or was too
/// large to render.
pub fn render_track(
    layer: &mut OverlayLayer,
    overlay: &RgbaImage,
    pose: &SmoothedPose,
    scale_factor: f64,
    config: &EngineConfig,
) -> bool {
    let (layer_h, layer_w, _) = layer.data.dim();
    #[allow(clippy::cast_possible_truncation)] // Layer was built from u32 dimensions
    let frame_size = (layer_w as u32, layer_h as u32);

    let size = sprite_size(overlay, scale_factor, config);
    if !sprite_fits(size, frame_size) {
        log::debug!(
            "Skipping {}x{} overlay for a {}x{} frame",
            size.0,
            size.1,
            frame_size.0,
            frame_size.1
        );
        return false;
    }

    let sprite = transform_overlay(overlay, pose, scale_factor, config);

    match placement(frame_size, overlay_center(pose, config), sprite.dimensions()) {
        Some(region) => {
            layer.composite(&sprite, region);
            true
        }
        None => {
            log::trace!("Overlay outside frame at ({:.0}, {:.0})", pose.cx, pose.cy);
            false
        }
    }
}
