//! Pseudo-3D warp of a flat RGBA sprite.
//!
//! The sprite is treated as a plane centered at the origin, rotated by
//! roll, yaw and pitch, and projected through a pinhole camera with a fixed
//! focal length. The four projected corners define a planar homography that
//! the image is resampled through. This approximates a head turning without
//! any real 3D rendering.

use crate::constants::{WARP_FOCAL_LENGTH, WARP_MIN_PITCH, WARP_MIN_ROLL, WARP_MIN_YAW};
use image::{Rgba, RgbaImage};
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};
use std::borrow::Cow;

/// Rotation angles in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WarpAngles {
    /// Rotation about the X axis (pitch)
    pub angle_x: f64,
    /// Rotation about the Y axis (yaw)
    pub angle_y: f64,
    /// Rotation about the Z axis (roll)
    pub angle_z: f64,
}

impl WarpAngles {
    /// Create angles from pitch, yaw and roll
    #[must_use]
    pub fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self {
            angle_x: pitch,
            angle_y: yaw,
            angle_z: roll,
        }
    }

    /// True when the rotation is too small to be visible
    #[must_use]
    pub fn is_negligible(&self) -> bool {
        self.angle_x.abs() < WARP_MIN_PITCH && self.angle_y.abs() < WARP_MIN_YAW && self.angle_z.abs() < WARP_MIN_ROLL
    }
}

/// Combined rotation `Rz * Ry * Rx` for angles in degrees
#[must_use]
pub fn rotation_matrix(angles: WarpAngles) -> Matrix3<f64> {
    let (ax, ay, az) = (
        angles.angle_x.to_radians(),
        angles.angle_y.to_radians(),
        angles.angle_z.to_radians(),
    );

    #[rustfmt::skip]
    let rx = Matrix3::new(
        1.0, 0.0, 0.0,
        0.0, ax.cos(), -ax.sin(),
        0.0, ax.sin(), ax.cos(),
    );
    #[rustfmt::skip]
    let ry = Matrix3::new(
        ay.cos(), 0.0, ay.sin(),
        0.0, 1.0, 0.0,
        -ay.sin(), 0.0, ay.cos(),
    );
    #[rustfmt::skip]
    let rz = Matrix3::new(
        az.cos(), -az.sin(), 0.0,
        az.sin(), az.cos(), 0.0,
        0.0, 0.0, 1.0,
    );

    rz * ry * rx
}

/// Project the corners of a `width` x `height` plane after rotation
///
/// Corners are returned clockwise from the top-left, matching
/// `(0,0), (w,0), (w,h), (0,h)` in source space.
#[must_use]
pub fn project_corners(width: u32, height: u32, angles: WarpAngles) -> [(f64, f64); 4] {
    let (w, h) = (f64::from(width), f64::from(height));
    // Principal point uses integer halves of the size
    let (cx, cy) = (f64::from(width / 2), f64::from(height / 2));
    let rotation = rotation_matrix(angles);

    let corners = [
        Vector3::new(-w / 2.0, -h / 2.0, 0.0),
        Vector3::new(w / 2.0, -h / 2.0, 0.0),
        Vector3::new(w / 2.0, h / 2.0, 0.0),
        Vector3::new(-w / 2.0, h / 2.0, 0.0),
    ];

    corners.map(|corner| {
        let p = rotation * corner;
        let factor = WARP_FOCAL_LENGTH / (WARP_FOCAL_LENGTH + p.z);
        (p.x * factor + cx, p.y * factor + cy)
    })
}

/// Solve the homography mapping four source points onto four destination points
///
/// Returns `None` if the points are degenerate (three collinear points or a
/// collapsed quad).
#[must_use]
pub fn perspective_transform(src: &[(f64, f64); 4], dst: &[(f64, f64); 4]) -> Option<Matrix3<f64>> {
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for (i, (&(x, y), &(u, v))) in src.iter().zip(dst.iter()).enumerate() {
        let r = 2 * i;
        a[(r, 0)] = x;
        a[(r, 1)] = y;
        a[(r, 2)] = 1.0;
        a[(r, 6)] = -x * u;
        a[(r, 7)] = -y * u;
        b[r] = u;

        a[(r + 1, 3)] = x;
        a[(r + 1, 4)] = y;
        a[(r + 1, 5)] = 1.0;
        a[(r + 1, 6)] = -x * v;
        a[(r + 1, 7)] = -y * v;
        b[r + 1] = v;
    }

    let h = a.lu().solve(&b)?;
    if h.iter().any(|v| !v.is_finite()) {
        return None;
    }

    #[rustfmt::skip]
    let matrix = Matrix3::new(
        h[0], h[1], h[2],
        h[3], h[4], h[5],
        h[6], h[7], 1.0,
    );
    Some(matrix)
}

/// Rotate `image` by pitch/yaw/roll through a pseudo-3D perspective warp
///
/// Negligible rotations and empty images are returned borrowed and untouched.
/// Output pixels with no source coverage are fully transparent.
#[must_use]
pub fn rotate_image(image: &RgbaImage, angles: WarpAngles) -> Cow<'_, RgbaImage> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || angles.is_negligible() {
        return Cow::Borrowed(image);
    }

    let (w, h) = (f64::from(width), f64::from(height));
    let src = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
    let dst = project_corners(width, height, angles);

    let Some(inverse) = perspective_transform(&src, &dst).and_then(|m| m.try_inverse()) else {
        log::debug!("Degenerate warp for angles {angles:?}, skipping");
        return Cow::Borrowed(image);
    };

    Cow::Owned(warp_perspective(image, &inverse))
}

/// Resample `image` through `inverse` (destination to source) with bilinear
/// interpolation and a transparent border
#[must_use]
pub fn warp_perspective(image: &RgbaImage, inverse: &Matrix3<f64>) -> RgbaImage {
    let (width, height) = image.dimensions();
    let mut output = RgbaImage::new(width, height);

    for (x, y, pixel) in output.enumerate_pixels_mut() {
        let p = inverse * Vector3::new(f64::from(x), f64::from(y), 1.0);
        if p.z.abs() < f64::EPSILON {
            continue;
        }
        *pixel = sample_bilinear(image, p.x / p.z, p.y / p.z);
    }

    output
}

/// Bilinear sample with transparent pixels outside the image
#[must_use]
pub fn sample_bilinear(image: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let (width, height) = image.dimensions();
    if !x.is_finite() || !y.is_finite() || x <= -1.0 || y <= -1.0 || x >= f64::from(width) || y >= f64::from(height) {
        return Rgba([0, 0, 0, 0]);
    }

    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    #[allow(clippy::cast_possible_truncation)] // Bounded by the checks above
    let (x0, y0) = (x0 as i64, y0 as i64);

    let fetch = |px: i64, py: i64| -> [f64; 4] {
        if px < 0 || py < 0 || px >= i64::from(width) || py >= i64::from(height) {
            return [0.0; 4];
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Bounds checked
        let p = image.get_pixel(px as u32, py as u32);
        [f64::from(p[0]), f64::from(p[1]), f64::from(p[2]), f64::from(p[3])]
    };

    let tl = fetch(x0, y0);
    let tr = fetch(x0 + 1, y0);
    let bl = fetch(x0, y0 + 1);
    let br = fetch(x0 + 1, y0 + 1);

    let mut out = [0u8; 4];
    for (ch, value) in out.iter_mut().enumerate() {
        let top = tl[ch] * (1.0 - fx) + tr[ch] * fx;
        let bottom = bl[ch] * (1.0 - fx) + br[ch] * fx;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Clamped to [0, 255]
        let v = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
        *value = v;
    }
    Rgba(out)
}
