//! Benchmarks for the pseudo-3D warp and compositing primitives

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use face_overlay::{
    compositor::{OverlayLayer, Placement},
    warp::{perspective_transform, project_corners, rotate_image, WarpAngles},
};
use image::{Rgba, RgbaImage};
use std::time::Duration;

fn test_overlay(size: u32) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, y| {
        let alpha = if (x + y) % 3 == 0 { 255 } else { 128 };
        Rgba([(x % 256) as u8, (y % 256) as u8, 90, alpha])
    })
}

/// Benchmark the warp at different overlay sizes
fn bench_rotate_image(c: &mut Criterion) {
    let mut group = c.benchmark_group("rotate_image");
    group.measurement_time(Duration::from_secs(10));

    let angles = WarpAngles::new(12.0, -30.0, 8.0);
    for size in [64u32, 128, 256] {
        let overlay = test_overlay(size);
        group.bench_with_input(BenchmarkId::new("warp", size), &overlay, |b, overlay| {
            b.iter(|| black_box(rotate_image(overlay, black_box(angles))));
        });
    }

    // Negligible angles take the fast path
    let overlay = test_overlay(256);
    group.bench_function("fast_path_256", |b| {
        b.iter(|| black_box(rotate_image(&overlay, black_box(WarpAngles::new(0.5, 0.5, 0.2)))));
    });

    group.finish();
}

/// Benchmark the homography solve on its own
fn bench_homography(c: &mut Criterion) {
    let src = [(0.0, 0.0), (200.0, 0.0), (200.0, 160.0), (0.0, 160.0)];
    let dst = project_corners(200, 160, WarpAngles::new(20.0, 35.0, 10.0));

    c.bench_function("perspective_transform", |b| {
        b.iter(|| black_box(perspective_transform(black_box(&src), black_box(&dst))));
    });
}

/// Benchmark over-compositing into the float layer
fn bench_composite(c: &mut Criterion) {
    let mut group = c.benchmark_group("composite");

    for size in [64u32, 128, 256] {
        let sprite = test_overlay(size);
        let placement = Placement {
            x: 10,
            y: 10,
            width: size,
            height: size,
        };
        group.bench_with_input(BenchmarkId::new("over", size), &sprite, |b, sprite| {
            let mut layer = OverlayLayer::new(640, 480);
            b.iter(|| layer.composite(black_box(sprite), placement));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_rotate_image, bench_homography, bench_composite);
criterion_main!(benches);
