//! Overlays and figure composition for the debug and demo outputs.

use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use nalgebra::Point2;

const ROW_COLORS: [Rgb<u8>; 6] = [
    Rgb([255, 0, 0]),
    Rgb([255, 128, 0]),
    Rgb([200, 200, 0]),
    Rgb([0, 200, 0]),
    Rgb([0, 128, 255]),
    Rgb([160, 0, 255]),
];

/// Mark every corner with a circle, colored per board row, and connect the
/// corners in detection order.
pub fn draw_corners(img: &mut RgbImage, corners: &[Point2<f32>], cols: usize) {
    let cols = cols.max(1);
    for (row, chunk) in corners.chunks(cols).enumerate() {
        let color = ROW_COLORS[row % ROW_COLORS.len()];
        for p in chunk {
            draw_hollow_circle_mut(img, (p.x.round() as i32, p.y.round() as i32), 5, color);
        }
    }
    for (k, pair) in corners.windows(2).enumerate() {
        let color = ROW_COLORS[(k / cols) % ROW_COLORS.len()];
        draw_line_segment_mut(img, (pair[0].x, pair[0].y), (pair[1].x, pair[1].y), color);
    }
}

/// Line of the given pixel thickness, built from parallel one-pixel segments.
pub fn draw_thick_line(img: &mut RgbImage, from: [i32; 2], to: [i32; 2], thickness: u32, color: Rgb<u8>) {
    let (x0, y0) = (from[0] as f32, from[1] as f32);
    let (x1, y1) = (to[0] as f32, to[1] as f32);
    let (dx, dy) = (x1 - x0, y1 - y0);
    let len = (dx * dx + dy * dy).sqrt();
    let (nx, ny) = if len > 0.0 { (-dy / len, dx / len) } else { (0.0, 0.0) };

    let thickness = thickness.max(1);
    let center = (thickness - 1) as f32 * 0.5;
    for k in 0..thickness {
        let off = k as f32 - center;
        draw_line_segment_mut(
            img,
            (x0 + nx * off, y0 + ny * off),
            (x1 + nx * off, y1 + ny * off),
            color,
        );
    }
}

/// Place two images next to each other on a black canvas.
pub fn side_by_side(left: &RgbImage, right: &RgbImage) -> RgbImage {
    let width = left.width() + right.width();
    let height = left.height().max(right.height());
    let mut out = RgbImage::new(width, height);
    imageops::replace(&mut out, left, 0, 0);
    imageops::replace(&mut out, right, left.width() as i64, 0);
    out
}
