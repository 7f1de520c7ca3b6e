//! Iterative sub-pixel corner refinement.
//!
//! At the true saddle point `q` every image gradient `g(p)` in the window is
//! orthogonal to `p - q`. Minimising `sum w(p) (g(p)ᵀ (p - q))²` gives the
//! 2x2 normal equations solved on each iteration.
//!
//! On sharp, oblique edges that estimate is pulled towards pixel
//! boundaries. An optional second stage polishes the result with
//! Gauss-Newton on the point symmetry of an X-junction,
//! `I(q + d) = I(q - d)`, sampled in the same weighted window.

use chesscal_core::{sample_bilinear, GrayImageView};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SubPixParams {
    /// Half side of the search window; the window is `2 * half_window + 1` wide.
    pub half_window: usize,
    /// Half side of a central dead zone excluded from the sums, if any.
    pub zero_zone: Option<usize>,
    pub max_iters: usize,
    /// Stop once the corner moves less than this many pixels.
    pub epsilon: f64,
    /// Run the point-symmetry polish after the gradient stage.
    pub symmetry_polish: bool,
}

impl Default for SubPixParams {
    fn default() -> Self {
        Self {
            half_window: 11,
            zero_zone: None,
            max_iters: 30,
            epsilon: 0.001,
            symmetry_polish: true,
        }
    }
}

/// Gaussian-like window weights, row-major over the `(2h+1)²` window.
fn window_mask(params: &SubPixParams) -> Vec<f64> {
    let hw = params.half_window as i64;
    let side = (2 * hw + 1) as usize;
    let scale = hw.max(1) as f64;
    let mut mask = Vec::with_capacity(side * side);
    for i in -hw..=hw {
        let vy = (-(i as f64 / scale).powi(2)).exp();
        for j in -hw..=hw {
            let vx = (-(j as f64 / scale).powi(2)).exp();
            mask.push(vx * vy);
        }
    }

    if let Some(zz) = params.zero_zone {
        let zz = zz as i64;
        for i in -zz.min(hw)..=zz.min(hw) {
            for j in -zz.min(hw)..=zz.min(hw) {
                mask[((i + hw) as usize) * side + (j + hw) as usize] = 0.0;
            }
        }
    }
    mask
}

/// Refine a single corner estimate.
///
/// A corner that drifts outside the image, or further than the window
/// half-size from its start, is returned unchanged.
pub fn refine_corner(view: &GrayImageView<'_>, start: Point2<f32>, params: &SubPixParams) -> Point2<f32> {
    let mask = window_mask(params);
    refine_with_mask(view, start, params, &mask)
}

/// Refine all corners in place.
pub fn refine_corners(view: &GrayImageView<'_>, corners: &mut [Point2<f32>], params: &SubPixParams) {
    let mask = window_mask(params);
    for corner in corners.iter_mut() {
        *corner = refine_with_mask(view, *corner, params, &mask);
    }
}

fn refine_with_mask(
    view: &GrayImageView<'_>,
    start: Point2<f32>,
    params: &SubPixParams,
    mask: &[f64],
) -> Point2<f32> {
    if view.width == 0 || view.height == 0 || params.half_window == 0 {
        return start;
    }

    let hw = params.half_window as i64;
    let side = (2 * hw + 1) as usize;
    // Patch with a one-pixel border for central differences.
    let patch_side = side + 2;
    let mut patch = vec![0.0f64; patch_side * patch_side];
    let eps_sq = params.epsilon * params.epsilon;

    let (sx, sy) = (start.x as f64, start.y as f64);
    let (mut cx, mut cy) = (sx, sy);

    for _ in 0..params.max_iters.max(1) {
        for (r, row) in patch.chunks_mut(patch_side).enumerate() {
            let y = cy + (r as i64 - hw - 1) as f64;
            for (c, value) in row.iter_mut().enumerate() {
                let x = cx + (c as i64 - hw - 1) as f64;
                *value = sample_bilinear(view, x as f32, y as f32) as f64;
            }
        }

        let (mut a, mut b, mut c) = (0.0, 0.0, 0.0);
        let (mut bb1, mut bb2) = (0.0, 0.0);
        for i in 0..side {
            let py = i as f64 - hw as f64;
            let row = (i + 1) * patch_side;
            for j in 0..side {
                let m = mask[i * side + j];
                if m == 0.0 {
                    continue;
                }
                let px = j as f64 - hw as f64;
                let k = row + j + 1;
                let gx = patch[k + 1] - patch[k - 1];
                let gy = patch[k + patch_side] - patch[k - patch_side];
                let gxx = gx * gx * m;
                let gxy = gx * gy * m;
                let gyy = gy * gy * m;
                a += gxx;
                b += gxy;
                c += gyy;
                bb1 += gxx * px + gxy * py;
                bb2 += gxy * px + gyy * py;
            }
        }

        let det = a * c - b * b;
        if det.abs() <= f64::EPSILON * f64::EPSILON {
            break;
        }
        let nx = cx + (c * bb1 - b * bb2) / det;
        let ny = cy + (a * bb2 - b * bb1) / det;
        let err = (nx - cx).powi(2) + (ny - cy).powi(2);
        cx = nx;
        cy = ny;

        if cx < 0.0 || cx >= view.width as f64 || cy < 0.0 || cy >= view.height as f64 {
            break;
        }
        if err <= eps_sq {
            break;
        }
    }

    if !within_window(start, cx, cy, hw) {
        return start;
    }
    if params.symmetry_polish {
        if let Some((px, py)) = symmetry_polish(view, (cx, cy), params, mask) {
            if within_window(start, px, py, hw) {
                return Point2::new(px as f32, py as f32);
            }
        }
    }
    Point2::new(cx as f32, cy as f32)
}

fn within_window(start: Point2<f32>, x: f64, y: f64, hw: i64) -> bool {
    x.is_finite()
        && y.is_finite()
        && (x - start.x as f64).abs() <= hw as f64
        && (y - start.y as f64).abs() <= hw as f64
}

fn gradient_at(view: &GrayImageView<'_>, x: f64, y: f64) -> (f64, f64) {
    const H: f64 = 0.5;
    let s = |x: f64, y: f64| sample_bilinear(view, x as f32, y as f32) as f64;
    (
        (s(x + H, y) - s(x - H, y)) / (2.0 * H),
        (s(x, y + H) - s(x, y - H)) / (2.0 * H),
    )
}

/// Gauss-Newton on `r(d) = I(q + d) - I(q - d)` over half of the window.
///
/// Returns `None` if the normal equations degenerate or the polish moves
/// further than one pixel from `start`.
fn symmetry_polish(
    view: &GrayImageView<'_>,
    start: (f64, f64),
    params: &SubPixParams,
    mask: &[f64],
) -> Option<(f64, f64)> {
    let hw = params.half_window as i64;
    let side = (2 * hw + 1) as usize;
    let eps_sq = params.epsilon * params.epsilon;
    let (mut qx, mut qy) = start;

    for _ in 0..params.max_iters.max(1) {
        let (mut a, mut b, mut c) = (0.0, 0.0, 0.0);
        let (mut r1, mut r2) = (0.0, 0.0);
        for dy in 0..=hw {
            for dx in -hw..=hw {
                // Each symmetric pair once.
                if dy == 0 && dx <= 0 {
                    continue;
                }
                let m = mask[((dy + hw) as usize) * side + (dx + hw) as usize];
                if m == 0.0 {
                    continue;
                }
                let (fx, fy) = (dx as f64, dy as f64);
                let plus = sample_bilinear(view, (qx + fx) as f32, (qy + fy) as f32) as f64;
                let minus = sample_bilinear(view, (qx - fx) as f32, (qy - fy) as f32) as f64;
                let (gpx, gpy) = gradient_at(view, qx + fx, qy + fy);
                let (gmx, gmy) = gradient_at(view, qx - fx, qy - fy);
                let (jx, jy) = (gpx - gmx, gpy - gmy);
                let r = plus - minus;
                a += jx * jx * m;
                b += jx * jy * m;
                c += jy * jy * m;
                r1 += jx * r * m;
                r2 += jy * r * m;
            }
        }

        let det = a * c - b * b;
        if det.abs() <= f64::EPSILON * f64::EPSILON {
            return None;
        }
        let step_x = -(c * r1 - b * r2) / det;
        let step_y = -(a * r2 - b * r1) / det;
        qx += step_x;
        qy += step_y;

        if !qx.is_finite() || !qy.is_finite() {
            return None;
        }
        if (qx - start.0).abs() > 1.0 || (qy - start.1).abs() > 1.0 {
            return None;
        }
        if step_x * step_x + step_y * step_y <= eps_sq {
            break;
        }
    }
    Some((qx, qy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chesscal_core::synthetic::{render_board, BoardPose, SyntheticBoard};
    use chesscal_core::{project_point, CameraMatrix, Distortion, GrayImage};
    use nalgebra::Point3;

    fn quadrant_image(size: usize, corner: (f64, f64)) -> GrayImage {
        // Supersampled two-tone X-junction at a fractional position.
        let mut img = GrayImage::filled(size, size, 0);
        let n = 8;
        for y in 0..size {
            for x in 0..size {
                let mut acc = 0.0;
                for sy in 0..n {
                    for sx in 0..n {
                        let px = x as f64 + (sx as f64 + 0.5) / n as f64 - 0.5;
                        let py = y as f64 + (sy as f64 + 0.5) / n as f64 - 0.5;
                        let dark = (px < corner.0) == (py < corner.1);
                        acc += if dark { 20.0 } else { 230.0 };
                    }
                }
                img.set(x, y, (acc / (n * n) as f64).round() as u8);
            }
        }
        img
    }

    #[test]
    fn converges_to_fractional_junction() {
        let img = quadrant_image(48, (23.3, 24.6));
        let params = SubPixParams {
            half_window: 5,
            ..Default::default()
        };
        let refined = refine_corner(&img.view(), Point2::new(22.0, 26.0), &params);
        assert!((refined.x - 23.3).abs() < 0.05, "x = {}", refined.x);
        assert!((refined.y - 24.6).abs() < 0.05, "y = {}", refined.y);
    }

    #[test]
    fn flat_patch_keeps_start() {
        let img = GrayImage::filled(40, 40, 128);
        let start = Point2::new(20.5, 19.25);
        let refined = refine_corner(&img.view(), start, &SubPixParams::default());
        assert_eq!(refined, start);
    }

    fn rendered_corners(pose: &BoardPose) -> (GrayImage, Vec<Point2<f64>>) {
        let board = SyntheticBoard {
            cols: 5,
            rows: 4,
            square_size: 1.0,
        };
        let camera = CameraMatrix::new(400.0, 400.0, 160.0, 120.0);
        let distortion = Distortion::none();
        let img = render_board(&board, &camera, &distortion, pose, 320, 240, 4);
        let truth = board
            .corners()
            .iter()
            .filter_map(|p| project_point(&camera, &distortion, &pose.rotation, &pose.translation, p))
            .collect();
        (img, truth)
    }

    fn max_error(img: &GrayImage, truth: &[Point2<f64>], params: &SubPixParams) -> f64 {
        let mut corners: Vec<Point2<f32>> = truth
            .iter()
            .map(|p| Point2::new(p.x.round() as f32 + 0.4, p.y.round() as f32 - 0.3))
            .collect();
        refine_corners(&img.view(), &mut corners, params);
        corners
            .iter()
            .zip(truth)
            .map(|(r, t)| (r.x as f64 - t.x).abs().max((r.y as f64 - t.y).abs()))
            .fold(0.0, f64::max)
    }

    #[test]
    fn refines_rendered_board_corners() {
        let center = Point3::new(2.0, 1.5, 0.0);
        let pose = BoardPose::facing(center, 12.0, 0.15, -0.1, 0.05);
        let (img, truth) = rendered_corners(&pose);

        let params = SubPixParams {
            half_window: 5,
            ..Default::default()
        };
        let err = max_error(&img, &truth, &params);
        assert!(err < 0.1, "max error {err}");
    }

    #[test]
    fn symmetry_polish_reduces_pixel_locking() {
        // Sharp edges turned in-plane.
        let center = Point3::new(2.0, 1.5, 0.0);
        let pose = BoardPose::facing(center, 12.0, 0.0, 0.0, 0.5);
        let (img, truth) = rendered_corners(&pose);

        let polished = SubPixParams {
            half_window: 5,
            ..Default::default()
        };
        let gradient_only = SubPixParams {
            symmetry_polish: false,
            ..polished.clone()
        };
        let err_polished = max_error(&img, &truth, &polished);
        let err_gradient = max_error(&img, &truth, &gradient_only);
        assert!(err_polished < 0.045, "polished max error {err_polished}");
        assert!(err_polished < err_gradient, "{err_polished} vs {err_gradient}");
    }
}
