//! Synthetic checkerboard views with known ground truth.
//!
//! Board coordinates follow the calibration convention: the origin sits on
//! the first inner corner, `x` runs along a row, `y` down the columns, and
//! the board is the `z = 0` plane. A board with `cols x rows` inner corners
//! has `(cols + 1) x (rows + 1)` squares.

use crate::{project_point, CameraMatrix, Distortion, GrayImage, UNDISTORT_ITERATIONS};
use nalgebra::{Point2, Point3, Rotation3, Vector3};

const DARK: f64 = 30.0;
const LIGHT: f64 = 225.0;

/// Rigid transform taking board coordinates into the camera frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoardPose {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
}

impl BoardPose {
    /// Pose that puts `center` (board coordinates) on the optical axis at
    /// `distance`, after tilting the board by the given Euler angles (radians).
    pub fn facing(center: Point3<f64>, distance: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        let rotation = Rotation3::from_euler_angles(roll, pitch, yaw);
        let translation = Vector3::new(0.0, 0.0, distance) - rotation * center.coords;
        Self {
            rotation,
            translation,
        }
    }
}

/// Inner-corner layout of a synthetic board.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyntheticBoard {
    pub cols: usize,
    pub rows: usize,
    pub square_size: f64,
}

impl SyntheticBoard {
    pub fn center(&self) -> Point3<f64> {
        Point3::new(
            0.5 * (self.cols - 1) as f64 * self.square_size,
            0.5 * (self.rows - 1) as f64 * self.square_size,
            0.0,
        )
    }

    /// Inner corners in row-major order.
    pub fn corners(&self) -> Vec<Point3<f64>> {
        (0..self.rows)
            .flat_map(|y| {
                (0..self.cols).map(move |x| {
                    Point3::new(x as f64 * self.square_size, y as f64 * self.square_size, 0.0)
                })
            })
            .collect()
    }

    /// Intensity of the printed board at a board-plane location, `None` off the board.
    fn shade(&self, x: f64, y: f64) -> Option<f64> {
        let sx = (x / self.square_size).floor() as i64 + 1;
        let sy = (y / self.square_size).floor() as i64 + 1;
        if sx < 0 || sy < 0 || sx > self.cols as i64 || sy > self.rows as i64 {
            return None;
        }
        Some(if (sx + sy) % 2 == 0 { DARK } else { LIGHT })
    }
}

/// Project every inner corner of `board` into the image.
pub fn project_board(
    board: &SyntheticBoard,
    camera: &CameraMatrix,
    distortion: &Distortion,
    pose: &BoardPose,
) -> Vec<Option<Point2<f64>>> {
    board
        .corners()
        .iter()
        .map(|p| project_point(camera, distortion, &pose.rotation, &pose.translation, p))
        .collect()
}

/// Ray-trace a distorted view of the board onto a light background.
///
/// Every pixel is supersampled `supersample x supersample` times, which
/// gives anti-aliased edges similar to a real optical blur.
pub fn render_board(
    board: &SyntheticBoard,
    camera: &CameraMatrix,
    distortion: &Distortion,
    pose: &BoardPose,
    width: usize,
    height: usize,
    supersample: usize,
) -> GrayImage {
    let n = supersample.max(1);
    let r_inv = pose.rotation.inverse();
    let t_board = r_inv * pose.translation;
    let mut out = GrayImage::filled(width, height, LIGHT as u8);

    for v in 0..height {
        for u in 0..width {
            let mut acc = 0.0;
            for sy in 0..n {
                for sx in 0..n {
                    let px = Point2::new(
                        u as f64 + (sx as f64 + 0.5) / n as f64 - 0.5,
                        v as f64 + (sy as f64 + 0.5) / n as f64 - 0.5,
                    );
                    let ideal = distortion
                        .undistort(camera.normalized_from_pixel(px), UNDISTORT_ITERATIONS);
                    let ray = r_inv * Vector3::new(ideal.x, ideal.y, 1.0);
                    acc += if ray.z.abs() < 1e-12 {
                        LIGHT
                    } else {
                        let lambda = t_board.z / ray.z;
                        if lambda <= 0.0 {
                            LIGHT
                        } else {
                            let hit = lambda * ray - t_board;
                            board.shade(hit.x, hit.y).unwrap_or(LIGHT)
                        }
                    };
                }
            }
            out.set(u, v, (acc / (n * n) as f64).round().clamp(0.0, 255.0) as u8);
        }
    }
    out
}
