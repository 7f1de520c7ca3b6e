//! Pinhole camera intrinsics and the Brown-Conrady lens model.

use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Fixed-point iterations used when inverting the distortion model.
pub const UNDISTORT_ITERATIONS: usize = 20;

/// Intrinsic camera matrix
///
/// ```text
/// | fx  skew cx |
/// | 0   fy   cy |
/// | 0   0    1  |
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraMatrix {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    #[serde(default)]
    pub skew: f64,
}

impl CameraMatrix {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            skew: 0.0,
        }
    }

    pub fn from_matrix(m: &Matrix3<f64>) -> Self {
        Self {
            fx: m[(0, 0)],
            fy: m[(1, 1)],
            cx: m[(0, 2)],
            cy: m[(1, 2)],
            skew: m[(0, 1)],
        }
    }

    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, self.skew, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    #[inline]
    pub fn pixel_from_normalized(&self, p: Point2<f64>) -> Point2<f64> {
        Point2::new(
            self.fx * p.x + self.skew * p.y + self.cx,
            self.fy * p.y + self.cy,
        )
    }

    #[inline]
    pub fn normalized_from_pixel(&self, p: Point2<f64>) -> Point2<f64> {
        let y = (p.y - self.cy) / self.fy;
        let x = (p.x - self.cx - self.skew * y) / self.fx;
        Point2::new(x, y)
    }

    pub fn is_finite(&self) -> bool {
        [self.fx, self.fy, self.cx, self.cy, self.skew]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Radial (`k1`, `k2`, `k3`) and tangential (`p1`, `p2`) distortion.
///
/// Coefficient order matches the conventional `[k1, k2, p1, p2, k3]` vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_coeffs(c: [f64; 5]) -> Self {
        Self {
            k1: c[0],
            k2: c[1],
            p1: c[2],
            p2: c[3],
            k3: c[4],
        }
    }

    pub fn coeffs(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs().iter().all(|c| *c == 0.0)
    }

    /// Map an ideal normalized point to its distorted normalized position.
    #[inline]
    pub fn distort(&self, p: Point2<f64>) -> Point2<f64> {
        let (x, y) = (p.x, p.y);
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
        let xy2 = 2.0 * x * y;
        Point2::new(
            x * radial + self.p1 * xy2 + self.p2 * (r2 + 2.0 * x * x),
            y * radial + self.p1 * (r2 + 2.0 * y * y) + self.p2 * xy2,
        )
    }

    /// Invert [`Distortion::distort`] by fixed-point iteration.
    ///
    /// Stops early once the update falls below `1e-12`.
    pub fn undistort(&self, p: Point2<f64>, iterations: usize) -> Point2<f64> {
        if self.is_zero() {
            return p;
        }
        let (x0, y0) = (p.x, p.y);
        let (mut x, mut y) = (x0, y0);
        for _ in 0..iterations {
            let r2 = x * x + y * y;
            let icdist = 1.0 / (1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3)));
            let dx = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
            let dy = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
            let nx = (x0 - dx) * icdist;
            let ny = (y0 - dy) * icdist;
            let step = (nx - x).abs() + (ny - y).abs();
            x = nx;
            y = ny;
            if step < 1e-12 {
                break;
            }
        }
        Point2::new(x, y)
    }
}

/// Project a world point through pose, lens and intrinsics.
///
/// Returns `None` when the point lies on or behind the camera plane.
#[inline]
pub fn project_point(
    camera: &CameraMatrix,
    distortion: &Distortion,
    rotation: &Rotation3<f64>,
    translation: &Vector3<f64>,
    world: &Point3<f64>,
) -> Option<Point2<f64>> {
    let pc = rotation * world.coords + translation;
    if pc.z <= 1e-12 {
        return None;
    }
    let ideal = Point2::new(pc.x / pc.z, pc.y / pc.z);
    Some(camera.pixel_from_normalized(distortion.distort(ideal)))
}
