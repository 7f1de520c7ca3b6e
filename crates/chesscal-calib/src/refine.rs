//! Joint Levenberg-Marquardt refinement of intrinsics, distortion and poses.
//!
//! Parameter layout: `[fx, fy, cx, cy, k1, k2, p1, p2, k3]` followed by
//! `[rx, ry, rz, tx, ty, tz]` per view (axis-angle rotation, translation).

use crate::{Correspondences, SolverOptions};
use chesscal_core::{project_point, CameraMatrix, Distortion};
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn, Rotation3, Vector3};

pub(crate) const CAMERA_PARAMS: usize = 9;
const POSE_PARAMS: usize = 6;

// Residual assigned to a point that ends up behind the camera.
const BEHIND_CAMERA_RESIDUAL: f64 = 1e6;

pub(crate) struct Refined {
    pub camera: CameraMatrix,
    pub distortion: Distortion,
    pub rvecs: Vec<Vector3<f64>>,
    pub tvecs: Vec<Vector3<f64>>,
    pub evaluations: usize,
    pub objective: f64,
    pub converged: bool,
}

struct ReprojectionProblem<'a> {
    correspondences: &'a Correspondences,
    /// First residual row of every view.
    offsets: Vec<usize>,
    residual_count: usize,
    params: DVector<f64>,
}

fn unpack_camera(x: &DVector<f64>) -> (CameraMatrix, Distortion) {
    (
        CameraMatrix::new(x[0], x[1], x[2], x[3]),
        Distortion::from_coeffs([x[4], x[5], x[6], x[7], x[8]]),
    )
}

fn unpack_pose(x: &DVector<f64>, view: usize) -> (Rotation3<f64>, Vector3<f64>) {
    let o = CAMERA_PARAMS + POSE_PARAMS * view;
    (
        Rotation3::new(Vector3::new(x[o], x[o + 1], x[o + 2])),
        Vector3::new(x[o + 3], x[o + 4], x[o + 5]),
    )
}

fn numeric_step(value: f64) -> f64 {
    1e-6 * (1.0 + value.abs())
}

impl<'a> ReprojectionProblem<'a> {
    fn new(correspondences: &'a Correspondences, params: DVector<f64>) -> Self {
        let mut offsets = Vec::with_capacity(correspondences.len());
        let mut rows = 0;
        for (world, _) in correspondences.views() {
            offsets.push(rows);
            rows += 2 * world.len();
        }
        Self {
            correspondences,
            offsets,
            residual_count: rows,
            params,
        }
    }

    fn view_residuals(&self, x: &DVector<f64>, view: usize, out: &mut [f64]) {
        let (camera, distortion) = unpack_camera(x);
        let (rotation, translation) = unpack_pose(x, view);
        let world = &self.correspondences.world_points()[view];
        let image = &self.correspondences.image_points()[view];

        for (k, (pw, pi)) in world.iter().zip(image).enumerate() {
            match project_point(&camera, &distortion, &rotation, &translation, pw) {
                Some(p) => {
                    out[2 * k] = p.x - pi.x;
                    out[2 * k + 1] = p.y - pi.y;
                }
                None => {
                    out[2 * k] = BEHIND_CAMERA_RESIDUAL;
                    out[2 * k + 1] = BEHIND_CAMERA_RESIDUAL;
                }
            }
        }
    }

    fn all_residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        let mut r = DVector::zeros(self.residual_count);
        for view in 0..self.offsets.len() {
            let (start, end) = self.view_rows(view);
            self.view_residuals(x, view, &mut r.as_mut_slice()[start..end]);
        }
        r
    }

    fn view_rows(&self, view: usize) -> (usize, usize) {
        let start = self.offsets[view];
        let end = self
            .offsets
            .get(view + 1)
            .copied()
            .unwrap_or(self.residual_count);
        (start, end)
    }

    /// Central-difference Jacobian. Camera columns touch every row; pose
    /// columns only touch the rows of their own view.
    fn numeric_jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let mut jac = DMatrix::zeros(self.residual_count, x.len());
        let mut xp = x.clone();

        for j in 0..CAMERA_PARAMS {
            let h = numeric_step(x[j]);
            xp[j] = x[j] + h;
            let plus = self.all_residuals(&xp);
            xp[j] = x[j] - h;
            let minus = self.all_residuals(&xp);
            xp[j] = x[j];
            jac.set_column(j, &((plus - minus) / (2.0 * h)));
        }

        let mut plus = Vec::new();
        let mut minus = Vec::new();
        for view in 0..self.offsets.len() {
            let (start, end) = self.view_rows(view);
            plus.resize(end - start, 0.0);
            minus.resize(end - start, 0.0);
            for k in 0..POSE_PARAMS {
                let j = CAMERA_PARAMS + POSE_PARAMS * view + k;
                let h = numeric_step(x[j]);
                xp[j] = x[j] + h;
                self.view_residuals(&xp, view, &mut plus);
                xp[j] = x[j] - h;
                self.view_residuals(&xp, view, &mut minus);
                xp[j] = x[j];
                for (row, (p, m)) in plus.iter().zip(&minus).enumerate() {
                    jac[(start + row, j)] = (p - m) / (2.0 * h);
                }
            }
        }
        jac
    }
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for ReprojectionProblem<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        Some(self.all_residuals(&self.params))
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        Some(self.numeric_jacobian(&self.params))
    }
}

pub(crate) fn refine(
    correspondences: &Correspondences,
    camera: &CameraMatrix,
    distortion: &Distortion,
    poses: &[(Rotation3<f64>, Vector3<f64>)],
    options: &SolverOptions,
) -> Refined {
    let n = CAMERA_PARAMS + POSE_PARAMS * poses.len();
    let mut x0 = DVector::zeros(n);
    x0[0] = camera.fx;
    x0[1] = camera.fy;
    x0[2] = camera.cx;
    x0[3] = camera.cy;
    for (k, c) in distortion.coeffs().iter().enumerate() {
        x0[4 + k] = *c;
    }
    for (view, (rotation, translation)) in poses.iter().enumerate() {
        let o = CAMERA_PARAMS + POSE_PARAMS * view;
        let r = rotation.scaled_axis();
        for k in 0..3 {
            x0[o + k] = r[k];
            x0[o + 3 + k] = translation[k];
        }
    }

    let lm = LevenbergMarquardt::new()
        .with_ftol(options.ftol)
        .with_xtol(options.xtol)
        .with_gtol(options.gtol)
        .with_patience(options.max_iters.max(1));

    let (problem, report) = lm.minimize(ReprojectionProblem::new(correspondences, x0));
    let x = problem.params();

    let (camera, distortion) = unpack_camera(&x);
    let (rvecs, tvecs) = (0..poses.len())
        .map(|view| {
            let o = CAMERA_PARAMS + POSE_PARAMS * view;
            (
                Vector3::new(x[o], x[o + 1], x[o + 2]),
                Vector3::new(x[o + 3], x[o + 4], x[o + 5]),
            )
        })
        .unzip();

    Refined {
        camera,
        distortion,
        rvecs,
        tvecs,
        evaluations: report.number_of_evaluations,
        objective: report.objective_function,
        converged: report.termination.was_successful(),
    }
}
