use crate::init::{init_intrinsics, pose_from_homography, view_homographies};
use crate::refine::refine;
use crate::{CalibError, Correspondences};
use chesscal_core::{project_point, CameraMatrix, Distortion};
use log::{debug, info, warn};
use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Stopping criteria for the Levenberg-Marquardt refinement.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Evaluation budget, in multiples of `parameters + 1`.
    pub max_iters: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iters: 100,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-12,
        }
    }
}

/// Intrinsics, distortion and per-view extrinsics of a calibrated camera.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    /// RMS reprojection error over all points, in pixels.
    pub rms_error: f64,
    pub camera_matrix: CameraMatrix,
    pub distortion: Distortion,
    /// Axis-angle rotation of every view (board to camera).
    pub rvecs: Vec<Vector3<f64>>,
    pub tvecs: Vec<Vector3<f64>>,
    /// RMS reprojection error of each view; empty when loaded from an archive.
    #[serde(default)]
    pub per_view_errors: Vec<f64>,
}

impl CalibrationResult {
    pub fn view_count(&self) -> usize {
        self.rvecs.len()
    }

    pub fn pose(&self, view: usize) -> Option<(Rotation3<f64>, Vector3<f64>)> {
        let r = self.rvecs.get(view)?;
        let t = self.tvecs.get(view)?;
        Some((Rotation3::new(*r), *t))
    }
}

/// RMS error over all points and per view, or `None` if a point projects
/// behind the camera.
pub fn reprojection_errors(
    correspondences: &Correspondences,
    camera: &CameraMatrix,
    distortion: &Distortion,
    rvecs: &[Vector3<f64>],
    tvecs: &[Vector3<f64>],
) -> Option<(f64, Vec<f64>)> {
    let mut total_sq = 0.0;
    let mut total_points = 0usize;
    let mut per_view = Vec::with_capacity(correspondences.len());

    for ((world, image), (r, t)) in correspondences.views().zip(rvecs.iter().zip(tvecs)) {
        let rotation = Rotation3::new(*r);
        let mut sq = 0.0;
        for (pw, pi) in world.iter().zip(image) {
            let p = project_point(camera, distortion, &rotation, t, pw)?;
            sq += (p - *pi).norm_squared();
        }
        per_view.push(if world.is_empty() {
            0.0
        } else {
            (sq / world.len() as f64).sqrt()
        });
        total_sq += sq;
        total_points += world.len();
    }

    if total_points == 0 {
        return None;
    }
    Some(((total_sq / total_points as f64).sqrt(), per_view))
}

/// Calibrate a pinhole camera with Brown-Conrady distortion from planar views.
///
/// `image_size` is `(width, height)` in pixels. The initial guess comes from
/// the view homographies; all parameters are then refined jointly.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "info", skip_all, fields(views = correspondences.len()))
)]
pub fn calibrate_camera(
    correspondences: &Correspondences,
    image_size: (u32, u32),
    options: &SolverOptions,
) -> Result<CalibrationResult, CalibError> {
    if correspondences.is_empty() || correspondences.total_points() == 0 {
        return Err(CalibError::NoCorrespondences);
    }

    let homographies = view_homographies(correspondences)?;
    let initial = init_intrinsics(&homographies, image_size)?;
    let poses = homographies
        .iter()
        .map(|h| pose_from_homography(&initial, h))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(
        "initial intrinsics fx={:.2} fy={:.2} cx={:.2} cy={:.2}",
        initial.fx, initial.fy, initial.cx, initial.cy
    );

    let refined = refine(correspondences, &initial, &Distortion::none(), &poses, options);
    debug!(
        "LM finished after {} evaluations, objective {:.6e}",
        refined.evaluations, refined.objective
    );
    if !refined.converged {
        warn!("LM refinement stopped before convergence, keeping the last estimate");
    }

    let camera = refined.camera;
    let distortion = refined.distortion;
    let finite = camera.is_finite()
        && distortion.coeffs().iter().all(|c| c.is_finite())
        && refined
            .rvecs
            .iter()
            .chain(&refined.tvecs)
            .all(|v| v.iter().all(|c| c.is_finite()));
    if !finite || camera.fx <= 0.0 || camera.fy <= 0.0 {
        return Err(CalibError::SolverDiverged);
    }

    let (rms_error, per_view_errors) = reprojection_errors(
        correspondences,
        &camera,
        &distortion,
        &refined.rvecs,
        &refined.tvecs,
    )
    .ok_or(CalibError::SolverDiverged)?;

    info!(
        "calibrated from {} views ({} points), RMS reprojection error {:.4} px",
        correspondences.len(),
        correspondences.total_points(),
        rms_error
    );

    Ok(CalibrationResult {
        rms_error,
        camera_matrix: camera,
        distortion,
        rvecs: refined.rvecs,
        tvecs: refined.tvecs,
        per_view_errors,
    })
}
