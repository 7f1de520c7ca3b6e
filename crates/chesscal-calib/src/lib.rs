//! Planar camera calibration.
//!
//! Pipeline:
//! 1. one homography per view from the board plane to the image,
//! 2. focal lengths from the vanishing-point constraints of all views, with
//!    the principal point at the image center,
//! 3. per-view pose from `K⁻¹ H`,
//! 4. joint Levenberg-Marquardt refinement of intrinsics, Brown-Conrady
//!    distortion `[k1, k2, p1, p2, k3]` and all poses.
//!
//! [`optimal_new_camera_matrix`] and [`UndistortMap`] then remove the lens
//! distortion from images taken with the calibrated camera.

mod calibrate;
mod correspondences;
mod error;
pub mod init;
mod refine;
mod undistort;

pub use calibrate::{calibrate_camera, reprojection_errors, CalibrationResult, SolverOptions};
pub use correspondences::Correspondences;
pub use error::CalibError;
pub use undistort::{optimal_new_camera_matrix, undistort_image, Roi, UndistortMap};
