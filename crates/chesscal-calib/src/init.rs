//! Closed-form initial guesses for the nonlinear refinement.

use crate::{CalibError, Correspondences};
use chesscal_core::{estimate_homography, CameraMatrix, Homography};
use nalgebra::{DMatrix, DVector, Matrix3, Point2, Rotation3, Vector3};

/// Board-plane to image homography for every view.
pub fn view_homographies(correspondences: &Correspondences) -> Result<Vec<Homography>, CalibError> {
    correspondences
        .views()
        .enumerate()
        .map(|(view, (world, image))| {
            if world.len() < 4 {
                return Err(CalibError::TooFewPoints {
                    view,
                    count: world.len(),
                });
            }
            let plane: Vec<Point2<f64>> = world.iter().map(|p| Point2::new(p.x, p.y)).collect();
            estimate_homography(&plane, image)
                .ok_or(CalibError::DegenerateConfiguration("view homography"))
        })
        .collect()
}

/// Focal lengths from the vanishing-point constraints of all views, with the
/// principal point fixed at the image center.
///
/// With the center shifted to the origin, the columns `h`, `v` of every
/// homography and their diagonals `(h ± v) / 2` are images of orthogonal
/// directions, so `x0 y0 / fx² + x1 y1 / fy² + x2 y2 = 0` for each pair.
pub fn init_intrinsics(homographies: &[Homography], image_size: (u32, u32)) -> Result<CameraMatrix, CalibError> {
    if homographies.is_empty() {
        return Err(CalibError::NoCorrespondences);
    }
    let (width, height) = image_size;
    if width == 0 || height == 0 {
        return Err(CalibError::InvalidImageSize { width, height });
    }
    let cx = (width as f64 - 1.0) * 0.5;
    let cy = (height as f64 - 1.0) * 0.5;
    let shift = Matrix3::new(
        1.0, 0.0, -cx, //
        0.0, 1.0, -cy, //
        0.0, 0.0, 1.0,
    );

    let n = homographies.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 2);
    let mut b = DVector::<f64>::zeros(2 * n);
    for (k, hom) in homographies.iter().enumerate() {
        let m = shift * hom.h;
        let h = m.column(0).normalize();
        let v = m.column(1).normalize();
        let d1 = ((m.column(0) + m.column(1)) * 0.5).normalize();
        let d2 = ((m.column(0) - m.column(1)) * 0.5).normalize();

        a[(2 * k, 0)] = h[0] * v[0];
        a[(2 * k, 1)] = h[1] * v[1];
        b[2 * k] = -h[2] * v[2];
        a[(2 * k + 1, 0)] = d1[0] * d2[0];
        a[(2 * k + 1, 1)] = d1[1] * d2[1];
        b[2 * k + 1] = -d1[2] * d2[2];
    }

    let f = a
        .svd(true, true)
        .solve(&b, 1e-12)
        .map_err(|_| CalibError::DegenerateConfiguration("focal length system"))?;
    if !f.iter().all(|x| x.is_finite() && x.abs() > f64::EPSILON) {
        return Err(CalibError::DegenerateConfiguration("focal length system"));
    }

    let camera = CameraMatrix::new((1.0 / f[0]).abs().sqrt(), (1.0 / f[1]).abs().sqrt(), cx, cy);
    if !camera.is_finite() {
        return Err(CalibError::DegenerateConfiguration("focal length system"));
    }
    Ok(camera)
}

/// Board pose from `K⁻¹ H`, orthonormalised and placed in front of the camera.
pub fn pose_from_homography(
    camera: &CameraMatrix,
    homography: &Homography,
) -> Result<(Rotation3<f64>, Vector3<f64>), CalibError> {
    let k_inv = camera
        .matrix()
        .try_inverse()
        .ok_or(CalibError::DegenerateConfiguration("singular camera matrix"))?;
    let m = k_inv * homography.h;
    let h1: Vector3<f64> = m.column(0).into_owned();
    let h2: Vector3<f64> = m.column(1).into_owned();
    let h3: Vector3<f64> = m.column(2).into_owned();

    let norm = 0.5 * (h1.norm() + h2.norm());
    if norm <= 1e-18 {
        return Err(CalibError::DegenerateConfiguration("homography scale"));
    }
    let mut scale = 1.0 / norm;
    if h3.z * scale < 0.0 {
        scale = -scale;
    }

    let r1 = h1 * scale;
    let r2 = h2 * scale;
    let t = h3 * scale;
    let r = Matrix3::from_columns(&[r1, r2, r1.cross(&r2)]);

    let svd = r.svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Err(CalibError::DegenerateConfiguration("rotation SVD"));
    };
    let mut rot = u * v_t;
    if rot.determinant() < 0.0 {
        rot = -rot;
    }
    Ok((Rotation3::from_matrix_unchecked(rot), t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chesscal_core::synthetic::{project_board, BoardPose, SyntheticBoard};
    use chesscal_core::Distortion;

    fn board() -> SyntheticBoard {
        SyntheticBoard {
            cols: 8,
            rows: 6,
            square_size: 1.0,
        }
    }

    fn views(camera: &CameraMatrix, poses: &[BoardPose]) -> Correspondences {
        let board = board();
        let mut set = Correspondences::new();
        for pose in poses {
            let image = project_board(&board, camera, &Distortion::none(), pose)
                .into_iter()
                .collect::<Option<Vec<_>>>()
                .unwrap();
            set.push(board.corners(), image).unwrap();
        }
        set
    }

    #[test]
    fn pose_is_recovered_from_exact_homography() {
        let camera = CameraMatrix::new(700.0, 700.0, 319.5, 239.5);
        let pose = BoardPose::facing(board().center(), 15.0, 0.3, -0.2, 0.1);
        let set = views(&camera, &[pose]);
        let homs = view_homographies(&set).unwrap();

        let (r, t) = pose_from_homography(&camera, &homs[0]).unwrap();
        assert_relative_eq!(r, pose.rotation, epsilon = 1e-6);
        assert_relative_eq!(t, pose.translation, epsilon = 1e-5);
    }

    #[test]
    fn focal_lengths_from_tilted_views() {
        let camera = CameraMatrix::new(820.0, 800.0, 319.5, 239.5);
        let center = board().center();
        let poses = [
            BoardPose::facing(center, 14.0, 0.35, 0.0, 0.0),
            BoardPose::facing(center, 16.0, 0.0, 0.4, 0.1),
            BoardPose::facing(center, 15.0, -0.3, 0.25, -0.2),
        ];
        let set = views(&camera, &poses);
        let homs = view_homographies(&set).unwrap();
        let k = init_intrinsics(&homs, (640, 480)).unwrap();
        assert_relative_eq!(k.fx, 820.0, max_relative = 1e-4);
        assert_relative_eq!(k.fy, 800.0, max_relative = 1e-4);
        assert_eq!((k.cx, k.cy), (319.5, 239.5));
    }

    #[test]
    fn rejects_tiny_views_and_empty_input() {
        let mut set = Correspondences::new();
        set.push(board().corners()[..3].to_vec(), vec![Point2::origin(); 3])
            .unwrap();
        assert!(matches!(
            view_homographies(&set),
            Err(CalibError::TooFewPoints { view: 0, count: 3 })
        ));
        assert!(matches!(
            init_intrinsics(&[], (640, 480)),
            Err(CalibError::NoCorrespondences)
        ));
        let h = Homography::new(Matrix3::identity());
        assert!(matches!(
            init_intrinsics(&[h], (0, 480)),
            Err(CalibError::InvalidImageSize { .. })
        ));
    }
}
