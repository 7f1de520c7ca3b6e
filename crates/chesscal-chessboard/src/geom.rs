use nalgebra::Vector2;
use std::f32::consts::PI;

/// Compute the absolute difference between two angles (radians),
/// normalized into `[0, π]`.
pub fn angle_diff_abs(a: f32, b: f32) -> f32 {
    let two_pi = 2.0 * PI;
    // Normalize angle difference to [-π, π).
    let mut diff = (b - a).rem_euclid(two_pi);
    if diff >= PI {
        diff -= two_pi;
    }
    diff.abs()
}

/// Angle between an undirected axis `axis_angle` (defined modulo π) and a
/// directed vector angle `vec_angle`, in `[0, π/2]`.
pub fn axis_vec_diff(axis_angle: f32, vec_angle: f32) -> f32 {
    let diff_abs = angle_diff_abs(axis_angle, vec_angle);
    diff_abs.min(PI - diff_abs)
}

/// Check whether two undirected axes (radians, modulo π) are approximately
/// orthogonal within `tolerance`.
pub fn is_orthogonal(reference_angle: f32, other_angle: f32, tolerance: f32) -> bool {
    let diff = axis_vec_diff(reference_angle, other_angle);
    (std::f32::consts::FRAC_PI_2 - diff).abs() <= tolerance.abs()
}

/// Dominant pair of orthogonal axes among undirected edge vectors.
///
/// Angles are folded with `4θ`, so edges along either lattice axis vote for
/// the same value. Returns the axis angle in `(-π/4, π/4]`, or `None` when
/// the votes cancel out.
pub fn dominant_axis<I>(edges: I) -> Option<f32>
where
    I: IntoIterator<Item = Vector2<f32>>,
{
    let (mut sx, mut sy) = (0.0f32, 0.0f32);
    for v in edges {
        let norm = v.norm();
        if norm <= f32::EPSILON {
            continue;
        }
        let a = 4.0 * v.y.atan2(v.x);
        sx += a.cos();
        sy += a.sin();
    }
    if sx.hypot(sy) <= 1e-6 {
        return None;
    }
    Some(sy.atan2(sx) / 4.0)
}

/// Express `v` in a frame rotated by `axis` radians.
pub fn to_axis_frame(v: &Vector2<f32>, axis: f32) -> Vector2<f32> {
    let (s, c) = axis.sin_cos();
    Vector2::new(c * v.x + s * v.y, -s * v.x + c * v.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

    #[test]
    fn orthogonality_is_modulo_pi() {
        let tol = 1e-3;
        assert!(is_orthogonal(0.0, FRAC_PI_2, tol));
        assert!(is_orthogonal(FRAC_PI_4, 3.0 * FRAC_PI_4, tol));
        // 3π/4 and -π/4 describe the same axis.
        assert!(is_orthogonal(FRAC_PI_4, -FRAC_PI_4 + PI, tol));
        assert!(!is_orthogonal(0.0, 0.25, 0.05));
        assert!(!is_orthogonal(0.0, PI, 0.05));
    }

    #[test]
    fn axis_difference_ignores_direction() {
        assert!((axis_vec_diff(0.0, PI) - 0.0).abs() < 1e-6);
        assert!((axis_vec_diff(FRAC_PI_4, -3.0 * FRAC_PI_4)).abs() < 1e-6);
        assert!((axis_vec_diff(FRAC_PI_4, 0.0) - FRAC_PI_4).abs() < 1e-6);
    }

    #[test]
    fn dominant_axis_folds_both_lattice_directions() {
        let axis = 0.3f32;
        let edges = [0.0, FRAC_PI_2, PI, -FRAC_PI_2]
            .iter()
            .map(|a| Vector2::new((axis + a).cos(), (axis + a).sin()) * 12.0);
        assert!((dominant_axis(edges).unwrap() - axis).abs() < 1e-5);

        // A lattice at 45° sits on the fold boundary; either sign is the same axis pair.
        let edges = [FRAC_PI_4, 3.0 * FRAC_PI_4].iter().map(|a| Vector2::new(a.cos(), a.sin()));
        assert!((dominant_axis(edges).unwrap().abs() - FRAC_PI_4).abs() < 1e-5);

        let cancelling = [Vector2::new(1.0, 0.0), Vector2::new(1.0, 1.0)];
        assert!(dominant_axis(cancelling).is_none());
        assert!(dominant_axis(std::iter::empty()).is_none());
    }

    #[test]
    fn axis_frame_rotates_vectors_back() {
        let v = to_axis_frame(&Vector2::new(0.0, 2.0), FRAC_PI_2);
        assert!((v.x - 2.0).abs() < 1e-6 && v.y.abs() < 1e-6);
    }
}
