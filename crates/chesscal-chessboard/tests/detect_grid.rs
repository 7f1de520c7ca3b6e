use chesscal_chessboard::{
    BoardSpec, ChessboardDetector, ChessboardParams, GridGraphParams, NeighborMode,
};
use chesscal_core::Corner;
use nalgebra::{Point2, Rotation2, Vector2};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

/// Corners of a `cols x rows` board rotated by `angle` and scaled by
/// `spacing`, in board row-major order.
fn similarity_grid(cols: usize, rows: usize, spacing: f32, angle: f32, origin: Vector2<f32>) -> Vec<Corner> {
    let rot = Rotation2::new(angle);
    let mut corners = Vec::new();
    for y in 0..rows {
        for x in 0..cols {
            let p = rot * Vector2::new(x as f32 * spacing, y as f32 * spacing) + origin;
            let base = if (x + y) % 2 == 0 { FRAC_PI_4 } else { 3.0 * FRAC_PI_4 };
            corners.push(Corner {
                position: Point2::from(p),
                orientation: base + angle,
                strength: 1.0,
            });
        }
    }
    corners
}

fn detector(cols: u32, rows: u32) -> ChessboardDetector {
    ChessboardDetector::new(
        BoardSpec::new(cols, rows),
        ChessboardParams::default(),
        GridGraphParams::default(),
    )
}

fn assert_same_order(found: &[Point2<f32>], expected: &[Corner]) {
    assert_eq!(found.len(), expected.len());
    for (f, e) in found.iter().zip(expected) {
        assert!((f - e.position).norm() < 1e-3, "{f:?} vs {:?}", e.position);
    }
}

#[test]
fn detects_tilted_board_in_row_major_order() {
    let truth = similarity_grid(6, 4, 30.0, 0.2, Vector2::new(100.0, 80.0));

    // Shuffle deterministically and add far-away clutter.
    let mut cloud: Vec<Corner> = truth.iter().rev().cloned().collect();
    for k in 0..5 {
        cloud.push(Corner {
            position: Point2::new(900.0 + 70.0 * k as f32, 700.0),
            orientation: 0.3,
            strength: 1.0,
        });
    }

    let detection = detector(6, 4).detect_from_corners(&cloud).expect("board");
    assert_eq!(detection.mode, NeighborMode::Orientation);
    assert_same_order(&detection.corners, &truth);
    assert_eq!(detection.grid.len(), 24);
    assert_eq!((detection.grid[7].i, detection.grid[7].j), (1, 1));
}

#[test]
fn quarter_turned_board_keeps_board_axes() {
    let truth = similarity_grid(6, 4, 25.0, FRAC_PI_2 + 0.1, Vector2::new(300.0, 60.0));
    let detection = detector(6, 4).detect_from_corners(&truth).expect("board");
    assert_same_order(&detection.corners, &truth);
}

#[test]
fn missing_corner_rejects_board() {
    let mut cloud = similarity_grid(6, 4, 30.0, 0.0, Vector2::new(50.0, 50.0));
    cloud.remove(9);
    assert!(detector(6, 4).detect_from_corners(&cloud).is_none());
}

#[test]
fn weak_corners_are_filtered_out() {
    let mut cloud = similarity_grid(5, 3, 20.0, 0.0, Vector2::new(40.0, 40.0));
    cloud[4].strength = 0.01;
    let mut det = detector(5, 3);
    det.params.min_strength = 0.5;
    assert!(det.detect_from_corners(&cloud).is_none());
    det.params.min_strength = 0.0;
    assert!(det.detect_from_corners(&cloud).is_some());
}

#[test]
fn geometric_fallback_handles_missing_orientations() {
    let mut cloud = similarity_grid(5, 4, 25.0, -0.15, Vector2::new(60.0, 90.0));
    let truth = cloud.clone();
    for c in &mut cloud {
        c.orientation = 0.0;
    }

    let detection = detector(5, 4).detect_from_corners(&cloud).expect("board");
    assert_eq!(detection.mode, NeighborMode::Geometric);
    assert_same_order(&detection.corners, &truth);

    let mut strict = detector(5, 4);
    strict.params.geometric_fallback = false;
    assert!(strict.detect_from_corners(&cloud).is_none());
}

#[test]
fn board_is_found_at_every_in_plane_rotation() {
    let (cols, rows, spacing) = (13usize, 9usize, 20.0f32);
    for step in 0..=18 {
        let angle = (step as f32 * 5.0).to_radians();
        let truth = similarity_grid(cols, rows, spacing, angle, Vector2::new(400.0, 300.0));
        let detection = detector(cols as u32, rows as u32)
            .detect_from_corners(&truth)
            .unwrap_or_else(|| panic!("board missed at {}°", step * 5));
        assert_eq!(detection.mode, NeighborMode::Orientation);
        assert_eq!(detection.corners.len(), cols * rows);

        // Every truth corner is reported once.
        for t in &truth {
            let hits = detection
                .corners
                .iter()
                .filter(|p| (*p - t.position).norm() < 1e-3)
                .count();
            assert_eq!(hits, 1);
        }
        // Consecutive entries are lattice neighbors along rows and columns.
        for y in 0..rows {
            for x in 0..cols {
                let k = y * cols + x;
                if x + 1 < cols {
                    let d = (detection.corners[k + 1] - detection.corners[k]).norm();
                    assert!((d - spacing).abs() < 1e-2, "row step {d} at {}°", step * 5);
                }
                if y + 1 < rows {
                    let d = (detection.corners[k + cols] - detection.corners[k]).norm();
                    assert!((d - spacing).abs() < 1e-2, "column step {d} at {}°", step * 5);
                }
            }
        }
    }
}

#[test]
fn perspective_board_near_diagonal_is_found() {
    // Keystone-distorted lattice turned by 39..51°.
    let (cols, rows) = (9usize, 6usize);
    for deg in 39..=51 {
        let angle = (deg as f32).to_radians();
        let rot = Rotation2::new(angle);
        let corners: Vec<Corner> = (0..rows)
            .flat_map(|y| (0..cols).map(move |x| (x, y)))
            .map(|(x, y)| {
                let scale = 1.0 + 0.04 * y as f32;
                let local = Vector2::new((x as f32 - 4.0) * 22.0 * scale, y as f32 * 22.0 * (1.0 + 0.02 * y as f32));
                let base = if (x + y) % 2 == 0 { FRAC_PI_4 } else { 3.0 * FRAC_PI_4 };
                Corner {
                    position: Point2::from(rot * local + Vector2::new(320.0, 240.0)),
                    orientation: base + angle,
                    strength: 1.0,
                }
            })
            .collect();
        let detection = detector(cols as u32, rows as u32).detect_from_corners(&corners);
        assert_eq!(detection.map(|d| d.corners.len()), Some(cols * rows), "at {deg}°");
    }
}
