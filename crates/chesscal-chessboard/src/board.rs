use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Planar checkerboard geometry, counted in *inner* corners.
///
/// `cols` is the number of inner corners along a board row (board `x`),
/// `rows` the number along a board column (board `y`). The default is the
/// 13 x 9 board used by the demo image set.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardSpec {
    pub cols: u32,
    pub rows: u32,
    /// Distance between adjacent inner corners in world units.
    #[serde(default = "default_square_size")]
    pub square_size: f64,
}

fn default_square_size() -> f64 {
    1.0
}

impl Default for BoardSpec {
    fn default() -> Self {
        Self {
            cols: 13,
            rows: 9,
            square_size: default_square_size(),
        }
    }
}

impl BoardSpec {
    pub fn new(cols: u32, rows: u32) -> Self {
        Self {
            cols,
            rows,
            square_size: default_square_size(),
        }
    }

    pub fn corner_count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    /// World-point template: one `z = 0` point per inner corner, row-major
    /// (x varies fastest). Detected corners are returned in the same order.
    pub fn world_points(&self) -> Vec<Point3<f64>> {
        let s = self.square_size;
        (0..self.rows)
            .flat_map(|y| (0..self.cols).map(move |x| Point3::new(x as f64 * s, y as f64 * s, 0.0)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_template_covers_full_grid() {
        let board = BoardSpec::default();
        let pts = board.world_points();
        assert_eq!(pts.len(), 13 * 9);
        assert!(pts.iter().all(|p| p.z == 0.0));

        let max_x = pts.iter().map(|p| p.x).fold(f64::MIN, f64::max);
        let max_y = pts.iter().map(|p| p.y).fold(f64::MIN, f64::max);
        let min_x = pts.iter().map(|p| p.x).fold(f64::MAX, f64::min);
        let min_y = pts.iter().map(|p| p.y).fold(f64::MAX, f64::min);
        assert_eq!((min_x, max_x), (0.0, 12.0));
        assert_eq!((min_y, max_y), (0.0, 8.0));
    }

    #[test]
    fn world_template_is_row_major_with_unit_spacing() {
        let pts = BoardSpec::new(4, 3).world_points();
        assert_eq!(pts[0], Point3::new(0.0, 0.0, 0.0));
        assert_eq!(pts[1], Point3::new(1.0, 0.0, 0.0));
        assert_eq!(pts[3], Point3::new(3.0, 0.0, 0.0));
        assert_eq!(pts[4], Point3::new(0.0, 1.0, 0.0));
        assert_eq!(pts[11], Point3::new(3.0, 2.0, 0.0));
        for w in pts.windows(2) {
            let step = (w[1] - w[0]).norm();
            assert!(step == 1.0 || w[1].x == 0.0);
        }
    }

    #[test]
    fn square_size_defaults_when_missing_from_json() {
        let board: BoardSpec = serde_json::from_str(r#"{"cols": 7, "rows": 5}"#).unwrap();
        assert_eq!(board, BoardSpec::new(7, 5));
    }
}
