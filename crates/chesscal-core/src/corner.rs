use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Canonical 2D corner candidate consumed by the chessboard detector.
///
/// This is the thing you obtain by adapting the output of the ChESS crate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Corner {
    /// Corner position in pixel coordinates.
    pub position: Point2<f32>,

    /// Dominant diagonal orientation at the corner, in radians.
    ///
    /// Defined modulo π, because chessboard diagonals are undirected.
    /// Adjacent X-junctions on a board have orthogonal orientations.
    pub orientation: f32,

    /// Strength / response of the corner detector.
    pub strength: f32,
}

impl Corner {
    pub fn as_vec2(&self) -> Vector2<f32> {
        Vector2::new(self.position.x, self.position.y)
    }
}

/// Integer grid coordinates (i, j) in board space.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct GridCoords {
    pub i: i32,
    pub j: i32,
}
