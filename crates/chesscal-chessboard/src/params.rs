use serde::{Deserialize, Serialize};

/// Neighbor search parameters for the grid graph.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GridGraphParams {
    /// Minimal accepted distance between adjacent corners, in pixels.
    pub min_spacing_pix: f32,
    /// Maximal accepted distance between adjacent corners, in pixels.
    pub max_spacing_pix: f32,
    /// Number of nearest candidates inspected per corner (self included).
    pub k_neighbors: usize,
    /// Angular tolerance for the ChESS diagonal tests.
    pub orientation_tolerance_deg: f32,
    /// Geometric mode only: a neighbor may be at most this many times
    /// farther away than the corner's nearest candidate.
    pub max_spacing_ratio: f32,
}

impl Default for GridGraphParams {
    fn default() -> Self {
        Self {
            min_spacing_pix: 5.0,
            max_spacing_pix: 400.0,
            k_neighbors: 8,
            orientation_tolerance_deg: 22.5,
            max_spacing_ratio: 1.3,
        }
    }
}

/// Parameters specific to the chessboard detector.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ChessboardParams {
    /// Minimal corner strength to consider.
    pub min_strength: f32,

    /// Retry with orientation-free neighbor tests when the ChESS
    /// orientation pass does not produce a complete board.
    pub geometric_fallback: bool,
}

impl Default for ChessboardParams {
    fn default() -> Self {
        Self {
            min_strength: 0.0,
            geometric_fallback: true,
        }
    }
}
