//! Checkerboard detector built on top of `chesscal-core`.
//!
//! ## Quickstart
//!
//! ```
//! use chesscal_chessboard::{BoardSpec, ChessboardDetector, ChessboardParams, GridGraphParams};
//! use chesscal_core::Corner;
//!
//! let detector = ChessboardDetector::new(
//!     BoardSpec::default(),
//!     ChessboardParams::default(),
//!     GridGraphParams::default(),
//! );
//!
//! let corners: Vec<Corner> = Vec::new();
//! let result = detector.detect_from_corners(&corners);
//! assert!(result.is_none());
//! ```
//!
//! Algorithm (graph-based, perspective-tolerant):
//! 1. Filter weak ChESS corners.
//! 2. For each corner, query the k nearest candidates and keep at most one
//!    neighbor per image direction (right/left/up/down), based on:
//!    - distance within the configured spacing window,
//!    - ChESS diagonals: adjacent X-junctions have orthogonal diagonals and
//!      the connecting edge runs at ~45° to both.
//! 3. Keep only reciprocal edges and BFS each connected component into
//!    integer coordinates (i, j).
//! 4. Accept the component that contains exactly one fully populated
//!    `cols x rows` window (or its 90° rotation).
//! 5. If the orientation pass fails, retry with a purely geometric neighbor
//!    test (distance close to each corner's nearest spacing).
//!
//! Accepted corners are then refined with [`refine_corners`].

mod board;
mod detector;
mod geom;
mod gridgraph;
mod params;
mod subpix;

pub use board::BoardSpec;
pub use detector::{ChessboardDetection, ChessboardDetector};
pub use gridgraph::{GridGraph, NeighborDirection, NeighborMode, NodeNeighbor};
pub use params::{ChessboardParams, GridGraphParams};
pub use subpix::{refine_corner, refine_corners, SubPixParams};
