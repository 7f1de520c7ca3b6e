use crate::board::BoardSpec;
use crate::gridgraph::{GridGraph, NeighborMode};
use crate::params::{ChessboardParams, GridGraphParams};
use chesscal_core::{Corner, GridCoords};
use log::{debug, info};
use nalgebra::Point2;
use std::collections::HashMap;

/// A complete board: one image point per inner corner.
#[derive(Clone, Debug)]
pub struct ChessboardDetection {
    /// Image positions in board row-major order, matching [`BoardSpec::world_points`].
    pub corners: Vec<Point2<f32>>,
    /// Board coordinates `(x, y)` of each entry in `corners`.
    pub grid: Vec<GridCoords>,
    /// Neighbor test that produced the detection.
    pub mode: NeighborMode,
}

/// Graph-based checkerboard detector working on ChESS corner clouds.
pub struct ChessboardDetector {
    pub board: BoardSpec,
    pub params: ChessboardParams,
    pub graph: GridGraphParams,
}

impl ChessboardDetector {
    pub fn new(board: BoardSpec, params: ChessboardParams, graph: GridGraphParams) -> Self {
        Self {
            board,
            params,
            graph,
        }
    }

    /// Find the full inner-corner grid in a cloud of ChESS corners.
    ///
    /// Returns `None` unless every one of the `cols x rows` corners is found
    /// and their arrangement is unambiguous.
    pub fn detect_from_corners(&self, corners: &[Corner]) -> Option<ChessboardDetection> {
        let strong: Vec<Corner> = corners
            .iter()
            .filter(|c| c.strength >= self.params.min_strength)
            .cloned()
            .collect();

        let needed = self.board.corner_count();
        debug!(
            "{} of {} corners pass the strength filter, board needs {}",
            strong.len(),
            corners.len(),
            needed
        );
        if needed == 0 || strong.len() < needed {
            return None;
        }

        if let Some(detection) = self.detect_with_mode(&strong, NeighborMode::Orientation) {
            return Some(detection);
        }
        if self.params.geometric_fallback {
            debug!("orientation pass found no board, retrying with geometric neighbors");
            return self.detect_with_mode(&strong, NeighborMode::Geometric);
        }
        None
    }

    fn detect_with_mode(&self, corners: &[Corner], mode: NeighborMode) -> Option<ChessboardDetection> {
        let graph = GridGraph::new(corners, &self.graph, mode);
        let needed = self.board.corner_count();

        let mut components = graph.connected_components();
        components.sort_by_key(|c| std::cmp::Reverse(c.len()));

        for component in components.iter().take_while(|c| c.len() >= needed) {
            let Some(cells) = graph.grid_coordinates(component) else {
                debug!("component of {} corners is not a consistent lattice", component.len());
                continue;
            };
            let Some(order) = find_board_window(&cells, self.board.cols, self.board.rows) else {
                continue;
            };

            info!(
                "chessboard {}x{} found ({:?} neighbors, component of {})",
                self.board.cols,
                self.board.rows,
                mode,
                component.len()
            );
            let grid = (0..self.board.rows as i32)
                .flat_map(|j| (0..self.board.cols as i32).map(move |i| GridCoords { i, j }))
                .collect();
            return Some(ChessboardDetection {
                corners: order.iter().map(|&idx| corners[idx].position).collect(),
                grid,
                mode,
            });
        }
        None
    }
}

/// Locate the single fully populated `cols x rows` window (or its 90°
/// rotation) in a labelled lattice and return node indices in board order.
fn find_board_window(cells: &HashMap<GridCoords, usize>, cols: u32, rows: u32) -> Option<Vec<usize>> {
    let min_i = cells.keys().map(|c| c.i).min()?;
    let max_i = cells.keys().map(|c| c.i).max()?;
    let min_j = cells.keys().map(|c| c.j).min()?;
    let max_j = cells.keys().map(|c| c.j).max()?;
    let (cols, rows) = (cols as i32, rows as i32);

    let layouts: &[bool] = if cols == rows { &[false] } else { &[false, true] };
    let mut found = None;
    let mut matches = 0usize;

    for &rotated in layouts {
        let (w, h) = if rotated { (rows, cols) } else { (cols, rows) };
        for oj in min_j..=max_j - h + 1 {
            for oi in min_i..=max_i - w + 1 {
                if let Some(order) = collect_window(cells, oi, oj, cols, rows, rotated) {
                    matches += 1;
                    found = Some(order);
                }
            }
        }
    }

    if matches > 1 {
        debug!("{matches} candidate board windows, detection is ambiguous");
        return None;
    }
    found
}

fn collect_window(
    cells: &HashMap<GridCoords, usize>,
    oi: i32,
    oj: i32,
    cols: i32,
    rows: i32,
    rotated: bool,
) -> Option<Vec<usize>> {
    let mut order = Vec::with_capacity((cols * rows) as usize);
    for y in 0..rows {
        for x in 0..cols {
            // The rotated layout maps board x onto image rows, keeping handedness.
            let cell = if rotated {
                GridCoords {
                    i: oi + (rows - 1 - y),
                    j: oj + x,
                }
            } else {
                GridCoords { i: oi + x, j: oj + y }
            };
            order.push(*cells.get(&cell)?);
        }
    }
    Some(order)
}
