use crate::geom::{angle_diff_abs, axis_vec_diff, dominant_axis, is_orthogonal, to_axis_frame};
use crate::params::GridGraphParams;
use chesscal_core::{Corner, GridCoords};
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NeighborDirection {
    Right,
    Left,
    Up,
    Down,
}

impl NeighborDirection {
    pub fn opposite(self) -> Self {
        match self {
            NeighborDirection::Right => NeighborDirection::Left,
            NeighborDirection::Left => NeighborDirection::Right,
            NeighborDirection::Up => NeighborDirection::Down,
            NeighborDirection::Down => NeighborDirection::Up,
        }
    }

    /// Grid step `(di, dj)`; `i` grows to the right, `j` grows downwards.
    pub fn step(self) -> (i32, i32) {
        match self {
            NeighborDirection::Right => (1, 0),
            NeighborDirection::Left => (-1, 0),
            NeighborDirection::Up => (0, -1),
            NeighborDirection::Down => (0, 1),
        }
    }

    fn slot(self) -> usize {
        match self {
            NeighborDirection::Right => 0,
            NeighborDirection::Left => 1,
            NeighborDirection::Up => 2,
            NeighborDirection::Down => 3,
        }
    }
}

/// How candidate edges are validated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeighborMode {
    /// Use ChESS diagonals: orthogonal orientations, edge at 45° to both.
    Orientation,
    /// Ignore orientations; accept edges close to the local nearest spacing.
    Geometric,
}

#[derive(Clone, Debug)]
pub struct NodeNeighbor {
    pub direction: NeighborDirection,
    pub index: usize,
    pub distance: f32,
    pub score: f32,
}

/// Direction of an edge relative to the lattice axis `axis` (radians).
fn lattice_direction(vec_to_neighbor: &Vector2<f32>, axis: f32) -> NeighborDirection {
    let v = to_axis_frame(vec_to_neighbor, axis);
    if v.x.abs() > v.y.abs() {
        if v.x >= 0.0 {
            NeighborDirection::Right
        } else {
            NeighborDirection::Left
        }
    } else if v.y >= 0.0 {
        NeighborDirection::Down
    } else {
        NeighborDirection::Up
    }
}

fn orientation_neighbor(
    corner: &Corner,
    neighbor: &Corner,
    vec_to_neighbor: &Vector2<f32>,
    params: &GridGraphParams,
) -> Option<f32> {
    let tol = params.orientation_tolerance_deg.to_radians();

    // 1. Adjacent X-junctions have orthogonal diagonals.
    if !is_orthogonal(corner.orientation, neighbor.orientation, tol) {
        return None;
    }

    // 2. Corner orientation is the diagonal along the white squares, i.e.
    // rotated 45° from the grid directions. The edge must sit at ~45° to
    // *each* corner orientation.
    let edge_angle = vec_to_neighbor.y.atan2(vec_to_neighbor.x);
    let expected = std::f32::consts::FRAC_PI_4;
    let score_corner = (axis_vec_diff(corner.orientation, edge_angle) - expected).abs();
    let score_neighbor = (axis_vec_diff(neighbor.orientation, edge_angle) - expected).abs();
    if score_corner > tol || score_neighbor > tol {
        return None;
    }

    let score_orientation = (std::f32::consts::FRAC_PI_2
        - angle_diff_abs(corner.orientation, neighbor.orientation))
    .abs();
    Some(score_corner + score_neighbor + score_orientation)
}

fn geometric_neighbor(distance: f32, nearest: f32, params: &GridGraphParams) -> Option<f32> {
    if distance > params.max_spacing_ratio * nearest {
        return None;
    }
    Some(distance / nearest - 1.0)
}

/// Keep at most one neighbor per direction, choosing the lowest-score candidate.
fn select_neighbors(candidates: Vec<NodeNeighbor>) -> Vec<NodeNeighbor> {
    let mut best: [Option<NodeNeighbor>; 4] = [None, None, None, None];

    for candidate in candidates {
        let slot = &mut best[candidate.direction.slot()];
        let replace = match slot {
            None => true,
            Some(current) => {
                candidate.score < current.score
                    || (candidate.score == current.score && candidate.distance < current.distance)
            }
        };
        if replace {
            *slot = Some(candidate);
        }
    }

    best.into_iter().flatten().collect()
}

/// Accepted edge before its lattice direction is known.
struct Candidate {
    index: usize,
    vec: Vector2<f32>,
    distance: f32,
    score: f32,
}

/// 4-connected neighborhood graph over corner candidates.
pub struct GridGraph {
    /// For each node, its accepted neighbors (at most one per direction).
    pub neighbors: Vec<Vec<NodeNeighbor>>,
    /// Image angle (radians, in `(-π/4, π/4]`) of the lattice axis that
    /// [`NeighborDirection::Right`] follows.
    pub axis: f32,
}

impl GridGraph {
    pub fn new(corners: &[Corner], params: &GridGraphParams, mode: NeighborMode) -> Self {
        if corners.is_empty() {
            return Self {
                neighbors: Vec::new(),
                axis: 0.0,
            };
        }

        let coords = corners
            .iter()
            .map(|c| [c.position.x, c.position.y])
            .collect::<Vec<_>>();
        let tree: KdTree<f32, 2> = (&coords).into();
        let k = params.k_neighbors.max(2);
        let mut candidates = Vec::with_capacity(corners.len());

        for (i, corner) in corners.iter().enumerate() {
            let results = tree.nearest_n::<SquaredEuclidean>(&coords[i], k);
            let nearest = results
                .iter()
                .filter(|nn| nn.item as usize != i && nn.distance > 0.0)
                .map(|nn| nn.distance.sqrt())
                .fold(f32::INFINITY, f32::min);

            let mut accepted = Vec::new();
            for nn in results {
                let neighbor_index = nn.item as usize;
                if neighbor_index == i {
                    continue;
                }

                let neighbor = &corners[neighbor_index];
                let vec_to_neighbor = neighbor.as_vec2() - corner.as_vec2();
                let distance = vec_to_neighbor.norm();
                if distance < params.min_spacing_pix || distance > params.max_spacing_pix {
                    continue;
                }

                let score = match mode {
                    NeighborMode::Orientation => {
                        orientation_neighbor(corner, neighbor, &vec_to_neighbor, params)
                    }
                    NeighborMode::Geometric => geometric_neighbor(distance, nearest, params),
                };
                if let Some(score) = score {
                    accepted.push(Candidate {
                        index: neighbor_index,
                        vec: vec_to_neighbor,
                        distance,
                        score,
                    });
                }
            }
            candidates.push(accepted);
        }

        // Directions follow the lattice, not the image axes, so a board
        // turned by 45° still gets one neighbor per direction.
        let axis = dominant_axis(candidates.iter().flatten().map(|c| c.vec)).unwrap_or(0.0);

        let neighbors = candidates
            .into_iter()
            .map(|accepted| {
                select_neighbors(
                    accepted
                        .into_iter()
                        .map(|c| NodeNeighbor {
                            direction: lattice_direction(&c.vec, axis),
                            index: c.index,
                            distance: c.distance,
                            score: c.score,
                        })
                        .collect(),
                )
            })
            .collect();

        let mut graph = Self { neighbors, axis };
        graph.keep_reciprocal_edges();
        graph
    }

    /// Drop edges that the other endpoint does not confirm in the opposite direction.
    fn keep_reciprocal_edges(&mut self) {
        let snapshot: Vec<Vec<(NeighborDirection, usize)>> = self
            .neighbors
            .iter()
            .map(|list| list.iter().map(|n| (n.direction, n.index)).collect())
            .collect();

        for (i, list) in self.neighbors.iter_mut().enumerate() {
            list.retain(|n| {
                snapshot[n.index]
                    .iter()
                    .any(|&(dir, j)| j == i && dir == n.direction.opposite())
            });
        }
    }

    pub fn connected_components(&self) -> Vec<Vec<usize>> {
        let mut visited = vec![false; self.neighbors.len()];
        let mut components = Vec::new();

        for start in 0..self.neighbors.len() {
            if visited[start] {
                continue;
            }

            let mut component = Vec::new();
            let mut stack = vec![start];

            while let Some(node) = stack.pop() {
                if visited[node] {
                    continue;
                }
                visited[node] = true;
                component.push(node);

                for neighbor in &self.neighbors[node] {
                    if !visited[neighbor.index] {
                        stack.push(neighbor.index);
                    }
                }
            }

            components.push(component);
        }

        components
    }

    /// BFS a component into integer grid cells, starting at `(0, 0)`.
    ///
    /// Returns `None` when the component is not a consistent lattice: a node
    /// reached with two different coordinates, or two nodes in the same cell.
    pub fn grid_coordinates(&self, component: &[usize]) -> Option<HashMap<GridCoords, usize>> {
        let start = *component.first()?;
        let mut node_cells: HashMap<usize, GridCoords> = HashMap::with_capacity(component.len());
        let mut cells: HashMap<GridCoords, usize> = HashMap::with_capacity(component.len());
        let mut queue = VecDeque::new();
        queue.push_back((start, GridCoords { i: 0, j: 0 }));

        while let Some((node, cell)) = queue.pop_front() {
            if let Some(existing) = node_cells.get(&node) {
                if *existing != cell {
                    return None;
                }
                continue;
            }
            if cells.insert(cell, node).is_some() {
                return None;
            }
            node_cells.insert(node, cell);

            for neighbor in &self.neighbors[node] {
                let (di, dj) = neighbor.direction.step();
                queue.push_back((
                    neighbor.index,
                    GridCoords {
                        i: cell.i + di,
                        j: cell.j + dj,
                    },
                ));
            }
        }

        Some(cells)
    }
}
