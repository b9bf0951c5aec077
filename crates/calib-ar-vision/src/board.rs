//! Chessboard assembly: ChESS corners -> grid graph -> ordered inner corners.
//!
//! 1. Detect ChESS corners.
//! 2. Estimate the global grid axes from corner orientations (modulo π/2).
//! 3. Link each corner to its nearest valid neighbor in each grid direction,
//!    keeping only mutual links.
//! 4. BFS every connected component and assign integer coordinates.
//! 5. Accept a component that exactly fills a `columns x rows` box.
//! 6. Pick the non-mirrored ordering that starts top-left.

use crate::geom::dominant_quarter_axis;
use crate::gridgraph::GridGraph;
use crate::params::DetectorParams;
use crate::chess::{find_chess_corners, ChessCorner};
use calib_ar_core::{GrayImageView, PatternSpec};
use log::debug;
use nalgebra::{Point2, Vector2};
use std::f32::consts::FRAC_PI_4;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Dense grid of corner indices, `cells[j][i]`.
struct GridCells {
    width: usize,
    height: usize,
    cells: Vec<Vec<usize>>,
}

fn build_cells(coords: &[(usize, i32, i32)]) -> Option<GridCells> {
    let min_i = coords.iter().map(|c| c.1).min()?;
    let max_i = coords.iter().map(|c| c.1).max()?;
    let min_j = coords.iter().map(|c| c.2).min()?;
    let max_j = coords.iter().map(|c| c.2).max()?;
    let width = (max_i - min_i + 1) as usize;
    let height = (max_j - min_j + 1) as usize;
    if width * height != coords.len() {
        return None;
    }

    let mut cells = vec![vec![usize::MAX; width]; height];
    for &(node, i, j) in coords {
        let cell = &mut cells[(j - min_j) as usize][(i - min_i) as usize];
        if *cell != usize::MAX {
            return None;
        }
        *cell = node;
    }
    Some(GridCells {
        width,
        height,
        cells,
    })
}

/// Every dihedral relabeling of `grid` that fits `columns x rows`, as
/// row-major index lists.
fn orderings(grid: &GridCells, columns: usize, rows: usize) -> Vec<Vec<usize>> {
    let (w, h) = (grid.width, grid.height);
    let mut out = Vec::new();
    for transposed in [false, true] {
        let fits = if transposed {
            w == rows && h == columns
        } else {
            w == columns && h == rows
        };
        if !fits {
            continue;
        }
        for (flip_i, flip_j) in [(false, false), (true, false), (false, true), (true, true)] {
            let mut order = Vec::with_capacity(columns * rows);
            for r in 0..rows {
                for c in 0..columns {
                    let (mut i, mut j) = if transposed { (r, c) } else { (c, r) };
                    if flip_i {
                        i = w - 1 - i;
                    }
                    if flip_j {
                        j = h - 1 - j;
                    }
                    order.push(grid.cells[j][i]);
                }
            }
            out.push(order);
        }
    }
    out
}

/// Summed image direction of increasing column and increasing row.
fn board_directions(points: &[Point2<f64>], columns: usize, rows: usize) -> (Vector2<f64>, Vector2<f64>) {
    let at = |r: usize, c: usize| points[r * columns + c];
    let mut col_dir = Vector2::zeros();
    for r in 0..rows {
        col_dir += at(r, columns - 1) - at(r, 0);
    }
    let mut row_dir = Vector2::zeros();
    for c in 0..columns {
        row_dir += at(rows - 1, c) - at(0, c);
    }
    (col_dir, row_dir)
}

/// Choose the ordering that is not mirrored in the image (y down) and whose
/// columns run most nearly left-to-right and rows top-to-bottom.
fn canonical_order(
    corners: &[ChessCorner],
    grid: &GridCells,
    columns: usize,
    rows: usize,
) -> Option<Vec<Point2<f64>>> {
    let mut best: Option<(f64, Vec<Point2<f64>>)> = None;
    for order in orderings(grid, columns, rows) {
        let points: Vec<Point2<f64>> = order
            .iter()
            .map(|&n| Point2::new(corners[n].position.x as f64, corners[n].position.y as f64))
            .collect();
        let (col_dir, row_dir) = board_directions(&points, columns, rows);
        let cross = col_dir.x * row_dir.y - col_dir.y * row_dir.x;
        if cross <= 0.0 {
            continue;
        }
        let score = col_dir.normalize().x + row_dir.normalize().y;
        if best.as_ref().is_none_or(|(s, _)| score > *s) {
            best = Some((score, points));
        }
    }
    best.map(|(_, points)| points)
}

/// Find all inner corners of `pattern`, ordered row-major to match
/// [`PatternSpec::world_points`].
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(img, params), fields(width = img.width, height = img.height, pattern = %pattern))
)]
pub fn detect_board(
    img: &GrayImageView<'_>,
    pattern: PatternSpec,
    params: &DetectorParams,
) -> Option<Vec<Point2<f64>>> {
    let columns = pattern.columns() as usize;
    let rows = pattern.rows() as usize;
    let expected = pattern.corner_count();

    let corners = find_chess_corners(img, &params.chess);
    debug!("found {} ChESS corners", corners.len());
    if corners.len() < expected {
        return None;
    }

    let Some(theta) = dominant_quarter_axis(corners.iter().map(|c| (c.orientation, c.strength)))
    else {
        debug!("failed to estimate grid axes from orientations");
        return None;
    };
    let axis_u = theta + FRAC_PI_4;

    let graph = GridGraph::new(&corners, &params.graph, axis_u);
    let mut components = graph.lattice_components();
    components.sort_by_key(|c| std::cmp::Reverse(c.len()));
    debug!(
        "grid graph: {} components, largest {}",
        components.len(),
        components.first().map_or(0, Vec::len)
    );

    for coords in components.iter().filter(|c| c.len() == expected) {
        let Some(grid) = build_cells(coords) else {
            continue;
        };
        if let Some(points) = canonical_order(&corners, &grid, columns, rows) {
            return Some(points);
        }
    }
    None
}
