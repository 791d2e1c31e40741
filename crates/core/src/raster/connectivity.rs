//! 8-connectivity helpers for skeleton walking
//!
//! Skeleton pixels are classified and traced using the standard
//! 8-neighborhood. The offset table is ordered row-major so that all
//! scans visit neighbors in a fixed, deterministic order; link ids
//! assigned downstream depend on this ordering being stable.

use crate::raster::Raster;

/// 8-neighbor offsets in row-major scan order: (row_offset, col_offset)
pub const NEIGHBOR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// In-bounds 8-neighbors of (row, col), in scan order.
pub fn neighbors(
    row: usize,
    col: usize,
    rows: usize,
    cols: usize,
) -> impl Iterator<Item = (usize, usize)> {
    NEIGHBOR_OFFSETS.iter().filter_map(move |&(dr, dc)| {
        let nr = row as isize + dr;
        let nc = col as isize + dc;
        if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
            None
        } else {
            Some((nr as usize, nc as usize))
        }
    })
}

/// Count set 8-neighbors of a skeleton pixel.
///
/// The pixel itself is not counted. Any nonzero cell is considered set.
pub fn pixel_degree(skeleton: &Raster<u8>, row: usize, col: usize) -> u8 {
    let (rows, cols) = skeleton.shape();
    let mut degree = 0u8;
    for (nr, nc) in neighbors(row, col, rows, cols) {
        // In-bounds by construction
        if unsafe { skeleton.get_unchecked(nr, nc) } != 0 {
            degree += 1;
        }
    }
    degree
}

/// Euclidean distance between two pixel coordinates.
pub fn pixel_distance(a: (usize, usize), b: (usize, usize)) -> f64 {
    let dr = a.0 as f64 - b.0 as f64;
    let dc = a.1 as f64 - b.1 as f64;
    (dr * dr + dc * dc).sqrt()
}
