//! Pixel-graph extraction
//!
//! Converts a binary skeleton raster into the initial node/link graph.
//! Pixels are classified by their 8-connectivity degree: degree 1
//! pixels are endpoints, degree >= 3 pixels are junctions, and runs of
//! degree-2 pixels between them become ordered link paths.
//!
//! The union of all link pixel paths equals the skeleton pixel set
//! (isolated single pixels excepted, which are dropped and counted in
//! the report). Closed rings with no junction pixel are broken by
//! inserting a synthetic node at the first ring pixel in raster scan
//! order, so every skeleton component yields at least one link.
//!
//! Node and link ids follow raster scan order and a fixed neighbor
//! order, so extraction is fully deterministic; the per-row degree
//! classification may run in parallel without affecting ids.

use crate::maybe_rayon::*;
use ndarray::Array2;
use rivnet_core::raster::{neighbors, Raster, NEIGHBOR_OFFSETS};
use rivnet_core::{Algorithm, Error, Network, Pixel, Result};
use std::collections::HashSet;

/// Summary of one extraction run
#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
    /// Skeleton pixels in the input
    pub skeleton_pixels: usize,
    /// Isolated single pixels dropped (degree 0)
    pub dropped_isolated: usize,
    /// Synthetic nodes inserted to break junction-free rings
    pub ring_breaks: usize,
}

/// Pixel-graph extraction operation
#[derive(Debug, Clone, Default)]
pub struct ExtractNetwork;

impl Algorithm for ExtractNetwork {
    type Input = Raster<u8>;
    type Output = (Network, ExtractReport);
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Extract Network"
    }

    fn description(&self) -> &'static str {
        "Convert a binary skeleton raster into a node/link graph"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        extract_network(&input)
    }
}

/// Extract the raw node/link graph from a binary skeleton.
///
/// Any nonzero cell counts as a skeleton pixel.
///
/// # Returns
/// The raw (uncleaned) network plus an [`ExtractReport`].
pub fn extract_network(skeleton: &Raster<u8>) -> Result<(Network, ExtractReport)> {
    let (rows, cols) = skeleton.shape();
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions { rows, cols });
    }

    // 8-connectivity degree per set pixel, -1 for unset. Row order is
    // preserved by the ordered collect, so ids below stay stable.
    let degree_data: Vec<i8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![-1i8; cols];
            for col in 0..cols {
                if unsafe { skeleton.get_unchecked(row, col) } != 0 {
                    let mut degree = 0i8;
                    for (nr, nc) in neighbors(row, col, rows, cols) {
                        if unsafe { skeleton.get_unchecked(nr, nc) } != 0 {
                            degree += 1;
                        }
                    }
                    row_data[col] = degree;
                }
            }
            row_data
        })
        .collect();
    let degree = Array2::from_shape_vec((rows, cols), degree_data)
        .map_err(|e| Error::InvalidInput(e.to_string()))?;

    let mut report = ExtractReport::default();
    let mut net = Network::new();
    // node id per pixel, -1 where none
    let mut node_at = Array2::<i64>::from_elem((rows, cols), -1);
    let mut node_pixels: Vec<Pixel> = Vec::new();

    for row in 0..rows {
        for col in 0..cols {
            match degree[(row, col)] {
                -1 => {}
                0 => {
                    report.skeleton_pixels += 1;
                    report.dropped_isolated += 1;
                }
                2 => {
                    report.skeleton_pixels += 1;
                }
                _ => {
                    report.skeleton_pixels += 1;
                    let id = net.add_node((row, col));
                    node_at[(row, col)] = id as i64;
                    node_pixels.push((row, col));
                }
            }
        }
    }

    let mut visited = Array2::<bool>::from_elem((rows, cols), false);
    let mut direct_pairs: HashSet<(Pixel, Pixel)> = HashSet::new();

    for &pixel in &node_pixels {
        trace_from_node(
            skeleton,
            &degree,
            &node_at,
            &mut visited,
            &mut direct_pairs,
            &mut net,
            pixel,
        )?;
    }

    // Junction-free rings: every pixel is degree 2, so nothing above
    // touched them. Break each ring at its first pixel in scan order.
    loop {
        let mut ring_seed = None;
        'scan: for row in 0..rows {
            for col in 0..cols {
                if degree[(row, col)] == 2
                    && !visited[(row, col)]
                    && node_at[(row, col)] < 0
                {
                    ring_seed = Some((row, col));
                    break 'scan;
                }
            }
        }
        let Some((row, col)) = ring_seed else { break };
        let id = net.add_node((row, col));
        node_at[(row, col)] = id as i64;
        report.ring_breaks += 1;
        trace_from_node(
            skeleton,
            &degree,
            &node_at,
            &mut visited,
            &mut direct_pairs,
            &mut net,
            (row, col),
        )?;
    }

    net.validate()?;
    Ok((net, report))
}

/// Trace every untraced link leaving a node pixel.
fn trace_from_node(
    skeleton: &Raster<u8>,
    degree: &Array2<i8>,
    node_at: &Array2<i64>,
    visited: &mut Array2<bool>,
    direct_pairs: &mut HashSet<(Pixel, Pixel)>,
    net: &mut Network,
    start: Pixel,
) -> Result<()> {
    let (rows, cols) = skeleton.shape();
    let start_id = node_at[start] as usize;

    for &(dr, dc) in NEIGHBOR_OFFSETS.iter() {
        let nr = start.0 as isize + dr;
        let nc = start.1 as isize + dc;
        if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
            continue;
        }
        let first = (nr as usize, nc as usize);
        if degree[first] < 0 {
            continue;
        }

        if node_at[first] >= 0 {
            // Two adjacent node pixels: a direct two-pixel link,
            // created once per pair.
            let pair = ordered_pair(start, first);
            if direct_pairs.insert(pair) {
                let end_id = node_at[first] as usize;
                net.add_link(start_id, end_id, vec![start, first])?;
            }
            continue;
        }

        if visited[first] {
            continue;
        }

        // Walk the degree-2 run until the next node pixel.
        let mut path = vec![start, first];
        visited[first] = true;
        let mut prev = start;
        let mut cur = first;
        loop {
            let mut next = None;
            for (xr, xc) in neighbors(cur.0, cur.1, rows, cols) {
                if (xr, xc) == prev || degree[(xr, xc)] < 0 {
                    continue;
                }
                next = Some((xr, xc));
                break;
            }
            let Some(next) = next else {
                return Err(Error::Inconsistent(format!(
                    "skeleton walk dead-ended at ({}, {})",
                    cur.0, cur.1
                )));
            };
            path.push(next);
            if node_at[next] >= 0 {
                let end_id = node_at[next] as usize;
                net.add_link(start_id, end_id, path)?;
                break;
            }
            visited[next] = true;
            prev = cur;
            cur = next;
        }
    }

    Ok(())
}

fn ordered_pair(a: Pixel, b: Pixel) -> (Pixel, Pixel) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster_from_pixels(rows: usize, cols: usize, pixels: &[(usize, usize)]) -> Raster<u8> {
        let mut skel = Raster::new(rows, cols);
        for &(r, c) in pixels {
            skel.set(r, c, 1).unwrap();
        }
        skel
    }

    #[test]
    fn test_straight_line() {
        let pixels: Vec<_> = (1..=8).map(|c| (5usize, c)).collect();
        let skel = raster_from_pixels(10, 10, &pixels);
        let (net, report) = extract_network(&skel).unwrap();

        assert_eq!(net.node_count(), 2);
        assert_eq!(net.link_count(), 1);
        assert_eq!(report.dropped_isolated, 0);
        assert_eq!(report.skeleton_pixels, 8);

        let link = net.links().next().unwrap();
        assert_eq!(link.idx.len(), 8);
        assert_eq!(link.idx[0], (5, 1));
        assert_eq!(*link.idx.last().unwrap(), (5, 8));
    }

    #[test]
    fn test_y_junction() {
        let mut pixels: Vec<(usize, usize)> = (0..=4).map(|r| (r, 4usize)).collect();
        pixels.extend([(5, 3), (6, 2), (7, 1), (5, 5), (6, 6), (7, 7)]);
        let skel = raster_from_pixels(10, 10, &pixels);
        let (net, _) = extract_network(&skel).unwrap();

        assert_eq!(net.node_count(), 4);
        assert_eq!(net.link_count(), 3);

        // Junction at (4, 4) has degree 3
        let junction = net.nodes().find(|n| n.rc == (4, 4)).unwrap();
        assert_eq!(junction.degree(), 3);

        // Endpoints have degree 1
        for rc in [(0, 4), (7, 1), (7, 7)] {
            let node = net.nodes().find(|n| n.rc == rc).unwrap();
            assert_eq!(node.degree(), 1);
        }
    }

    #[test]
    fn test_isolated_pixel_dropped() {
        let skel = raster_from_pixels(10, 10, &[(2, 2), (7, 1), (7, 2), (7, 3)]);
        let (net, report) = extract_network(&skel).unwrap();

        assert_eq!(report.dropped_isolated, 1);
        assert_eq!(net.node_count(), 2);
        assert_eq!(net.link_count(), 1);
    }

    #[test]
    fn test_ring_broken_with_synthetic_node() {
        // Diamond ring of 8 pixels, all degree 2
        let ring = [
            (0, 2),
            (1, 1),
            (1, 3),
            (2, 0),
            (2, 4),
            (3, 1),
            (3, 3),
            (4, 2),
        ];
        let skel = raster_from_pixels(6, 6, &ring);
        let (net, report) = extract_network(&skel).unwrap();

        assert_eq!(report.ring_breaks, 1);
        assert_eq!(net.node_count(), 1);
        assert_eq!(net.link_count(), 1);

        let link = net.links().next().unwrap();
        assert!(link.is_self_loop());
        // Ring pixel count plus the repeated break pixel
        assert_eq!(link.idx.len(), 9);
        assert_eq!(link.idx[0], *link.idx.last().unwrap());
        // Broken at the first ring pixel in scan order
        assert_eq!(link.idx[0], (0, 2));
    }

    #[test]
    fn test_adjacent_junction_pixels() {
        // Horizontal line with a vertical spur: 8-connectivity turns
        // the attachment area into a cluster of adjacent junctions.
        let mut pixels: Vec<(usize, usize)> = (0..10).map(|c| (5usize, c)).collect();
        pixels.extend([(4, 5), (3, 5), (2, 5)]);
        let skel = raster_from_pixels(10, 10, &pixels);
        let (net, _) = extract_network(&skel).unwrap();

        net.validate().unwrap();
        // Direct node-node links are not duplicated
        let mut seen = std::collections::HashSet::new();
        for link in net.links() {
            if link.idx.len() == 2 {
                let pair = ordered_pair(link.idx[0], link.idx[1]);
                assert!(seen.insert(pair), "duplicate direct link {pair:?}");
            }
        }
    }

    #[test]
    fn test_completeness() {
        // Every skeleton pixel appears in some link path
        let mut pixels: Vec<(usize, usize)> = (0..=4).map(|r| (r, 4usize)).collect();
        pixels.extend([(5, 3), (6, 2), (7, 1), (5, 5), (6, 6), (7, 7)]);
        let skel = raster_from_pixels(10, 10, &pixels);
        let (net, _) = extract_network(&skel).unwrap();

        let mut covered = HashSet::new();
        for link in net.links() {
            for &px in &link.idx {
                covered.insert(px);
            }
        }
        let skeleton_set: HashSet<_> = pixels.iter().copied().collect();
        assert_eq!(covered, skeleton_set);
    }

    #[test]
    fn test_determinism() {
        let mut pixels: Vec<(usize, usize)> = (0..=4).map(|r| (r, 4usize)).collect();
        pixels.extend([(5, 3), (6, 2), (7, 1), (5, 5), (6, 6), (7, 7)]);
        let skel = raster_from_pixels(10, 10, &pixels);

        let (a, _) = extract_network(&skel).unwrap();
        let (b, _) = extract_network(&skel).unwrap();

        let ids_a: Vec<_> = a.nodes().map(|n| (n.id, n.rc)).collect();
        let ids_b: Vec<_> = b.nodes().map(|n| (n.id, n.rc)).collect();
        assert_eq!(ids_a, ids_b);

        let links_a: Vec<_> = a.links().map(|l| (l.id, l.conn, l.idx.clone())).collect();
        let links_b: Vec<_> = b.links().map(|l| (l.id, l.conn, l.idx.clone())).collect();
        assert_eq!(links_a, links_b);
    }

    #[test]
    fn test_empty_raster_dimensions() {
        let skel: Raster<u8> = Raster::from_array(Array2::zeros((0, 0)));
        assert!(extract_network(&skel).is_err());
    }
}
