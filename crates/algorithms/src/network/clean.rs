//! Topology cleaning
//!
//! Reduces the raw extracted graph to a simple, analyzable topology:
//!
//! - self-loops and micro-cycles below a length threshold are removed
//!   (skeletonization noise around islands a few pixels wide);
//! - links sharing an endpoint pair are kept and cross-tagged as
//!   `parallels` (real braided channels) unless their lengths are near
//!   enough to be duplicates, in which case the shorter is discarded;
//! - dangling spurs below a length threshold are removed to fixpoint.
//!
//! Each pass only removes elements, so the loop terminates on its own;
//! the iteration cap turns a pass that is still making changes when
//! the cap is hit into a distinct non-convergence error, with the
//! partial graph left in place for inspection.

use rivnet_core::{Error, LinkId, Network, NodeId, Result};
use std::collections::BTreeMap;

/// Parameters for topology cleaning
#[derive(Debug, Clone)]
pub struct CleanParams {
    /// Cycles (and self-loops) whose links are all shorter than this
    /// are collapsed, in pixels.
    pub min_cycle_len_px: f64,
    /// Dangling links shorter than this with a degree-1 endpoint are
    /// removed, in pixels.
    pub spur_len_px: f64,
    /// Two links over the same endpoint pair whose relative length
    /// difference is below this are near-duplicates; the shorter one
    /// is discarded.
    pub duplicate_ratio: f64,
    /// Maximum cleaning passes before reporting non-convergence.
    pub max_iterations: usize,
}

impl Default for CleanParams {
    fn default() -> Self {
        Self {
            min_cycle_len_px: 20.0,
            spur_len_px: 10.0,
            duplicate_ratio: 0.25,
            max_iterations: 20,
        }
    }
}

/// Summary of one cleaning run
#[derive(Debug, Clone, Default)]
pub struct CleanReport {
    /// Passes executed (including the final no-change pass)
    pub iterations: usize,
    pub removed_self_loops: usize,
    pub removed_cycle_links: usize,
    pub removed_duplicates: usize,
    pub removed_spurs: usize,
    /// Braided endpoint pairs tagged after convergence
    pub parallel_groups: usize,
}

/// Clean the network in place.
///
/// On success the graph is validated and braided links carry their
/// `parallels` tags. Hitting the iteration cap while changes are still
/// being made returns [`Error::NonConvergence`]; the partially cleaned
/// graph is retained.
pub fn clean_network(net: &mut Network, params: &CleanParams) -> Result<CleanReport> {
    let mut report = CleanReport::default();
    let mut converged = false;

    for iteration in 1..=params.max_iterations {
        report.iterations = iteration;
        let mut changed = false;

        // Self-loops below the cycle threshold
        for id in net.link_ids() {
            let link = net.link(id)?;
            if link.is_self_loop() && link.pixel_length() < params.min_cycle_len_px {
                net.remove_link(id)?;
                report.removed_self_loops += 1;
                changed = true;
            }
        }

        // Micro-cycles: consider only links below the threshold and
        // add them longest-first to a union-find; a link that closes a
        // cycle is the shortest remaining in that cycle and is removed.
        let mut short: Vec<(f64, LinkId, [NodeId; 2])> = net
            .links()
            .filter(|l| !l.is_self_loop() && l.pixel_length() < params.min_cycle_len_px)
            .map(|l| (l.pixel_length(), l.id, l.conn))
            .collect();
        short.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        let mut uf = UnionFind::default();
        for (_, id, conn) in short {
            if uf.union(conn[0], conn[1]) {
                continue;
            }
            net.remove_link(id)?;
            report.removed_cycle_links += 1;
            changed = true;
        }

        // Near-duplicate parallel links
        for (_, group) in links_by_endpoint_pair(net) {
            if group.len() < 2 {
                continue;
            }
            // Longest first; ties broken by id for determinism
            let mut by_len: Vec<(f64, LinkId)> = group
                .iter()
                .map(|&id| (net.link(id).map(|l| l.pixel_length()).unwrap_or(0.0), id))
                .collect();
            by_len.sort_by(|a, b| {
                b.0.partial_cmp(&a.0)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.1.cmp(&b.1))
            });
            let mut removed = vec![false; by_len.len()];
            for i in 0..by_len.len() {
                if removed[i] {
                    continue;
                }
                for j in (i + 1)..by_len.len() {
                    if removed[j] {
                        continue;
                    }
                    let (longer, shorter) = (by_len[i].0, by_len[j].0);
                    if longer > 0.0 && (longer - shorter) / longer < params.duplicate_ratio {
                        net.remove_link(by_len[j].1)?;
                        removed[j] = true;
                        report.removed_duplicates += 1;
                        changed = true;
                    }
                }
            }
        }

        // Dangling spurs
        for id in net.link_ids() {
            let Ok(link) = net.link(id) else { continue };
            if link.is_self_loop() || link.pixel_length() >= params.spur_len_px {
                continue;
            }
            let dangling = link
                .conn
                .iter()
                .any(|&n| net.node(n).map(|node| node.degree() == 1).unwrap_or(false));
            if dangling {
                net.remove_link(id)?;
                report.removed_spurs += 1;
                changed = true;
            }
        }

        net.remove_orphan_nodes();

        if !changed {
            converged = true;
            break;
        }
    }

    if !converged {
        return Err(Error::NonConvergence {
            stage: "clean_network",
            iterations: params.max_iterations,
        });
    }

    // Tag surviving braids
    for id in net.link_ids() {
        net.link_mut(id)?.parallels.clear();
    }
    for (_, group) in links_by_endpoint_pair(net) {
        if group.len() < 2 {
            continue;
        }
        report.parallel_groups += 1;
        for &id in &group {
            let others: Vec<LinkId> = group.iter().copied().filter(|&o| o != id).collect();
            net.link_mut(id)?.parallels = others;
        }
    }

    net.validate()?;
    Ok(report)
}

/// Non-self-loop links grouped by unordered endpoint pair, id order.
fn links_by_endpoint_pair(net: &Network) -> BTreeMap<(NodeId, NodeId), Vec<LinkId>> {
    let mut groups: BTreeMap<(NodeId, NodeId), Vec<LinkId>> = BTreeMap::new();
    for link in net.links() {
        if link.is_self_loop() {
            continue;
        }
        let pair = (
            link.conn[0].min(link.conn[1]),
            link.conn[0].max(link.conn[1]),
        );
        groups.entry(pair).or_default().push(link.id);
    }
    groups
}

#[derive(Default)]
struct UnionFind {
    parent: BTreeMap<NodeId, NodeId>,
}

impl UnionFind {
    fn find(&mut self, x: NodeId) -> NodeId {
        let p = *self.parent.entry(x).or_insert(x);
        if p == x {
            return x;
        }
        let root = self.find(p);
        self.parent.insert(x, root);
        root
    }

    /// Returns true if the two sets were disjoint (no cycle closed).
    fn union(&mut self, a: NodeId, b: NodeId) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        self.parent.insert(ra.max(rb), ra.min(rb));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::extract::extract_network;
    use rivnet_core::Raster;

    fn raster_from_pixels(rows: usize, cols: usize, pixels: &[(usize, usize)]) -> Raster<u8> {
        let mut skel = Raster::new(rows, cols);
        for &(r, c) in pixels {
            skel.set(r, c, 1).unwrap();
        }
        skel
    }

    /// Two channels between the same junction pair, one longer.
    fn braid_skeleton() -> Raster<u8> {
        let pixels = [
            // left stem
            (5, 0),
            (5, 1),
            (5, 2),
            // upper (shorter) arc
            (4, 3),
            (3, 4),
            (3, 5),
            (3, 6),
            (4, 7),
            // lower (longer) arc
            (6, 3),
            (7, 4),
            (8, 5),
            (8, 6),
            (7, 7),
            (6, 8),
            // right junction and stem
            (5, 8),
            (4, 9),
        ];
        raster_from_pixels(10, 10, &pixels)
    }

    #[test]
    fn test_braid_tagged_as_parallels() {
        let (mut net, _) = extract_network(&braid_skeleton()).unwrap();
        let params = CleanParams {
            min_cycle_len_px: 5.0,
            spur_len_px: 1.0,
            duplicate_ratio: 0.1,
            max_iterations: 20,
        };
        let report = clean_network(&mut net, &params).unwrap();

        assert_eq!(report.parallel_groups, 1);
        assert_eq!(net.link_count(), 4);
        assert_eq!(net.node_count(), 4);

        let tagged: Vec<_> = net.links().filter(|l| !l.parallels.is_empty()).collect();
        assert_eq!(tagged.len(), 2);
        assert_eq!(tagged[0].parallels, vec![tagged[1].id]);
        assert_eq!(tagged[1].parallels, vec![tagged[0].id]);
    }

    #[test]
    fn test_near_duplicate_discarded() {
        let (mut net, _) = extract_network(&braid_skeleton()).unwrap();
        let params = CleanParams {
            min_cycle_len_px: 5.0,
            spur_len_px: 1.0,
            duplicate_ratio: 0.3,
            max_iterations: 20,
        };
        let report = clean_network(&mut net, &params).unwrap();

        assert_eq!(report.removed_duplicates, 1);
        assert_eq!(net.link_count(), 3);
        assert_eq!(net.node_count(), 4);
        assert!(net.links().all(|l| l.parallels.is_empty()));

        // The longer (lower) arc survives
        let arc = net
            .links()
            .find(|l| l.idx.len() == 8)
            .expect("lower arc kept");
        assert!(arc.idx.contains(&(8, 5)));
    }

    #[test]
    fn test_spur_and_micro_cycles_removed() {
        // Horizontal channel with a short vertical spur; 8-connectivity
        // produces a junction cluster full of 1-pixel links.
        let mut pixels: Vec<(usize, usize)> = (0..10).map(|c| (5usize, c)).collect();
        pixels.extend([(4, 5), (3, 5), (2, 5)]);
        let skel = raster_from_pixels(10, 10, &pixels);
        let (mut net, _) = extract_network(&skel).unwrap();

        let params = CleanParams {
            min_cycle_len_px: 5.0,
            spur_len_px: 2.5,
            duplicate_ratio: 0.25,
            max_iterations: 20,
        };
        let report = clean_network(&mut net, &params).unwrap();

        assert!(report.removed_cycle_links >= 2);
        assert!(report.removed_spurs >= 1);

        // Spur tip is gone, channel endpoints survive
        let node_pixels: std::collections::HashSet<_> = net.nodes().map(|n| n.rc).collect();
        assert!(!node_pixels.contains(&(2, 5)));
        assert!(node_pixels.contains(&(5, 0)));
        assert!(node_pixels.contains(&(5, 9)));
        net.validate().unwrap();
    }

    #[test]
    fn test_small_ring_collapses_to_nothing() {
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
        let (mut net, _) = extract_network(&skel).unwrap();

        let report = clean_network(&mut net, &CleanParams::default()).unwrap();
        assert_eq!(report.removed_self_loops, 1);
        assert!(net.is_empty());
        assert_eq!(net.node_count(), 0);
    }

    #[test]
    fn test_iteration_cap_reported() {
        let mut pixels: Vec<(usize, usize)> = (0..10).map(|c| (5usize, c)).collect();
        pixels.extend([(4, 5), (3, 5), (2, 5)]);
        let skel = raster_from_pixels(10, 10, &pixels);
        let (mut net, _) = extract_network(&skel).unwrap();

        let params = CleanParams {
            min_cycle_len_px: 5.0,
            spur_len_px: 2.5,
            duplicate_ratio: 0.25,
            max_iterations: 1,
        };
        let result = clean_network(&mut net, &params);
        assert!(matches!(
            result,
            Err(Error::NonConvergence {
                stage: "clean_network",
                ..
            })
        ));
        // Partial graph is retained for inspection
        assert!(net.link_count() > 0);
    }

    #[test]
    fn test_clean_is_idempotent() {
        let (mut net, _) = extract_network(&braid_skeleton()).unwrap();
        let params = CleanParams {
            min_cycle_len_px: 5.0,
            spur_len_px: 1.0,
            duplicate_ratio: 0.1,
            max_iterations: 20,
        };
        clean_network(&mut net, &params).unwrap();
        let before: Vec<_> = net.links().map(|l| (l.id, l.conn)).collect();
        clean_network(&mut net, &params).unwrap();
        let after: Vec<_> = net.links().map(|l| (l.id, l.conn)).collect();
        assert_eq!(before, after);
    }
}
