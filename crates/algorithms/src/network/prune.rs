//! Boundary pruning
//!
//! Trims a cleaned network to the portion that participates in flow
//! between inlets and outlets, and assigns those boundary roles:
//!
//! - deltas ([`prune_delta`]): everything seaward of a shoreline
//!   polygon is cut, the inside endpoints of cut links become outlets,
//!   and the node nearest each supplied inlet coordinate becomes an
//!   inlet;
//! - braided rivers ([`prune_river`]): the nodes nearest the two exit
//!   sides of the grid become the single inlet and outlet.
//!
//! Both then drop everything unreachable from the inlets and remove
//! dangling interior tips to fixpoint. All coordinates are in pixel
//! space, `x = column`, `y = row`.

use geo::{Contains, Point, Polygon};
use rivnet_core::{Error, LinkId, Network, NodeId, NodeRole, Result};
use std::collections::{HashSet, VecDeque};
use std::str::FromStr;

/// One border of the raster grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    North,
    East,
    South,
    West,
}

impl Side {
    fn from_char(c: char) -> Result<Self> {
        match c {
            'n' | 'N' => Ok(Side::North),
            'e' | 'E' => Ok(Side::East),
            's' | 'S' => Ok(Side::South),
            'w' | 'W' => Ok(Side::West),
            other => Err(Error::InvalidInput(format!(
                "unknown exit side '{other}', expected one of n/e/s/w"
            ))),
        }
    }

    /// Distance (in pixels) from a pixel to this border of a
    /// `rows` x `cols` grid.
    fn border_distance(self, rc: (usize, usize), rows: usize, cols: usize) -> usize {
        match self {
            Side::North => rc.0,
            Side::South => rows.saturating_sub(1) - rc.0.min(rows.saturating_sub(1)),
            Side::West => rc.1,
            Side::East => cols.saturating_sub(1) - rc.1.min(cols.saturating_sub(1)),
        }
    }
}

/// Inlet and outlet borders for a braided river reach, parsed from the
/// two-character notation used in channel-network tooling ("ns" means
/// flow enters from the north border and exits the south).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitSides {
    pub inlet: Side,
    pub outlet: Side,
}

impl FromStr for ExitSides {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        let (Some(a), Some(b), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(Error::InvalidInput(format!(
                "exit sides must be two characters, got '{s}'"
            )));
        };
        let inlet = Side::from_char(a)?;
        let outlet = Side::from_char(b)?;
        if inlet == outlet {
            return Err(Error::InvalidInput(format!(
                "inlet and outlet cannot share the '{a}' border"
            )));
        }
        Ok(ExitSides { inlet, outlet })
    }
}

/// Parameters for boundary pruning
#[derive(Debug, Clone)]
pub struct PruneParams {
    /// Dangling interior links shorter than this are removed after
    /// boundary trimming; inlet and outlet tips are never pruned. The
    /// default removes all dangling interior tips.
    pub spur_len_px: f64,
}

impl Default for PruneParams {
    fn default() -> Self {
        Self {
            spur_len_px: f64::INFINITY,
        }
    }
}

/// Summary of one pruning run
#[derive(Debug, Clone, Default)]
pub struct PruneReport {
    /// Nodes removed outside the shoreline (delta only)
    pub removed_outside: usize,
    /// Nodes removed as unreachable from the inlets
    pub removed_unreachable: usize,
    /// Dangling links removed after trimming
    pub removed_spurs: usize,
    pub inlets: Vec<NodeId>,
    pub outlets: Vec<NodeId>,
}

/// Prune a delta network against a shoreline polygon.
///
/// `shoreline` and `inlets` are in pixel coordinates (`x = column`,
/// `y = row`). Links crossing the shoreline are cut and their inside
/// endpoints become outlets; the node nearest each inlet coordinate
/// becomes an inlet. Fails if no outlet survives reachability pruning.
pub fn prune_delta(
    net: &mut Network,
    shoreline: &Polygon<f64>,
    inlets: &[(f64, f64)],
    params: &PruneParams,
) -> Result<PruneReport> {
    if net.is_empty() {
        return Err(Error::precondition("prune_delta", "network is empty"));
    }
    if inlets.is_empty() {
        return Err(Error::precondition(
            "prune_delta",
            "at least one inlet coordinate is required",
        ));
    }

    let mut report = PruneReport::default();

    // Junctions present before trimming stay even if cutting leaves
    // them dangling; they mark real bifurcations
    let protected: HashSet<NodeId> = net
        .nodes()
        .filter(|n| n.degree() >= 3)
        .map(|n| n.id)
        .collect();

    // Classify nodes against the shoreline
    let outside: HashSet<NodeId> = net
        .nodes()
        .filter(|n| {
            let p = Point::new(n.rc.1 as f64, n.rc.0 as f64);
            !shoreline.contains(&p)
        })
        .map(|n| n.id)
        .collect();

    // Cut links whose pixel path leaves the shoreline anywhere, not
    // just at the endpoints; an inside endpoint of a cut link drains
    // to the sea and becomes an outlet
    let mut outlet_candidates: Vec<NodeId> = Vec::new();
    for id in net.link_ids() {
        let link = net.link(id)?;
        let ends_out = [
            outside.contains(&link.conn[0]),
            outside.contains(&link.conn[1]),
        ];
        let crosses = ends_out[0]
            || ends_out[1]
            || link
                .idx
                .iter()
                .any(|&(r, c)| !shoreline.contains(&Point::new(c as f64, r as f64)));
        if !crosses {
            continue;
        }
        for (&node, out) in link.conn.iter().zip(ends_out) {
            if !out {
                outlet_candidates.push(node);
            }
        }
        net.remove_link(id)?;
    }
    for &id in &outside {
        if net.node(id).is_ok() {
            net.remove_node(id)?;
        }
    }
    report.removed_outside = outside.len();
    report.removed_outside += net.remove_orphan_nodes();

    for id in outlet_candidates {
        if let Ok(node) = net.node_mut(id) {
            node.role = NodeRole::Outlet;
        }
    }

    // Nearest node to each requested inlet location
    let mut inlet_ids: Vec<NodeId> = Vec::new();
    for &(x, y) in inlets {
        let nearest = net
            .nodes()
            .map(|n| {
                let dx = n.rc.1 as f64 - x;
                let dy = n.rc.0 as f64 - y;
                (dx * dx + dy * dy, n.id)
            })
            .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(_, id)| id)
            .ok_or_else(|| {
                Error::Inconsistent("all nodes fell outside the shoreline".to_string())
            })?;
        if !inlet_ids.contains(&nearest) {
            inlet_ids.push(nearest);
        }
    }
    for &id in &inlet_ids {
        net.node_mut(id)?.role = NodeRole::Inlet;
    }

    report.removed_unreachable = retain_reachable(net, &inlet_ids)?;
    report.removed_spurs = remove_dangling(net, params.spur_len_px, &protected)?;

    report.inlets = net.nodes_with_role(NodeRole::Inlet);
    report.outlets = net.nodes_with_role(NodeRole::Outlet);
    if report.outlets.is_empty() {
        return Err(Error::Inconsistent(
            "no outlet is reachable from the inlets".to_string(),
        ));
    }

    net.validate()?;
    Ok(report)
}

/// Prune a braided-river network given its exit sides.
///
/// The node nearest the inlet border becomes the single inlet, the
/// node nearest the outlet border the single outlet (ties broken by
/// lowest node id). `shape` is the skeleton raster shape `(rows,
/// cols)`.
pub fn prune_river(
    net: &mut Network,
    exit_sides: ExitSides,
    shape: (usize, usize),
    params: &PruneParams,
) -> Result<PruneReport> {
    if net.is_empty() {
        return Err(Error::precondition("prune_river", "network is empty"));
    }
    let (rows, cols) = shape;

    let nearest_to = |side: Side, net: &Network| -> NodeId {
        net.nodes()
            .map(|n| (side.border_distance(n.rc, rows, cols), n.id))
            .min()
            .map(|(_, id)| id)
            .unwrap_or(0)
    };
    let inlet = nearest_to(exit_sides.inlet, net);
    let outlet = nearest_to(exit_sides.outlet, net);
    if inlet == outlet {
        return Err(Error::Inconsistent(format!(
            "node {inlet} is nearest to both exit borders"
        )));
    }
    net.node_mut(inlet)?.role = NodeRole::Inlet;
    net.node_mut(outlet)?.role = NodeRole::Outlet;

    let mut report = PruneReport::default();
    report.removed_unreachable = retain_reachable(net, &[inlet])?;
    if net.node(outlet).is_err() {
        return Err(Error::Inconsistent(
            "outlet is not reachable from the inlet".to_string(),
        ));
    }
    report.removed_spurs = remove_dangling(net, params.spur_len_px, &HashSet::new())?;

    report.inlets = vec![inlet];
    report.outlets = vec![outlet];
    net.validate()?;
    Ok(report)
}

/// Keep only nodes reachable from `sources`; returns removed count.
fn retain_reachable(net: &mut Network, sources: &[NodeId]) -> Result<usize> {
    let mut reached: HashSet<NodeId> = HashSet::new();
    let mut queue: VecDeque<NodeId> = sources.iter().copied().collect();
    reached.extend(sources.iter().copied());
    while let Some(id) = queue.pop_front() {
        let conn: Vec<LinkId> = net.node(id)?.conn.clone();
        for lid in conn {
            let Some(other) = net.link(lid)?.other_end(id) else {
                continue;
            };
            if reached.insert(other) {
                queue.push_back(other);
            }
        }
    }
    let doomed: Vec<NodeId> = net.node_ids().into_iter().filter(|id| !reached.contains(id)).collect();
    for id in &doomed {
        net.remove_node(*id)?;
    }
    Ok(doomed.len())
}

/// Remove dangling interior tips to fixpoint; returns removed links.
/// Nodes in `protected` are never treated as removable tips.
fn remove_dangling(
    net: &mut Network,
    spur_len_px: f64,
    protected: &HashSet<NodeId>,
) -> Result<usize> {
    let mut removed = 0;
    loop {
        let mut changed = false;
        for id in net.link_ids() {
            let Ok(link) = net.link(id) else { continue };
            if link.is_self_loop() || link.pixel_length() >= spur_len_px {
                continue;
            }
            let dangling = link.conn.iter().any(|&n| {
                !protected.contains(&n)
                    && net
                        .node(n)
                        .map(|node| node.degree() == 1 && node.role == NodeRole::Interior)
                        .unwrap_or(false)
            });
            if dangling {
                net.remove_link(id)?;
                removed += 1;
                changed = true;
            }
        }
        net.remove_orphan_nodes();
        if !changed {
            return Ok(removed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::extract::extract_network;
    use geo::LineString;
    use rivnet_core::Raster;

    fn raster_from_pixels(rows: usize, cols: usize, pixels: &[(usize, usize)]) -> Raster<u8> {
        let mut skel = Raster::new(rows, cols);
        for &(r, c) in pixels {
            skel.set(r, c, 1).unwrap();
        }
        skel
    }

    /// Vertical trunk splitting into two distributaries.
    fn y_skeleton() -> Raster<u8> {
        let mut pixels: Vec<(usize, usize)> = (0..5).map(|r| (r, 4usize)).collect();
        pixels.extend([(5, 3), (6, 2), (7, 1)]);
        pixels.extend([(5, 5), (6, 6), (7, 7)]);
        raster_from_pixels(9, 9, &pixels)
    }

    fn rect_shoreline(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]),
            vec![],
        )
    }

    #[test]
    fn test_exit_sides_parse() {
        let es: ExitSides = "ns".parse().unwrap();
        assert_eq!(es.inlet, Side::North);
        assert_eq!(es.outlet, Side::South);
        let es: ExitSides = "ne".parse().unwrap();
        assert_eq!(es.outlet, Side::East);
        let es: ExitSides = "SW".parse().unwrap();
        assert_eq!(es.inlet, Side::South);
        assert_eq!(es.outlet, Side::West);

        assert!("nn".parse::<ExitSides>().is_err());
        assert!("n".parse::<ExitSides>().is_err());
        assert!("nse".parse::<ExitSides>().is_err());
        assert!("xz".parse::<ExitSides>().is_err());
    }

    #[test]
    fn test_delta_shoreline_cut_creates_outlet() {
        let (mut net, _) = extract_network(&y_skeleton()).unwrap();
        // Shoreline keeps rows 0..=6; both distributary tips are seaward
        let shoreline = rect_shoreline(-1.0, -1.0, 10.0, 6.5);
        let report = prune_delta(
            &mut net,
            &shoreline,
            &[(4.0, 0.0)],
            &PruneParams::default(),
        )
        .unwrap();

        assert_eq!(report.removed_outside, 2);
        assert_eq!(report.inlets.len(), 1);
        assert_eq!(report.outlets.len(), 1);

        let inlet = net.node(report.inlets[0]).unwrap();
        assert_eq!(inlet.rc, (0, 4));
        assert_eq!(inlet.role, NodeRole::Inlet);
        let outlet = net.node(report.outlets[0]).unwrap();
        assert_eq!(outlet.rc, (4, 4));
        assert_eq!(outlet.role, NodeRole::Outlet);

        assert_eq!(net.node_count(), 2);
        assert_eq!(net.link_count(), 1);
    }

    #[test]
    fn test_delta_unreachable_component_removed() {
        let mut pixels: Vec<(usize, usize)> = (0..5).map(|r| (r, 4usize)).collect();
        pixels.extend([(5, 3), (6, 2), (7, 1)]);
        pixels.extend([(5, 5), (6, 6), (7, 7)]);
        // Disconnected fragment inside the shoreline
        pixels.extend([(1, 0), (1, 1)]);
        let skel = raster_from_pixels(9, 9, &pixels);
        let (mut net, _) = extract_network(&skel).unwrap();

        let shoreline = rect_shoreline(-1.0, -1.0, 10.0, 6.5);
        let report = prune_delta(
            &mut net,
            &shoreline,
            &[(4.0, 0.0)],
            &PruneParams::default(),
        )
        .unwrap();

        assert_eq!(report.removed_unreachable, 2);
        assert!(net.nodes().all(|n| n.rc != (1, 0) && n.rc != (1, 1)));
    }

    #[test]
    fn test_delta_requires_inlets() {
        let (mut net, _) = extract_network(&y_skeleton()).unwrap();
        let shoreline = rect_shoreline(-1.0, -1.0, 10.0, 6.5);
        let result = prune_delta(&mut net, &shoreline, &[], &PruneParams::default());
        assert!(matches!(result, Err(Error::Precondition { .. })));
    }

    #[test]
    fn test_delta_no_outlet_is_an_error() {
        let (mut net, _) = extract_network(&y_skeleton()).unwrap();
        // Shoreline contains the whole skeleton, so nothing is cut and
        // no outlet can be assigned
        let shoreline = rect_shoreline(-1.0, -1.0, 10.0, 10.0);
        let result = prune_delta(
            &mut net,
            &shoreline,
            &[(4.0, 0.0)],
            &PruneParams::default(),
        );
        assert!(matches!(result, Err(Error::Inconsistent(_))));
    }

    #[test]
    fn test_link_dipping_seaward_is_cut() {
        // Braided reach whose lower arc sags past the shoreline while
        // both of its junctions stay inside
        let pixels = [
            (5, 0),
            (5, 1),
            (5, 2),
            (4, 3),
            (3, 4),
            (3, 5),
            (3, 6),
            (4, 7),
            (6, 3),
            (7, 4),
            (8, 5),
            (8, 6),
            (7, 7),
            (6, 8),
            (5, 8),
            (4, 9),
        ];
        let skel = raster_from_pixels(10, 10, &pixels);
        let (mut net, _) = extract_network(&skel).unwrap();

        let shoreline = rect_shoreline(-1.0, -1.0, 10.0, 6.5);
        let report = prune_delta(
            &mut net,
            &shoreline,
            &[(0.0, 5.0)],
            &PruneParams::default(),
        )
        .unwrap();

        // Both junctions of the cut arc become outlets
        assert_eq!(report.outlets.len(), 2);
        let outlet_pixels: Vec<_> = report
            .outlets
            .iter()
            .map(|&id| net.node(id).unwrap().rc)
            .collect();
        assert_eq!(outlet_pixels, vec![(5, 2), (5, 8)]);
        assert_eq!(net.node(report.inlets[0]).unwrap().rc, (5, 0));

        // No surviving link path reaches past the shoreline
        assert!(net
            .links()
            .all(|l| l.idx.iter().all(|&(r, _)| (r as f64) < 6.5)));
        assert_eq!(report.removed_spurs, 1);
    }

    #[test]
    fn test_river_north_south() {
        let pixels: Vec<(usize, usize)> = (0..15).map(|r| (r, 4usize)).collect();
        let skel = raster_from_pixels(15, 9, &pixels);
        let (mut net, _) = extract_network(&skel).unwrap();

        let report = prune_river(
            &mut net,
            "ns".parse().unwrap(),
            skel.shape(),
            &PruneParams::default(),
        )
        .unwrap();

        assert_eq!(net.node(report.inlets[0]).unwrap().rc, (0, 4));
        assert_eq!(net.node(report.outlets[0]).unwrap().rc, (14, 4));
        assert_eq!(net.link_count(), 1);
    }

    #[test]
    fn test_river_diagonal_exit_sides() {
        let pixels: Vec<(usize, usize)> = (0..10).map(|i| (i, i)).collect();
        let skel = raster_from_pixels(10, 10, &pixels);

        for (sides, inlet_rc, outlet_rc) in [
            ("ne", (0usize, 0usize), (9usize, 9usize)),
            ("sw", (9, 9), (0, 0)),
        ] {
            let (mut net, _) = extract_network(&skel).unwrap();
            let report = prune_river(
                &mut net,
                sides.parse().unwrap(),
                skel.shape(),
                &PruneParams::default(),
            )
            .unwrap();
            assert_eq!(net.node(report.inlets[0]).unwrap().rc, inlet_rc, "{sides}");
            assert_eq!(net.node(report.outlets[0]).unwrap().rc, outlet_rc, "{sides}");
        }
    }

    #[test]
    fn test_river_dangling_tip_pruned() {
        // Y shape as a river: the south-west branch becomes the outlet,
        // leaving the south-east branch as a dangling interior tip
        let (mut net, _) = extract_network(&y_skeleton()).unwrap();
        let report = prune_river(
            &mut net,
            "ns".parse().unwrap(),
            (9, 9),
            &PruneParams::default(),
        )
        .unwrap();

        assert_eq!(report.removed_spurs, 1);
        assert_eq!(net.node_count(), 3);
        assert_eq!(net.link_count(), 2);
        // Tie between the two row-7 tips broken by lowest node id
        assert_eq!(net.node(report.outlets[0]).unwrap().rc, (7, 1));
        assert!(net.nodes().all(|n| n.rc != (7, 7)));
    }

    #[test]
    fn test_river_empty_network() {
        let mut net = Network::new();
        let result = prune_river(
            &mut net,
            "ns".parse().unwrap(),
            (10, 10),
            &PruneParams::default(),
        );
        assert!(matches!(result, Err(Error::Precondition { .. })));
    }
}
