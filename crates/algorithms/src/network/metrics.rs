//! Topologic and geometric network metrics
//!
//! Summarizes a fully directed network: link lengths in map units,
//! junction angles between arriving and departing flow, and the
//! link-to-node braiding ratio. Requires every link to be directed,
//! since angles and per-junction statistics depend on orientation.

use rivnet_core::{Error, GeoTransform, Link, LinkId, Network, NodeId, NodeRole, Pixel, Result};

/// Parameters for network metrics
#[derive(Debug, Clone)]
pub struct MetricsParams {
    /// Pixels of link path used to estimate tangents at junctions
    pub tangent_window_px: usize,
}

impl Default for MetricsParams {
    fn default() -> Self {
        Self {
            tangent_window_px: 10,
        }
    }
}

/// Summary metrics of a directed channel network
#[derive(Debug, Clone)]
pub struct NetworkMetrics {
    pub node_count: usize,
    pub link_count: usize,
    pub inlet_count: usize,
    pub outlet_count: usize,
    /// Nodes of degree three or more
    pub junction_count: usize,
    /// Per-link length in map units, id order
    pub link_lengths: Vec<(LinkId, f64)>,
    /// Sum of link lengths in map units
    pub total_length: f64,
    pub mean_link_length: f64,
    /// Mean inflow/outflow turning angle per junction, degrees
    pub junction_angles: Vec<(NodeId, f64)>,
    pub mean_junction_angle: Option<f64>,
    /// Link count over node count; grows with braiding intensity
    pub braiding_index: f64,
}

/// Compute summary metrics of a directed network.
///
/// Pixel path lengths are scaled by the transform's cell size; angles
/// come from flow tangents at each junction, so every link must
/// already carry a direction.
pub fn topologic_metrics(
    net: &Network,
    transform: &GeoTransform,
    params: &MetricsParams,
) -> Result<NetworkMetrics> {
    if net.is_empty() {
        return Err(Error::precondition("topologic_metrics", "network is empty"));
    }
    if net.links().any(|l| !l.direction.is_directed()) {
        return Err(Error::precondition(
            "topologic_metrics",
            "all links must be directed",
        ));
    }

    let cell = transform.cell_size();
    let link_lengths: Vec<(LinkId, f64)> = net
        .links()
        .map(|l| (l.id, l.pixel_length() * cell))
        .collect();
    let total_length: f64 = link_lengths.iter().map(|&(_, len)| len).sum();
    let mean_link_length = total_length / link_lengths.len() as f64;

    let mut junction_angles: Vec<(NodeId, f64)> = Vec::new();
    let mut junction_count = 0usize;
    for node in net.nodes() {
        if node.degree() < 3 {
            continue;
        }
        junction_count += 1;
        if let Some(angle) = junction_angle(net, node.id, params.tangent_window_px)? {
            junction_angles.push((node.id, angle));
        }
    }
    let mean_junction_angle = if junction_angles.is_empty() {
        None
    } else {
        Some(junction_angles.iter().map(|&(_, a)| a).sum::<f64>() / junction_angles.len() as f64)
    };

    Ok(NetworkMetrics {
        node_count: net.node_count(),
        link_count: net.link_count(),
        inlet_count: net.nodes_with_role(NodeRole::Inlet).len(),
        outlet_count: net.nodes_with_role(NodeRole::Outlet).len(),
        junction_count,
        total_length,
        mean_link_length,
        junction_angles,
        mean_junction_angle,
        braiding_index: net.link_count() as f64 / net.node_count() as f64,
        link_lengths,
    })
}

/// Mean turning angle between every inflow/outflow pair at a junction,
/// in degrees. `None` when the junction has no such pair (all links
/// flow the same way, as at a flagged conflict).
fn junction_angle(net: &Network, node_id: NodeId, window: usize) -> Result<Option<f64>> {
    let node = net.node(node_id)?;
    let mut inflow_dirs: Vec<(f64, f64)> = Vec::new();
    let mut outflow_dirs: Vec<(f64, f64)> = Vec::new();
    for &lid in &node.conn {
        let link = net.link(lid)?;
        if link.is_self_loop() {
            continue;
        }
        let t = tangent(link, node.rc, window);
        if link.conn[1] == node_id {
            // Arriving flow continues along -t
            inflow_dirs.push((-t.0, -t.1));
        } else {
            outflow_dirs.push(t);
        }
    }
    if inflow_dirs.is_empty() || outflow_dirs.is_empty() {
        return Ok(None);
    }
    let mut sum = 0.0;
    let mut count = 0usize;
    for &inflow in &inflow_dirs {
        for &outflow in &outflow_dirs {
            let dot = (inflow.0 * outflow.0 + inflow.1 * outflow.1).clamp(-1.0, 1.0);
            sum += dot.acos().to_degrees();
            count += 1;
        }
    }
    Ok(Some(sum / count as f64))
}

/// Unit tangent of a link at one endpoint, pointing away from it,
/// as (x, y) with x = column, y = row.
fn tangent(link: &Link, end_rc: Pixel, window: usize) -> (f64, f64) {
    let n = link.idx.len();
    let i = window.clamp(1, n - 1);
    let (from, to) = if link.idx[0] == end_rc {
        (link.idx[0], link.idx[i])
    } else {
        (link.idx[n - 1], link.idx[n - 1 - i])
    };
    let dx = to.1 as f64 - from.1 as f64;
    let dy = to.0 as f64 - from.0 as f64;
    let norm = (dx * dx + dy * dy).sqrt();
    if norm == 0.0 {
        (0.0, 0.0)
    } else {
        (dx / norm, dy / norm)
    }
}
