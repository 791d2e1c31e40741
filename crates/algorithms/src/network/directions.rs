//! Flow direction assignment
//!
//! Orients every link upstream to downstream (`conn[0]` upstream)
//! using a fixed hierarchy of rules. Inlet- and outlet-adjacent links
//! are locked first; the remaining links are resolved iteratively:
//!
//! 1. continuity: flow passes straight through a degree-2 node whose
//!    other link is locked;
//! 2. conservation: a junction with exactly one unresolved link and
//!    all locked links flowing the same way must balance;
//! 3. alignment: the orientation whose tangents continue the flow of
//!    directed neighbors most smoothly wins (braid partners are not
//!    counted as evidence here);
//! 4. parallel: an otherwise unresolvable braid copies the direction
//!    of a directed partner.
//!
//! Locked states are never revised; tentative ones only by a
//! higher-priority rule. Ties and locked contradictions are flagged
//! in the report rather than treated as fatal, mirroring how field
//! data behaves around flow splits; links with no evidence at all are
//! reported undirected, never guessed. Only hitting the iteration cap
//! while passes are still making changes is an error, with the
//! partially directed graph retained.

use rivnet_core::{
    DirectionRule, DirectionState, Error, Link, LinkId, Network, NodeId, NodeRole, Pixel, Result,
};

/// Parameters for direction assignment
#[derive(Debug, Clone)]
pub struct DirectionParams {
    /// Pixels of link path used to estimate endpoint tangents
    pub alignment_window_px: usize,
    /// Maximum resolution passes before giving up
    pub max_iterations: usize,
}

impl Default for DirectionParams {
    fn default() -> Self {
        Self {
            alignment_window_px: 10,
            max_iterations: 50,
        }
    }
}

/// Summary of one direction-assignment run
#[derive(Debug, Clone, Default)]
pub struct DirectionReport {
    pub iterations: usize,
    /// Links locked from inlet/outlet adjacency
    pub seeded: usize,
    pub by_continuity: usize,
    pub by_conservation: usize,
    pub by_alignment: usize,
    pub by_parallel: usize,
    /// Links whose direction evidence was contradictory or tied
    pub conflicting: Vec<LinkId>,
    /// Links left undirected for lack of any evidence (disconnected
    /// from every inlet and outlet)
    pub undirected: Vec<LinkId>,
}

enum Applied {
    Changed,
    NoChange,
    Conflict,
}

/// Assign flow directions to every link of a pruned network.
pub fn assign_directions(net: &mut Network, params: &DirectionParams) -> Result<DirectionReport> {
    if net.is_empty() {
        return Err(Error::precondition("assign_directions", "network is empty"));
    }
    let inlets = net.nodes_with_role(NodeRole::Inlet);
    let outlets = net.nodes_with_role(NodeRole::Outlet);
    if inlets.is_empty() {
        return Err(Error::precondition(
            "assign_directions",
            "network has no inlet nodes",
        ));
    }
    if outlets.is_empty() {
        return Err(Error::precondition(
            "assign_directions",
            "network has no outlet nodes",
        ));
    }

    let mut report = DirectionReport::default();

    // Boundary seeds: away from inlets, toward outlets
    for inlet in inlets {
        for lid in net.node(inlet)?.conn.clone() {
            if net.link(lid)?.direction.is_locked() {
                continue;
            }
            net.orient_link(lid, inlet)?;
            net.link_mut(lid)?.direction = DirectionState::Locked(DirectionRule::InletSeed);
            report.seeded += 1;
        }
    }
    for outlet in outlets {
        for lid in net.node(outlet)?.conn.clone() {
            let link = net.link(lid)?;
            if link.direction.is_locked() {
                // An inlet-to-outlet link was already seeded the same way
                if link.conn[1] != outlet && !link.is_self_loop() {
                    report.conflicting.push(lid);
                }
                continue;
            }
            let Some(upstream) = link.other_end(outlet) else {
                continue;
            };
            net.orient_link(lid, upstream)?;
            net.link_mut(lid)?.direction = DirectionState::Locked(DirectionRule::OutletSeed);
            report.seeded += 1;
        }
    }

    // A loop link has no meaningful orientation; keep it out of the
    // resolution loop and flag it
    for lid in net.link_ids() {
        let link = net.link_mut(lid)?;
        if link.is_self_loop() && !link.direction.is_directed() {
            link.direction = DirectionState::Tentative(DirectionRule::Alignment);
            report.conflicting.push(lid);
        }
    }

    let mut converged = false;
    for iteration in 1..=params.max_iterations {
        report.iterations = iteration;
        let mut changed = false;

        continuity_pass(net, &mut report, &mut changed)?;
        conservation_pass(net, &mut report, &mut changed)?;
        alignment_pass(net, params.alignment_window_px, &mut report, &mut changed)?;
        parallel_pass(net, &mut report, &mut changed)?;

        if !changed {
            converged = true;
            break;
        }
    }

    report.conflicting.sort_unstable();
    report.conflicting.dedup();

    if !converged {
        return Err(Error::NonConvergence {
            stage: "assign_directions",
            iterations: params.max_iterations,
        });
    }
    report.undirected = net
        .links()
        .filter(|l| !l.direction.is_directed())
        .map(|l| l.id)
        .collect();

    net.validate()?;
    Ok(report)
}

/// Set `upstream` as the first endpoint of `lid` under `rule`.
///
/// Locked links are never re-oriented; a contradiction is reported
/// back to the caller. Tentative states only yield to strictly
/// higher-priority rules.
fn apply_rule(
    net: &mut Network,
    lid: LinkId,
    upstream: NodeId,
    rule: DirectionRule,
    lock: bool,
) -> Result<Applied> {
    let link = net.link(lid)?;
    if link.direction.is_locked() {
        return Ok(if link.conn[0] == upstream {
            Applied::NoChange
        } else {
            Applied::Conflict
        });
    }
    if !lock && link.direction.priority() >= rule.priority() {
        return Ok(Applied::NoChange);
    }
    let new_state = if lock {
        DirectionState::Locked(rule)
    } else {
        DirectionState::Tentative(rule)
    };
    if link.conn[0] == upstream && link.direction == new_state {
        return Ok(Applied::NoChange);
    }
    net.orient_link(lid, upstream)?;
    net.link_mut(lid)?.direction = new_state;
    Ok(Applied::Changed)
}

fn continuity_pass(net: &mut Network, report: &mut DirectionReport, changed: &mut bool) -> Result<()> {
    for node_id in net.node_ids() {
        let conn = net.node(node_id)?.conn.clone();
        let [a, b] = conn[..] else { continue };
        if a == b {
            continue;
        }
        // Two links over the same endpoint pair form a degenerate
        // braid, not a pass-through
        let (la, lb) = (net.link(a)?.conn, net.link(b)?.conn);
        if (la[0].min(la[1]), la[0].max(la[1])) == (lb[0].min(lb[1]), lb[0].max(lb[1])) {
            continue;
        }
        for (locked_id, other_id) in [(a, b), (b, a)] {
            let locked = net.link(locked_id)?;
            if !locked.direction.is_locked() || locked.is_self_loop() {
                continue;
            }
            let flows_in = locked.conn[1] == node_id;
            let other = net.link(other_id)?;
            let upstream = if flows_in {
                node_id
            } else {
                match other.other_end(node_id) {
                    Some(n) => n,
                    None => continue,
                }
            };
            match apply_rule(net, other_id, upstream, DirectionRule::Continuity, true)? {
                Applied::Changed => {
                    report.by_continuity += 1;
                    *changed = true;
                }
                Applied::Conflict => report.conflicting.push(other_id),
                Applied::NoChange => {}
            }
        }
    }
    Ok(())
}

fn conservation_pass(
    net: &mut Network,
    report: &mut DirectionReport,
    changed: &mut bool,
) -> Result<()> {
    'nodes: for node_id in net.node_ids() {
        let conn = net.node(node_id)?.conn.clone();
        if conn.len() < 3 {
            continue;
        }
        let mut unresolved: Option<LinkId> = None;
        let mut locked_in = 0usize;
        let mut locked_out = 0usize;
        for &lid in &conn {
            let link = net.link(lid)?;
            if link.is_self_loop() {
                continue 'nodes;
            }
            if link.direction.is_locked() {
                if link.conn[1] == node_id {
                    locked_in += 1;
                } else {
                    locked_out += 1;
                }
            } else if unresolved.replace(lid).is_some() {
                continue 'nodes;
            }
        }
        let Some(lid) = unresolved else { continue };
        // Flow must balance: all others in means this one leaves
        let upstream = if locked_out == 0 && locked_in > 0 {
            node_id
        } else if locked_in == 0 && locked_out > 0 {
            match net.link(lid)?.other_end(node_id) {
                Some(n) => n,
                None => continue,
            }
        } else {
            continue;
        };
        match apply_rule(net, lid, upstream, DirectionRule::Conservation, true)? {
            Applied::Changed => {
                report.by_conservation += 1;
                *changed = true;
            }
            Applied::Conflict => report.conflicting.push(lid),
            Applied::NoChange => {}
        }
    }
    Ok(())
}

fn alignment_pass(
    net: &mut Network,
    window: usize,
    report: &mut DirectionReport,
    changed: &mut bool,
) -> Result<()> {
    for lid in net.link_ids() {
        let link = net.link(lid)?;
        if link.is_self_loop() || link.direction.priority() >= DirectionRule::Alignment.priority() {
            continue;
        }
        let (a, b) = (link.conn[0], link.conn[1]);
        let (score_a, seen_a) = orientation_score(net, lid, a, b, window)?;
        let (score_b, seen_b) = orientation_score(net, lid, b, a, window)?;
        if !seen_a && !seen_b {
            continue;
        }
        if (score_a - score_b).abs() < 1e-9 {
            report.conflicting.push(lid);
            continue;
        }
        let upstream = if score_a > score_b { a } else { b };
        match apply_rule(net, lid, upstream, DirectionRule::Alignment, false)? {
            Applied::Changed => {
                report.by_alignment += 1;
                *changed = true;
            }
            Applied::Conflict => report.conflicting.push(lid),
            Applied::NoChange => {}
        }
    }
    Ok(())
}

fn parallel_pass(net: &mut Network, report: &mut DirectionReport, changed: &mut bool) -> Result<()> {
    for lid in net.link_ids() {
        let link = net.link(lid)?;
        if link.direction.is_directed() || link.parallels.is_empty() {
            continue;
        }
        let upstream = link
            .parallels
            .iter()
            .filter_map(|&pid| net.link(pid).ok())
            .find(|p| p.direction.is_directed() && !p.is_self_loop())
            .map(|p| p.conn[0]);
        let Some(upstream) = upstream else { continue };
        match apply_rule(net, lid, upstream, DirectionRule::Parallel, false)? {
            Applied::Changed => {
                report.by_parallel += 1;
                *changed = true;
            }
            Applied::Conflict => report.conflicting.push(lid),
            Applied::NoChange => {}
        }
    }
    Ok(())
}

/// Smooth-continuation score for orienting a link from `upstream` to
/// `downstream`, plus whether any directed neighbor contributed.
///
/// Inflows at the upstream end and outflows at the downstream end
/// support the orientation, weighted by tangent alignment. The link's
/// own braid partners are excluded; their agreement is handled by the
/// parallel rule instead.
fn orientation_score(
    net: &Network,
    lid: LinkId,
    upstream: NodeId,
    downstream: NodeId,
    window: usize,
) -> Result<(f64, bool)> {
    let link = net.link(lid)?;
    let mut score = 0.0;
    let mut seen = false;

    for (node_id, want_inflow) in [(upstream, true), (downstream, false)] {
        let node = net.node(node_id)?;
        let t_link = tangent(link, node.rc, window);
        let mut best: Option<f64> = None;
        for &nid in &node.conn {
            if nid == lid || link.parallels.contains(&nid) {
                continue;
            }
            let neighbor = net.link(nid)?;
            if neighbor.is_self_loop() || !neighbor.direction.is_directed() {
                continue;
            }
            let flows_in = neighbor.conn[1] == node_id;
            if flows_in != want_inflow {
                continue;
            }
            let t_nbr = tangent(neighbor, node.rc, window);
            // Inflow arrives along -t_nbr and continues along t_link;
            // outflow leaves along t_nbr continuing -t_link arrival
            let dot = if want_inflow {
                -(t_nbr.0 * t_link.0 + t_nbr.1 * t_link.1)
            } else {
                -(t_link.0 * t_nbr.0 + t_link.1 * t_nbr.1)
            };
            best = Some(best.map_or(dot, |b: f64| b.max(dot)));
        }
        if let Some(b) = best {
            score += b;
            seen = true;
        }
    }
    Ok((score, seen))
}

/// Unit tangent of a link at one of its endpoints, pointing away from
/// the endpoint, averaged over up to `window` path pixels. Returned as
/// (x, y) with x = column, y = row.
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
