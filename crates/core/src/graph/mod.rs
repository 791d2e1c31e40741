//! Channel-network graph entities
//!
//! The network is stored as two id-keyed tables: nodes (junctions,
//! endpoints, inlets, outlets) and links (channel segments with an
//! ordered pixel path). `BTreeMap` keys keep every iteration in id
//! order so that all downstream algorithms are deterministic.
//!
//! The central invariant is mutual `conn` consistency: a node's `conn`
//! list holds exactly the ids of the links that reference it, and each
//! link's endpoint pair names existing nodes whose pixel coordinates
//! match the ends of the link's pixel path. [`Network::validate`]
//! checks all of this and is run after every mutating pipeline stage.

mod records;

pub use records::{LinkRecord, NetworkRecords, NodeRecord};

use crate::error::{Error, Result};
use crate::raster::pixel_distance;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Node id within a [`Network`]
pub type NodeId = usize;
/// Link id within a [`Network`]
pub type LinkId = usize;
/// Pixel coordinate as (row, col)
pub type Pixel = (usize, usize);

/// Hydrological role of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodeRole {
    /// Junction or interior endpoint
    #[default]
    Interior,
    /// Flow enters the network here
    Inlet,
    /// Flow exits the network here
    Outlet,
}

/// Heuristic that fixed a link's direction, in decreasing certainty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectionRule {
    /// Adjacent to a known inlet, directed away from it
    InletSeed,
    /// Adjacent to a known outlet, directed toward it
    OutletSeed,
    /// Continues a locked link through a degree-2 node
    Continuity,
    /// Flow conservation at a junction with one unresolved link
    Conservation,
    /// Tangent alignment with the best-aligned directed neighbor
    Alignment,
    /// Agreement with a directed braided partner
    Parallel,
}

impl DirectionRule {
    /// Rule priority; higher values may override lower tentative ones.
    pub fn priority(&self) -> u8 {
        match self {
            DirectionRule::InletSeed | DirectionRule::OutletSeed => 6,
            DirectionRule::Continuity => 4,
            DirectionRule::Conservation => 3,
            DirectionRule::Alignment => 2,
            DirectionRule::Parallel => 1,
        }
    }
}

/// Per-link direction state machine.
///
/// Links start `Undirected`. A heuristic either locks the direction
/// (never revisited) or assigns it tentatively, in which case a
/// higher-priority rule may still revise it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DirectionState {
    #[default]
    Undirected,
    Tentative(DirectionRule),
    Locked(DirectionRule),
}

impl DirectionState {
    /// Whether a direction has been assigned (tentatively or locked)
    pub fn is_directed(&self) -> bool {
        !matches!(self, DirectionState::Undirected)
    }

    /// Whether the direction is locked
    pub fn is_locked(&self) -> bool {
        matches!(self, DirectionState::Locked(_))
    }

    /// Priority of the assigning rule, 0 if undirected
    pub fn priority(&self) -> u8 {
        match self {
            DirectionState::Undirected => 0,
            DirectionState::Tentative(rule) | DirectionState::Locked(rule) => rule.priority(),
        }
    }
}

/// A graph vertex: endpoint, junction, inlet or outlet.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    /// Pixel coordinate (row, col)
    pub rc: Pixel,
    /// Ids of incident links
    pub conn: Vec<LinkId>,
    pub role: NodeRole,
}

impl Node {
    /// Number of incident links
    pub fn degree(&self) -> usize {
        self.conn.len()
    }
}

/// A graph edge: one channel segment between two nodes.
///
/// `idx` traces the segment pixel by pixel; `idx[0]` lies at the pixel
/// of node `conn[0]` and the last entry at `conn[1]`. Once a direction
/// is assigned, `conn[0]` is the upstream node and `idx` runs
/// upstream to downstream.
#[derive(Debug, Clone)]
pub struct Link {
    pub id: LinkId,
    /// Endpoint node ids (upstream, downstream once directed)
    pub conn: [NodeId; 2],
    /// Ordered pixel path including both endpoint pixels
    pub idx: Vec<Pixel>,
    pub direction: DirectionState,
    /// Ids of links forming a braid with this one (same endpoint pair)
    pub parallels: Vec<LinkId>,
}

impl Link {
    /// Path length in pixels (sum of consecutive pixel distances)
    pub fn pixel_length(&self) -> f64 {
        self.idx
            .windows(2)
            .map(|w| pixel_distance(w[0], w[1]))
            .sum()
    }

    /// Whether both endpoints are the same node
    pub fn is_self_loop(&self) -> bool {
        self.conn[0] == self.conn[1]
    }

    /// The endpoint opposite to `node`, if `node` is an endpoint
    pub fn other_end(&self, node: NodeId) -> Option<NodeId> {
        if self.conn[0] == node {
            Some(self.conn[1])
        } else if self.conn[1] == node {
            Some(self.conn[0])
        } else {
            None
        }
    }
}

/// The channel network: id-keyed node and link tables.
#[derive(Debug, Clone, Default)]
pub struct Network {
    nodes: BTreeMap<NodeId, Node>,
    links: BTreeMap<LinkId, Link>,
    next_node_id: NodeId,
    next_link_id: LinkId,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of links
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Whether the network has no links
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Add a node at the given pixel, returning its id
    pub fn add_node(&mut self, rc: Pixel) -> NodeId {
        let id = self.next_node_id;
        self.next_node_id += 1;
        self.nodes.insert(
            id,
            Node {
                id,
                rc,
                conn: Vec::new(),
                role: NodeRole::Interior,
            },
        );
        id
    }

    /// Add a link between two existing nodes.
    ///
    /// `idx` must start at the pixel of `from` and end at the pixel of
    /// `to`. Both nodes' `conn` lists are updated.
    pub fn add_link(&mut self, from: NodeId, to: NodeId, idx: Vec<Pixel>) -> Result<LinkId> {
        let from_rc = self
            .nodes
            .get(&from)
            .ok_or_else(|| Error::Inconsistent(format!("unknown node {from}")))?
            .rc;
        let to_rc = self
            .nodes
            .get(&to)
            .ok_or_else(|| Error::Inconsistent(format!("unknown node {to}")))?
            .rc;
        if idx.len() < 2 {
            return Err(Error::Inconsistent(format!(
                "link path between nodes {from} and {to} has {} pixels",
                idx.len()
            )));
        }
        if idx[0] != from_rc || *idx.last().unwrap() != to_rc {
            return Err(Error::Inconsistent(format!(
                "link path endpoints do not match nodes {from} and {to}"
            )));
        }

        let id = self.next_link_id;
        self.next_link_id += 1;
        self.links.insert(
            id,
            Link {
                id,
                conn: [from, to],
                idx,
                direction: DirectionState::Undirected,
                parallels: Vec::new(),
            },
        );
        self.nodes.get_mut(&from).unwrap().conn.push(id);
        if to != from {
            self.nodes.get_mut(&to).unwrap().conn.push(id);
        }
        Ok(id)
    }

    /// Insert a node with an explicit id (record rebuild only).
    pub(crate) fn insert_node_raw(&mut self, id: NodeId, rc: Pixel, role: NodeRole) -> Result<()> {
        if self.nodes.contains_key(&id) {
            return Err(Error::Inconsistent(format!("duplicate node id {id}")));
        }
        self.nodes.insert(
            id,
            Node {
                id,
                rc,
                conn: Vec::new(),
                role,
            },
        );
        self.next_node_id = self.next_node_id.max(id + 1);
        Ok(())
    }

    /// Insert a link with an explicit id (record rebuild only).
    ///
    /// Endpoint nodes must already exist; their `conn` lists are
    /// updated. Path/endpoint agreement is checked by the caller's
    /// final `validate()`.
    pub(crate) fn insert_link_raw(
        &mut self,
        id: LinkId,
        conn: [NodeId; 2],
        idx: Vec<Pixel>,
        direction: DirectionState,
        parallels: Vec<LinkId>,
    ) -> Result<()> {
        if self.links.contains_key(&id) {
            return Err(Error::Inconsistent(format!("duplicate link id {id}")));
        }
        for node_id in [conn[0], conn[1]] {
            if !self.nodes.contains_key(&node_id) {
                return Err(Error::Inconsistent(format!(
                    "link {id} references missing node {node_id}"
                )));
            }
        }
        self.links.insert(
            id,
            Link {
                id,
                conn,
                idx,
                direction,
                parallels,
            },
        );
        self.nodes.get_mut(&conn[0]).unwrap().conn.push(id);
        if conn[1] != conn[0] {
            self.nodes.get_mut(&conn[1]).unwrap().conn.push(id);
        }
        self.next_link_id = self.next_link_id.max(id + 1);
        Ok(())
    }

    /// Remove a link, updating both endpoints' `conn` lists.
    pub fn remove_link(&mut self, id: LinkId) -> Result<Link> {
        let link = self
            .links
            .remove(&id)
            .ok_or_else(|| Error::Inconsistent(format!("unknown link {id}")))?;
        for node_id in [link.conn[0], link.conn[1]] {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.conn.retain(|&l| l != id);
            }
        }
        Ok(link)
    }

    /// Remove a node and all of its incident links.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let conn = self
            .nodes
            .get(&id)
            .ok_or_else(|| Error::Inconsistent(format!("unknown node {id}")))?
            .conn
            .clone();
        for link_id in conn {
            self.remove_link(link_id)?;
        }
        self.nodes.remove(&id);
        Ok(())
    }

    /// Drop all nodes with no incident links.
    pub fn remove_orphan_nodes(&mut self) -> usize {
        let orphans: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.conn.is_empty())
            .map(|n| n.id)
            .collect();
        for id in &orphans {
            self.nodes.remove(id);
        }
        orphans.len()
    }

    /// Node accessor
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(&id)
            .ok_or_else(|| Error::Inconsistent(format!("unknown node {id}")))
    }

    /// Mutable node accessor
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| Error::Inconsistent(format!("unknown node {id}")))
    }

    /// Link accessor
    pub fn link(&self, id: LinkId) -> Result<&Link> {
        self.links
            .get(&id)
            .ok_or_else(|| Error::Inconsistent(format!("unknown link {id}")))
    }

    /// Mutable link accessor
    pub fn link_mut(&mut self, id: LinkId) -> Result<&mut Link> {
        self.links
            .get_mut(&id)
            .ok_or_else(|| Error::Inconsistent(format!("unknown link {id}")))
    }

    /// Iterate nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Iterate links in id order
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Node ids in id order
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    /// Link ids in id order
    pub fn link_ids(&self) -> Vec<LinkId> {
        self.links.keys().copied().collect()
    }

    /// Nodes with a given role, in id order
    pub fn nodes_with_role(&self, role: NodeRole) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.role == role)
            .map(|n| n.id)
            .collect()
    }

    /// Orient a link so that `upstream` is its first endpoint,
    /// reversing the pixel path if necessary.
    pub fn orient_link(&mut self, id: LinkId, upstream: NodeId) -> Result<()> {
        let link = self.link_mut(id)?;
        if link.conn[0] == upstream {
            return Ok(());
        }
        if link.conn[1] != upstream {
            return Err(Error::Inconsistent(format!(
                "node {upstream} is not an endpoint of link {id}"
            )));
        }
        link.conn.swap(0, 1);
        link.idx.reverse();
        Ok(())
    }

    /// Check mutual `conn` consistency and path/endpoint agreement.
    pub fn validate(&self) -> Result<()> {
        for link in self.links.values() {
            for (end, &node_id) in link.conn.iter().enumerate() {
                let node = self.nodes.get(&node_id).ok_or_else(|| {
                    Error::Inconsistent(format!(
                        "link {} references missing node {node_id}",
                        link.id
                    ))
                })?;
                if !node.conn.contains(&link.id) {
                    return Err(Error::Inconsistent(format!(
                        "node {node_id} does not list incident link {}",
                        link.id
                    )));
                }
                let expected = if end == 0 {
                    link.idx.first()
                } else {
                    link.idx.last()
                };
                if expected != Some(&node.rc) {
                    return Err(Error::Inconsistent(format!(
                        "link {} path does not end at node {node_id}",
                        link.id
                    )));
                }
            }
        }
        for node in self.nodes.values() {
            if node.conn.is_empty() {
                return Err(Error::Inconsistent(format!("node {} is isolated", node.id)));
            }
            for &link_id in &node.conn {
                let link = self.links.get(&link_id).ok_or_else(|| {
                    Error::Inconsistent(format!(
                        "node {} references missing link {link_id}",
                        node.id
                    ))
                })?;
                if !link.conn.contains(&node.id) {
                    return Err(Error::Inconsistent(format!(
                        "link {link_id} does not reference node {}",
                        node.id
                    )));
                }
            }
        }
        Ok(())
    }
}
