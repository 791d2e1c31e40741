//! Flat record tables for network persistence
//!
//! The graph serializes to a node table plus a link table so it can be
//! stored between sessions. Deserialization rebuilds the `Network`
//! through the normal mutation API and re-validates it, so a loaded
//! graph carries the same `conn` consistency guarantees as a freshly
//! computed one.

use crate::error::Result;
use crate::graph::{DirectionState, Network, NodeRole, Pixel};
use serde::{Deserialize, Serialize};

/// Serializable node record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: usize,
    pub row: usize,
    pub col: usize,
    pub conn: Vec<usize>,
    pub role: NodeRole,
}

/// Serializable link record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub id: usize,
    pub conn: [usize; 2],
    pub idx: Vec<Pixel>,
    pub direction: DirectionState,
    pub parallels: Vec<usize>,
}

/// Flat node + link tables for one network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRecords {
    pub nodes: Vec<NodeRecord>,
    pub links: Vec<LinkRecord>,
}

impl NetworkRecords {
    /// Snapshot a network into flat tables (id order).
    pub fn from_network(net: &Network) -> Self {
        let nodes = net
            .nodes()
            .map(|n| NodeRecord {
                id: n.id,
                row: n.rc.0,
                col: n.rc.1,
                conn: n.conn.clone(),
                role: n.role,
            })
            .collect();
        let links = net
            .links()
            .map(|l| LinkRecord {
                id: l.id,
                conn: l.conn,
                idx: l.idx.clone(),
                direction: l.direction,
                parallels: l.parallels.clone(),
            })
            .collect();
        Self { nodes, links }
    }

    /// Rebuild a network from the tables.
    ///
    /// Node and link ids are preserved. The result is validated, so
    /// corrupt tables (dangling conn entries, mismatched paths) fail
    /// with a consistency error instead of producing a broken graph.
    pub fn into_network(self) -> Result<Network> {
        let mut net = Network::new();

        // Ids must survive the round trip exactly, including any gaps
        // left by cleaning and pruning.
        let mut node_records = self.nodes;
        node_records.sort_by_key(|r| r.id);
        for record in node_records {
            net.insert_node_raw(record.id, (record.row, record.col), record.role)?;
        }

        let mut link_records = self.links;
        link_records.sort_by_key(|r| r.id);
        for record in link_records {
            net.insert_link_raw(
                record.id,
                record.conn,
                record.idx,
                record.direction,
                record.parallels,
            )?;
        }

        net.validate()?;
        Ok(net)
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
