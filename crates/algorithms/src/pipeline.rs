//! Pipeline orchestration
//!
//! `Delta` and `River` wrap the network stages with the bookkeeping a
//! study site needs: which stage has run, the cleaning configuration,
//! and persistence of the graph between sessions. Stages must run in
//! order; calling one before its predecessor is a precondition error.

use crate::network::{
    assign_directions, clean_network, extract_network, prune_delta, prune_river, topologic_metrics,
    CleanParams, CleanReport, DirectionParams, DirectionReport, ExitSides, MetricsParams,
    NetworkMetrics, PruneParams, PruneReport,
};
use geo::Polygon;
use rivnet_core::{Error, Network, NetworkRecords, NodeRole, Raster, Result};
use std::path::Path;

/// Progress of a pipeline through its stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Initialized,
    NetworkComputed,
    Pruned,
    Directed,
}

/// State shared by both pipeline kinds.
#[derive(Debug, Clone)]
struct PipelineCore {
    skeleton: Raster<u8>,
    net: Network,
    stage: Stage,
    clean_params: CleanParams,
}

impl PipelineCore {
    fn new(skeleton: Raster<u8>) -> Self {
        Self {
            skeleton,
            net: Network::new(),
            stage: Stage::Initialized,
            clean_params: CleanParams::default(),
        }
    }

    fn require(&self, operation: &'static str, needed: Stage, hint: &'static str) -> Result<()> {
        if self.stage < needed {
            return Err(Error::precondition(operation, hint));
        }
        Ok(())
    }

    fn compute_network(&mut self) -> Result<CleanReport> {
        let (mut net, _) = extract_network(&self.skeleton)?;
        let report = clean_network(&mut net, &self.clean_params)?;
        self.net = net;
        self.stage = Stage::NetworkComputed;
        Ok(report)
    }

    fn assign_flow_directions(&mut self, params: &DirectionParams) -> Result<DirectionReport> {
        self.require(
            "assign_flow_directions",
            Stage::Pruned,
            "run prune_network first",
        )?;
        let report = assign_directions(&mut self.net, params)?;
        self.stage = Stage::Directed;
        Ok(report)
    }

    fn compute_metrics(&self, params: &MetricsParams) -> Result<NetworkMetrics> {
        self.require(
            "compute_metrics",
            Stage::Directed,
            "run assign_flow_directions first",
        )?;
        topologic_metrics(&self.net, self.skeleton.transform(), params)
    }

    fn save_network(&self, path: &Path) -> Result<()> {
        self.require("save_network", Stage::NetworkComputed, "run compute_network first")?;
        let json = NetworkRecords::from_network(&self.net).to_json()?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn load_network(&mut self, path: &Path) -> Result<()> {
        let json = std::fs::read_to_string(path)?;
        self.net = NetworkRecords::from_json(&json)?.into_network()?;
        self.stage = infer_stage(&self.net);
        Ok(())
    }
}

/// Reconstruct pipeline progress from a loaded graph's own state.
fn infer_stage(net: &Network) -> Stage {
    if net.is_empty() {
        return Stage::NetworkComputed;
    }
    let has_boundaries = !net.nodes_with_role(NodeRole::Inlet).is_empty()
        && !net.nodes_with_role(NodeRole::Outlet).is_empty();
    if !has_boundaries {
        return Stage::NetworkComputed;
    }
    if net.links().all(|l| l.direction.is_directed()) {
        Stage::Directed
    } else {
        Stage::Pruned
    }
}

/// Channel-network pipeline for a river delta.
///
/// Pruning is controlled by a shoreline polygon and the approximate
/// inlet locations, both in pixel coordinates (x = column, y = row).
#[derive(Debug, Clone)]
pub struct Delta {
    core: PipelineCore,
    shoreline: Polygon<f64>,
    inlets: Vec<(f64, f64)>,
}

impl Delta {
    pub fn new(skeleton: Raster<u8>, shoreline: Polygon<f64>, inlets: Vec<(f64, f64)>) -> Self {
        Self {
            core: PipelineCore::new(skeleton),
            shoreline,
            inlets,
        }
    }

    /// Replace the default cleaning configuration.
    pub fn with_clean_params(mut self, params: CleanParams) -> Self {
        self.core.clean_params = params;
        self
    }

    /// Extract and clean the network from the skeleton.
    pub fn compute_network(&mut self) -> Result<CleanReport> {
        self.core.compute_network()
    }

    /// Trim to the shoreline and assign inlet/outlet roles.
    pub fn prune_network(&mut self, params: &PruneParams) -> Result<PruneReport> {
        self.core
            .require("prune_network", Stage::NetworkComputed, "run compute_network first")?;
        let report = prune_delta(&mut self.core.net, &self.shoreline, &self.inlets, params)?;
        self.core.stage = Stage::Pruned;
        Ok(report)
    }

    /// Orient every link upstream to downstream.
    pub fn assign_flow_directions(&mut self, params: &DirectionParams) -> Result<DirectionReport> {
        self.core.assign_flow_directions(params)
    }

    /// Summary metrics of the directed network.
    pub fn compute_metrics(&self, params: &MetricsParams) -> Result<NetworkMetrics> {
        self.core.compute_metrics(params)
    }

    pub fn network(&self) -> &Network {
        &self.core.net
    }

    pub fn stage(&self) -> Stage {
        self.core.stage
    }

    /// Persist the current graph as JSON records.
    pub fn save_network(&self, path: &Path) -> Result<()> {
        self.core.save_network(path)
    }

    /// Restore a previously saved graph; the stage is inferred from
    /// the loaded graph's roles and direction states.
    pub fn load_network(&mut self, path: &Path) -> Result<()> {
        self.core.load_network(path)
    }
}

/// Channel-network pipeline for a braided river reach.
///
/// Pruning is controlled by the two borders flow crosses, e.g. "ns"
/// for a reach flowing north to south.
#[derive(Debug, Clone)]
pub struct River {
    core: PipelineCore,
    exit_sides: ExitSides,
}

impl River {
    pub fn new(skeleton: Raster<u8>, exit_sides: ExitSides) -> Self {
        Self {
            core: PipelineCore::new(skeleton),
            exit_sides,
        }
    }

    /// Replace the default cleaning configuration.
    pub fn with_clean_params(mut self, params: CleanParams) -> Self {
        self.core.clean_params = params;
        self
    }

    /// Extract and clean the network from the skeleton.
    pub fn compute_network(&mut self) -> Result<CleanReport> {
        self.core.compute_network()
    }

    /// Assign the inlet and outlet from the exit sides and trim.
    pub fn prune_network(&mut self, params: &PruneParams) -> Result<PruneReport> {
        self.core
            .require("prune_network", Stage::NetworkComputed, "run compute_network first")?;
        let shape = self.core.skeleton.shape();
        let report = prune_river(&mut self.core.net, self.exit_sides, shape, params)?;
        self.core.stage = Stage::Pruned;
        Ok(report)
    }

    /// Orient every link upstream to downstream.
    pub fn assign_flow_directions(&mut self, params: &DirectionParams) -> Result<DirectionReport> {
        self.core.assign_flow_directions(params)
    }

    /// Summary metrics of the directed network.
    pub fn compute_metrics(&self, params: &MetricsParams) -> Result<NetworkMetrics> {
        self.core.compute_metrics(params)
    }

    pub fn network(&self) -> &Network {
        &self.core.net
    }

    pub fn stage(&self) -> Stage {
        self.core.stage
    }

    /// Persist the current graph as JSON records.
    pub fn save_network(&self, path: &Path) -> Result<()> {
        self.core.save_network(path)
    }

    /// Restore a previously saved graph; the stage is inferred from
    /// the loaded graph's roles and direction states.
    pub fn load_network(&mut self, path: &Path) -> Result<()> {
        self.core.load_network(path)
    }
}
