//! Channel-network graph operations
//!
//! The modules here form the core pipeline, in order: extraction from
//! a skeleton raster, topology cleaning, boundary pruning, flow
//! direction assignment and summary metrics. Each stage operates on
//! the `rivnet_core::Network` graph and can be used standalone; the
//! `pipeline` module wires them together with stage bookkeeping.

pub mod clean;
pub mod directions;
pub mod extract;
pub mod metrics;
pub mod prune;

pub use clean::{clean_network, CleanParams, CleanReport};
pub use directions::{assign_directions, DirectionParams, DirectionReport};
pub use extract::{extract_network, ExtractNetwork, ExtractReport};
pub use metrics::{topologic_metrics, MetricsParams, NetworkMetrics};
pub use prune::{prune_delta, prune_river, ExitSides, PruneParams, PruneReport, Side};
