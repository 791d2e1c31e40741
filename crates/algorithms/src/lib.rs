//! # rivnet Algorithms
//!
//! Channel-network construction, pruning and flow-direction inference.
//!
//! The pipeline converts a binary skeleton raster into a directed
//! link/node graph:
//!
//! - **network::extract**: skeleton pixels → raw node/link graph
//! - **network::clean**: cycle, duplicate and spur removal
//! - **network::prune**: shoreline (delta) or exit-side (river) trimming
//! - **network::directions**: upstream→downstream orientation of every link
//! - **network::metrics**: topologic/hydraulic summary metrics
//! - **rivers**: centerline width utilities
//! - **pipeline**: `Delta` / `River` stage orchestration

mod maybe_rayon;

pub mod network;
pub mod pipeline;
pub mod rivers;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::network::{
        assign_directions, clean_network, extract_network, prune_delta, prune_river,
        topologic_metrics, CleanParams, DirectionParams, ExitSides, ExtractNetwork, MetricsParams,
        PruneParams, Side,
    };
    pub use crate::pipeline::{Delta, River, Stage};
    pub use rivnet_core::prelude::*;
}
