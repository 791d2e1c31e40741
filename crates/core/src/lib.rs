//! # rivnet Core
//!
//! Core types for the rivnet channel-network library.
//!
//! This crate provides:
//! - `Raster<T>`: binary skeleton/mask grid with georeferencing
//! - `GeoTransform`: affine transform for pixel/geo conversion
//! - 8-connectivity helpers for skeleton walking
//! - `Network`, `Node`, `Link`: the channel-network graph with its
//!   `conn` consistency invariants
//! - Flat record tables for persisting a network between sessions
//! - The error taxonomy shared by all pipeline stages

pub mod error;
pub mod graph;
pub mod raster;

pub use error::{Error, Result};
pub use graph::{
    DirectionRule, DirectionState, Link, LinkId, Network, NetworkRecords, Node, NodeId, NodeRole,
    Pixel,
};
pub use raster::{GeoTransform, Raster};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::graph::{
        DirectionRule, DirectionState, Link, LinkId, Network, NetworkRecords, Node, NodeId,
        NodeRole, Pixel,
    };
    pub use crate::raster::{GeoTransform, Raster};
    pub use crate::Algorithm;
}

/// Core trait for pipeline operations.
///
/// Operations are pure transformations of input data according to
/// parameters; stateful orchestration lives in the pipeline types.
pub trait Algorithm {
    /// Input type for the operation
    type Input;
    /// Output type for the operation
    type Output;
    /// Parameters controlling behavior
    type Params: Default;
    /// Error type
    type Error: std::error::Error;

    /// Returns the operation name
    fn name(&self) -> &'static str;

    /// Returns a description of what the operation does
    fn description(&self) -> &'static str;

    /// Execute the operation
    fn execute(
        &self,
        input: Self::Input,
        params: Self::Params,
    ) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
