//! Error types for rivnet

use thiserror::Error;

/// Main error type for rivnet operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("precondition failed for {operation}: requires {requirement}")]
    Precondition {
        operation: &'static str,
        requirement: &'static str,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid raster dimensions: {rows}x{cols}")]
    InvalidDimensions { rows: usize, cols: usize },

    #[error("index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("{stage} did not converge within {iterations} iterations; partial graph retained")]
    NonConvergence {
        stage: &'static str,
        iterations: usize,
    },

    #[error("graph consistency violation: {0}")]
    Inconsistent(String),
}

impl Error {
    /// Shorthand for a precondition failure.
    pub fn precondition(operation: &'static str, requirement: &'static str) -> Self {
        Error::Precondition {
            operation,
            requirement,
        }
    }
}

/// Result type alias for rivnet operations
pub type Result<T> = std::result::Result<T, Error>;
