//! River-specific utilities
//!
//! Channel width estimation and centerline resampling, used alongside
//! the network pipeline for braided river reaches.

pub mod width;

pub use width::{chan_width, resample_line, WidthEstimate};
