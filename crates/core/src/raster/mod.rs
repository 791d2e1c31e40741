//! Raster data structures and skeleton-connectivity helpers

pub mod connectivity;
mod geotransform;
mod grid;

pub use connectivity::{neighbors, pixel_degree, pixel_distance, NEIGHBOR_OFFSETS};
pub use geotransform::GeoTransform;
pub use grid::Raster;
