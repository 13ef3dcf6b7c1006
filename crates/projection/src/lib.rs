//! Coordinate reference system transformations.
//!
//! Implements the projections the pipeline needs from scratch without
//! external dependencies.

pub mod mercator;
pub mod transform;

pub use mercator::WebMercator;
pub use transform::{site_position, transform_aoi, transform_point, ProjectionError, Transformer};
