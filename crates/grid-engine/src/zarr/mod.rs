//! Zarr V3 storage of grids and aggregated products.
//!
//! Arrays are `float32` with a NaN fill value, either 2-D `[rows, cols]` or
//! 3-D `[bands, rows, cols]`. Spatial reference and provenance live in the
//! array attributes.

pub mod attributes;
pub mod reader;
pub mod writer;

pub use attributes::{GridAttributes, ProductLabels};
pub use reader::{read_attributes, read_band, read_grid};
pub use writer::{ZarrGridWriter, ZarrWriteResult};
