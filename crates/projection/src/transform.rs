//! Point and polygon transforms between supported reference systems.
//!
//! The available paths are identity, geographic (EPSG:4326 / EPSG:4269,
//! treated as the same datum) and Web Mercator. EPSG:5070 is recognised but
//! has no transform path.

use precip_common::{AreaOfInterest, CrsCode, Site};

use crate::mercator::WebMercator;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("No transform path from {from} to {to}")]
    NoTransformPath { from: CrsCode, to: CrsCode },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Path {
    Identity,
    GeographicToMercator,
    MercatorToGeographic,
}

/// A resolved transform between two reference systems.
#[derive(Debug, Clone, Copy)]
pub struct Transformer {
    path: Path,
}

impl Transformer {
    /// Resolve the path from `from` to `to`.
    pub fn new(from: CrsCode, to: CrsCode) -> Result<Self, ProjectionError> {
        let path = if from == to || (from.is_geographic() && to.is_geographic()) {
            Path::Identity
        } else if from.is_geographic() && to == CrsCode::Epsg3857 {
            Path::GeographicToMercator
        } else if from == CrsCode::Epsg3857 && to.is_geographic() {
            Path::MercatorToGeographic
        } else {
            return Err(ProjectionError::NoTransformPath { from, to });
        };
        Ok(Self { path })
    }

    pub fn is_identity(&self) -> bool {
        self.path == Path::Identity
    }

    /// Transform one coordinate pair.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        match self.path {
            Path::Identity => (x, y),
            Path::GeographicToMercator => WebMercator.forward(x, y),
            Path::MercatorToGeographic => WebMercator.inverse(x, y),
        }
    }
}

/// Transform a single point.
pub fn transform_point(
    x: f64,
    y: f64,
    from: CrsCode,
    to: CrsCode,
) -> Result<(f64, f64), ProjectionError> {
    Ok(Transformer::new(from, to)?.apply(x, y))
}

/// Reproject every vertex of an AOI into `target`.
pub fn transform_aoi(
    aoi: &AreaOfInterest,
    target: CrsCode,
) -> Result<AreaOfInterest, ProjectionError> {
    let transformer = Transformer::new(aoi.crs(), target)?;
    aoi.map_coords(target, |x, y| Ok(transformer.apply(x, y)))
}

/// Site coordinates expressed in `target`.
pub fn site_position(site: &Site, target: CrsCode) -> Result<(f64, f64), ProjectionError> {
    transform_point(site.lon, site.lat, site.crs, target)
}
