//! Crop and mask grids to an area of interest.
//!
//! Cropping keeps the cell-aligned window covering the AOI's bounding box;
//! masking then sets every cell whose centre lies outside the polygon to NaN.
//! Both steps are derived from the geometry alone, so a [`PreparedMask`] is
//! built once and applied to every grid of a stack.

use precip_common::{AreaOfInterest, Grid, GridGeometry, GridStack};
use projection::transform_aoi;
use tracing::debug;

use crate::error::{EngineError, Result};

/// Slack, in cells, when snapping the AOI extent to cell edges.
const EDGE_TOLERANCE: f64 = 1e-9;

/// Crop window and inside/outside flags for one grid geometry.
#[derive(Debug, Clone)]
pub struct PreparedMask {
    source: GridGeometry,
    col: usize,
    row: usize,
    geometry: GridGeometry,
    inside: Vec<bool>,
}

impl PreparedMask {
    /// Prepare the mask of `aoi` over grids with `geometry`.
    ///
    /// The AOI is reprojected into the grid CRS when they differ.
    pub fn new(geometry: &GridGeometry, aoi: &AreaOfInterest) -> Result<Self> {
        let aoi = if aoi.crs() == geometry.crs {
            aoi.clone()
        } else {
            transform_aoi(aoi, geometry.crs)
                .map_err(|_| EngineError::crs_mismatch("area of interest", aoi.crs(), geometry.crs))?
        };

        let aoi_bbox = aoi.bbox();
        let outside = || EngineError::AoiOutsideGrid {
            aoi: format!("{:?}", aoi_bbox),
            grid: format!("{:?}", geometry.extent),
        };

        let overlap = geometry
            .extent
            .intersection(&aoi_bbox)
            .ok_or_else(outside)?;

        let (res_x, res_y) = geometry.resolution();
        let extent = &geometry.extent;

        let col0 = (((overlap.min_x - extent.min_x) / res_x) + EDGE_TOLERANCE).floor() as usize;
        let col1 = (((overlap.max_x - extent.min_x) / res_x) - EDGE_TOLERANCE).ceil() as usize;
        let row0 = (((extent.max_y - overlap.max_y) / res_y) + EDGE_TOLERANCE).floor() as usize;
        let row1 = (((extent.max_y - overlap.min_y) / res_y) - EDGE_TOLERANCE).ceil() as usize;

        let col1 = col1.min(geometry.width);
        let row1 = row1.min(geometry.height);
        if col1 <= col0 || row1 <= row0 {
            return Err(outside());
        }

        let window = geometry.window(col0, row0, col1 - col0, row1 - row0);

        let mut inside = Vec::with_capacity(window.len());
        for r in 0..window.height {
            for c in 0..window.width {
                let (x, y) = window.cell_center(c, r);
                inside.push(aoi.contains_point(x, y));
            }
        }

        debug!(
            col = col0,
            row = row0,
            width = window.width,
            height = window.height,
            cells_inside = inside.iter().filter(|v| **v).count(),
            "Prepared AOI mask"
        );

        Ok(Self {
            source: geometry.clone(),
            col: col0,
            row: row0,
            geometry: window,
            inside,
        })
    }

    /// Geometry of masked output grids.
    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Crop and mask one grid. Label and key are kept.
    pub fn apply(&self, grid: &Grid) -> Result<Grid> {
        if !grid.geometry().matches(&self.source) {
            return Err(EngineError::GeometryMismatch(format!(
                "mask prepared for {}x{} grid, got {}x{}",
                self.source.width,
                self.source.height,
                grid.width(),
                grid.height()
            )));
        }

        let mut data = Vec::with_capacity(self.geometry.len());
        let mut idx = 0;
        for r in 0..self.geometry.height {
            let start = (self.row + r) * self.source.width + self.col;
            for value in &grid.data()[start..start + self.geometry.width] {
                data.push(if self.inside[idx] { *value } else { f32::NAN });
                idx += 1;
            }
        }

        let mut out = Grid::new(self.geometry.clone(), data)?;
        if let Some(label) = grid.band_label() {
            out = out.with_band_label(label);
        }
        if let Some(key) = grid.key() {
            out = out.with_key(key);
        }
        Ok(out)
    }
}

/// Crop a grid to the AOI extent and mask cells outside the polygon.
pub fn crop_and_mask(grid: &Grid, aoi: &AreaOfInterest) -> Result<Grid> {
    PreparedMask::new(grid.geometry(), aoi)?.apply(grid)
}

/// Crop and mask every grid of a stack, preserving count and order.
pub fn crop_and_mask_stack(stack: &GridStack, aoi: &AreaOfInterest) -> Result<GridStack> {
    let Some(geometry) = stack.geometry() else {
        return Ok(GridStack::default());
    };
    let mask = PreparedMask::new(geometry, aoi)?;
    let grids = stack
        .iter()
        .map(|g| mask.apply(g))
        .collect::<Result<Vec<_>>>()?;
    Ok(GridStack::new(grids)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use precip_common::{BoundingBox, CrsCode};

    fn geometry() -> GridGeometry {
        GridGeometry::new(10, 10, BoundingBox::new(0.0, 0.0, 10.0, 10.0), CrsCode::Epsg4326)
    }

    fn aoi(wkt: &str) -> AreaOfInterest {
        AreaOfInterest::from_wkt(wkt, CrsCode::Epsg4326).unwrap()
    }

    #[test]
    fn test_crop_to_aoi_window() {
        let grid = Grid::filled(geometry(), 1.0);
        let out = crop_and_mask(&grid, &aoi("POLYGON((2 2, 6 2, 6 6, 2 6, 2 2))")).unwrap();
        assert_eq!(out.width(), 4);
        assert_eq!(out.height(), 4);
        assert_eq!(out.geometry().extent, BoundingBox::new(2.0, 2.0, 6.0, 6.0));
        assert_eq!(out.valid_count(), 16);
    }

    #[test]
    fn test_partial_cell_aoi_expands_to_cell_edges() {
        let grid = Grid::filled(geometry(), 1.0);
        let out = crop_and_mask(&grid, &aoi("POLYGON((2.6 2.6, 5.4 2.6, 5.4 5.4, 2.6 5.4, 2.6 2.6))"))
            .unwrap();
        assert_eq!(out.geometry().extent, BoundingBox::new(2.0, 2.0, 6.0, 6.0));
        // Border cells of the window have centres outside the polygon
        assert_eq!(out.valid_count(), 4);
    }

    #[test]
    fn test_cells_outside_polygon_are_masked() {
        let grid = Grid::filled(geometry(), 1.0);
        let out = crop_and_mask(&grid, &aoi("POLYGON((2 2, 6 2, 6 6, 2 2))")).unwrap();
        // Upper-left corner cell of the window lies above the diagonal
        assert!(out.get(0, 0).unwrap().is_nan());
        // Lower-right corner cell lies below it
        assert_eq!(out.get(3, 3), Some(1.0));
    }

    #[test]
    fn test_aoi_outside_grid() {
        let grid = Grid::filled(geometry(), 1.0);
        let err = crop_and_mask(&grid, &aoi("POLYGON((50 50, 51 50, 51 51, 50 51, 50 50))"))
            .unwrap_err();
        assert!(matches!(err, EngineError::AoiOutsideGrid { .. }));
    }

    #[test]
    fn test_crs_without_path_is_mismatch() {
        let grid = Grid::filled(geometry(), 1.0);
        let albers = AreaOfInterest::from_wkt("POLYGON((0 0, 1 0, 1 1, 0 0))", CrsCode::Epsg5070)
            .unwrap();
        let err = crop_and_mask(&grid, &albers).unwrap_err();
        assert!(matches!(err, EngineError::CrsMismatch { .. }));
    }

    #[test]
    fn test_mask_keeps_key() {
        let key = precip_common::CalendarKey::new(2000, 5).unwrap();
        let grid = Grid::filled(geometry(), 1.0).with_key(key);
        let out = crop_and_mask(&grid, &aoi("POLYGON((0 0, 4 0, 4 4, 0 4, 0 0))")).unwrap();
        assert_eq!(out.key(), Some(key));
    }
}
