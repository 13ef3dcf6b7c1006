//! Grids and grid stacks.
//!
//! A [`Grid`] is a row-major `f32` field (top row first) over a
//! [`GridGeometry`]. The missing marker is `f32::NAN`; every reduction in the
//! workspace skips NaN cells.

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};
use crate::time::CalendarKey;
use crate::{BoundingBox, CrsCode};

/// Tolerance used when comparing extents of grids that must line up.
const EXTENT_TOLERANCE: f64 = 1e-9;

/// Spatial layout of a grid: size, extent and reference system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    /// Number of columns
    pub width: usize,
    /// Number of rows
    pub height: usize,
    /// Outer edges of the grid (not cell centres)
    pub extent: BoundingBox,
    pub crs: CrsCode,
}

impl GridGeometry {
    pub fn new(width: usize, height: usize, extent: BoundingBox, crs: CrsCode) -> Self {
        Self {
            width,
            height,
            extent,
            crs,
        }
    }

    /// Cell size (x, y) in CRS units.
    pub fn resolution(&self) -> (f64, f64) {
        (
            self.extent.width() / self.width as f64,
            self.extent.height() / self.height as f64,
        )
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Centre of cell (col, row).
    pub fn cell_center(&self, col: usize, row: usize) -> (f64, f64) {
        let (res_x, res_y) = self.resolution();
        (
            self.extent.min_x + (col as f64 + 0.5) * res_x,
            self.extent.max_y - (row as f64 + 0.5) * res_y,
        )
    }

    /// Cell containing the coordinate, or `None` outside the extent.
    ///
    /// Points on the far right/bottom edge belong to the last column/row.
    pub fn cell_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        if self.is_empty() || !self.extent.contains_point(x, y) {
            return None;
        }

        let (res_x, res_y) = self.resolution();
        let col = ((x - self.extent.min_x) / res_x).floor() as usize;
        let row = ((self.extent.max_y - y) / res_y).floor() as usize;

        Some((col.min(self.width - 1), row.min(self.height - 1)))
    }

    /// Geometry of the sub-window starting at (col, row).
    pub fn window(&self, col: usize, row: usize, width: usize, height: usize) -> GridGeometry {
        let (res_x, res_y) = self.resolution();
        let min_x = self.extent.min_x + col as f64 * res_x;
        let max_y = self.extent.max_y - row as f64 * res_y;
        GridGeometry {
            width,
            height,
            extent: BoundingBox::new(
                min_x,
                max_y - height as f64 * res_y,
                min_x + width as f64 * res_x,
                max_y,
            ),
            crs: self.crs,
        }
    }

    /// Whether two geometries describe the same cells.
    pub fn matches(&self, other: &GridGeometry) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.crs == other.crs
            && self.extent.approx_eq(&other.extent, EXTENT_TOLERANCE)
    }
}

/// A single scalar field.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    geometry: GridGeometry,
    data: Vec<f32>,
    band_label: Option<String>,
    key: Option<CalendarKey>,
}

impl Grid {
    /// Create a grid, checking the data length against the geometry.
    pub fn new(geometry: GridGeometry, data: Vec<f32>) -> CommonResult<Self> {
        if data.len() != geometry.len() {
            return Err(CommonError::invalid_grid(format!(
                "expected {} cells for {}x{} grid, got {}",
                geometry.len(),
                geometry.width,
                geometry.height,
                data.len()
            )));
        }
        Ok(Self {
            geometry,
            data,
            band_label: None,
            key: None,
        })
    }

    /// Grid with every cell set to `value`.
    pub fn filled(geometry: GridGeometry, value: f32) -> Self {
        let data = vec![value; geometry.len()];
        Self {
            geometry,
            data,
            band_label: None,
            key: None,
        }
    }

    pub fn with_band_label(mut self, label: impl Into<String>) -> Self {
        self.band_label = Some(label.into());
        self
    }

    pub fn with_key(mut self, key: CalendarKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    pub fn band_label(&self) -> Option<&str> {
        self.band_label.as_deref()
    }

    pub fn key(&self) -> Option<CalendarKey> {
        self.key
    }

    pub fn width(&self) -> usize {
        self.geometry.width
    }

    pub fn height(&self) -> usize {
        self.geometry.height
    }

    /// Value at (col, row). `Some(NAN)` is a missing cell inside the grid.
    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.geometry.width || row >= self.geometry.height {
            return None;
        }
        self.data.get(row * self.geometry.width + col).copied()
    }

    /// Value of the cell containing (x, y), nearest-cell lookup.
    pub fn value_at(&self, x: f64, y: f64) -> Option<f32> {
        let (col, row) = self.geometry.cell_at(x, y)?;
        self.get(col, row)
    }

    /// New grid with `f` applied to every cell. Labels and key are kept.
    pub fn map<F>(&self, f: F) -> Grid
    where
        F: Fn(f32) -> f32,
    {
        Grid {
            geometry: self.geometry.clone(),
            data: self.data.iter().map(|&v| f(v)).collect(),
            band_label: self.band_label.clone(),
            key: self.key,
        }
    }

    /// Replace the cell values, keeping geometry, label and key.
    pub fn with_data(&self, data: Vec<f32>) -> CommonResult<Grid> {
        let mut grid = Grid::new(self.geometry.clone(), data)?;
        grid.band_label = self.band_label.clone();
        grid.key = self.key;
        Ok(grid)
    }

    /// Number of non-missing cells.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }

    /// Mean of the non-missing cells, or `None` if every cell is missing.
    pub fn mean_valid(&self) -> Option<f64> {
        let mut sum = 0.0f64;
        let mut count = 0usize;
        for &v in &self.data {
            if !v.is_nan() {
                sum += v as f64;
                count += 1;
            }
        }
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }
}

/// Ordered grids sharing one geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridStack {
    grids: Vec<Grid>,
}

impl GridStack {
    /// Build a stack, failing if any grid's geometry differs from the first.
    pub fn new(grids: Vec<Grid>) -> CommonResult<Self> {
        if let Some(first) = grids.first() {
            for (idx, grid) in grids.iter().enumerate().skip(1) {
                if !grid.geometry().matches(first.geometry()) {
                    return Err(CommonError::GeometryMismatch(format!(
                        "grid {} is {}x{} over {:?} ({}), expected {}x{} over {:?} ({})",
                        idx,
                        grid.width(),
                        grid.height(),
                        grid.geometry().extent,
                        grid.geometry().crs,
                        first.width(),
                        first.height(),
                        first.geometry().extent,
                        first.geometry().crs,
                    )));
                }
            }
        }
        Ok(Self { grids })
    }

    /// Shared geometry, `None` for an empty stack.
    pub fn geometry(&self) -> Option<&GridGeometry> {
        self.grids.first().map(|g| g.geometry())
    }

    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Grid> {
        self.grids.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Grid> {
        self.grids.iter()
    }

    pub fn grids(&self) -> &[Grid] {
        &self.grids
    }

    pub fn into_grids(self) -> Vec<Grid> {
        self.grids
    }
}

impl<'a> IntoIterator for &'a GridStack {
    type Item = &'a Grid;
    type IntoIter = std::slice::Iter<'a, Grid>;

    fn into_iter(self) -> Self::IntoIter {
        self.grids.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> GridGeometry {
        GridGeometry::new(4, 2, BoundingBox::new(0.0, 0.0, 4.0, 2.0), CrsCode::Epsg4326)
    }

    #[test]
    fn test_new_checks_length() {
        assert!(Grid::new(geometry(), vec![0.0; 8]).is_ok());
        assert!(matches!(
            Grid::new(geometry(), vec![0.0; 7]),
            Err(CommonError::InvalidGrid(_))
        ));
    }

    #[test]
    fn test_cell_lookup() {
        let data: Vec<f32> = (0..8).map(|i| i as f32).collect();
        let grid = Grid::new(geometry(), data).unwrap();

        // Top-left cell
        assert_eq!(grid.value_at(0.5, 1.5), Some(0.0));
        // Bottom-right cell, including the far edge
        assert_eq!(grid.value_at(3.5, 0.5), Some(7.0));
        assert_eq!(grid.value_at(4.0, 0.0), Some(7.0));
        // Outside
        assert_eq!(grid.value_at(4.5, 0.5), None);
        assert_eq!(grid.geometry().cell_center(1, 1), (1.5, 0.5));
    }

    #[test]
    fn test_window_geometry() {
        let window = geometry().window(1, 1, 2, 1);
        assert_eq!(window.extent, BoundingBox::new(1.0, 0.0, 3.0, 1.0));
        assert_eq!(window.resolution(), (1.0, 1.0));
    }

    #[test]
    fn test_mean_valid_skips_missing() {
        let grid = Grid::new(
            geometry(),
            vec![1.0, f32::NAN, 3.0, f32::NAN, f32::NAN, f32::NAN, f32::NAN, 2.0],
        )
        .unwrap();
        assert_eq!(grid.valid_count(), 3);
        assert_eq!(grid.mean_valid(), Some(2.0));
        assert_eq!(Grid::filled(geometry(), f32::NAN).mean_valid(), None);
    }

    #[test]
    fn test_stack_rejects_mismatched_geometry() {
        let a = Grid::filled(geometry(), 1.0);
        let other = GridGeometry::new(4, 2, BoundingBox::new(0.0, 0.0, 8.0, 2.0), CrsCode::Epsg4326);
        let b = Grid::filled(other, 1.0);
        assert!(GridStack::new(vec![a.clone(), a.clone()]).is_ok());
        assert!(matches!(
            GridStack::new(vec![a, b]),
            Err(CommonError::GeometryMismatch(_))
        ));
        assert!(GridStack::new(Vec::new()).unwrap().geometry().is_none());
    }
}
