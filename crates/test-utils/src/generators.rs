//! Test data generators for creating synthetic precipitation grids.
//!
//! These generators create predictable, verifiable test data patterns
//! that can be used across the test suite.

use precip_common::{BoundingBox, CalendarKey, CrsCode, Grid, GridGeometry, GridStack};

/// Creates cell values with a predictable pattern.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// This makes it easy to verify that data is being read/written correctly
/// by checking that grid[row][col] == col * 1000 + row.
///
/// # Example
///
/// ```
/// use test_utils::create_test_values;
///
/// let values = create_test_values(10, 5);
/// assert_eq!(values.len(), 50); // 10 * 5
/// assert_eq!(values[0], 0.0);   // col=0, row=0 -> 0*1000 + 0
/// assert_eq!(values[1], 1000.0); // col=1, row=0 -> 1*1000 + 0
/// assert_eq!(values[10], 1.0);  // col=0, row=1 -> 0*1000 + 1
/// ```
pub fn create_test_values(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Geographic geometry of `width` x `height` one-degree cells whose
/// top-left corner is at (`min_lon`, `max_lat`).
pub fn degree_geometry(width: usize, height: usize, min_lon: f64, max_lat: f64) -> GridGeometry {
    GridGeometry::new(
        width,
        height,
        BoundingBox::new(
            min_lon,
            max_lat - height as f64,
            min_lon + width as f64,
            max_lat,
        ),
        CrsCode::Epsg4326,
    )
}

/// A 10x10 one-degree geometry covering lon 0..10, lat 0..10.
pub fn unit_geometry() -> GridGeometry {
    degree_geometry(10, 10, 0.0, 10.0)
}

/// Grid with every cell set to `value`.
pub fn constant_grid(geometry: &GridGeometry, value: f32) -> Grid {
    Grid::filled(geometry.clone(), value)
}

/// Grid following [`create_test_values`].
pub fn pattern_grid(geometry: &GridGeometry) -> Grid {
    let data = create_test_values(geometry.width, geometry.height);
    Grid::filled(geometry.clone(), 0.0)
        .with_data(data)
        .expect("pattern matches geometry")
}

/// Grid with precipitation-like values in metres per day.
///
/// Values grow from 0.0005 (top-left) to about 0.0105 (bottom-right).
pub fn create_precipitation_grid(geometry: &GridGeometry) -> Grid {
    let (w, h) = (geometry.width, geometry.height);
    let mut data = Vec::with_capacity(w * h);
    for row in 0..h {
        for col in 0..w {
            let x_factor = col as f32 / w.max(1) as f32;
            let y_factor = row as f32 / h.max(1) as f32;
            data.push(0.0005 + 0.005 * x_factor + 0.005 * y_factor);
        }
    }
    Grid::filled(geometry.clone(), 0.0)
        .with_data(data)
        .expect("generated data matches geometry")
}

/// Constant grid tagged with a calendar key.
pub fn keyed_grid(geometry: &GridGeometry, year: i32, month: u32, value: f32) -> Grid {
    let key = CalendarKey::new(year, month).expect("valid month");
    constant_grid(geometry, value).with_key(key)
}

/// Stack of constant keyed grids, one per `(year, month, value)` entry.
pub fn keyed_stack(geometry: &GridGeometry, entries: &[(i32, u32, f32)]) -> GridStack {
    let grids = entries
        .iter()
        .map(|&(year, month, value)| keyed_grid(geometry, year, month, value))
        .collect();
    GridStack::new(grids).expect("grids share geometry")
}

/// Twelve monthly grids of one year, all set to `value`.
pub fn full_year_stack(geometry: &GridGeometry, year: i32, value: f32) -> GridStack {
    let entries: Vec<(i32, u32, f32)> = (1..=12).map(|m| (year, m, value)).collect();
    keyed_stack(geometry, &entries)
}

/// Set the cells listed as `(col, row)` to `value`.
pub fn with_cells(grid: &Grid, cells: &[(usize, usize)], value: f32) -> Grid {
    let width = grid.width();
    let mut data = grid.data().to_vec();
    for &(col, row) in cells {
        data[row * width + col] = value;
    }
    grid.with_data(data).expect("same length")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_values() {
        let values = create_test_values(3, 2);
        assert_eq!(values, vec![0.0, 1000.0, 2000.0, 1.0, 1001.0, 2001.0]);
    }

    #[test]
    fn test_degree_geometry() {
        let geometry = degree_geometry(4, 2, -10.0, 50.0);
        assert_eq!(geometry.extent, BoundingBox::new(-10.0, 48.0, -6.0, 50.0));
        assert_eq!(geometry.resolution(), (1.0, 1.0));
    }

    #[test]
    fn test_keyed_stack() {
        let stack = full_year_stack(&unit_geometry(), 2001, 3.0);
        assert_eq!(stack.len(), 12);
        assert_eq!(
            stack.get(11).and_then(|g| g.key()),
            Some(CalendarKey::new(2001, 12).unwrap())
        );
    }

    #[test]
    fn test_precipitation_grid_range() {
        let grid = create_precipitation_grid(&unit_geometry());
        let min = grid.data().iter().cloned().fold(f32::INFINITY, f32::min);
        let max = grid.data().iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        assert!(min >= 0.0005 - 1e-7);
        assert!(max < 0.011);
    }

    #[test]
    fn test_with_cells() {
        let grid = with_cells(&constant_grid(&unit_geometry(), 1.0), &[(2, 3)], 9.0);
        assert_eq!(grid.get(2, 3), Some(9.0));
        assert_eq!(grid.get(3, 2), Some(1.0));
    }
}
