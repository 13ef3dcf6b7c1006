//! Reading grids from Zarr V3 arrays on the local filesystem.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;
use zarrs::array::Array;
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use precip_common::{Grid, GridGeometry};

use crate::error::{EngineError, Result};
use crate::zarr::attributes::GridAttributes;

/// An opened array with its decoded attributes.
struct OpenedArray<'a> {
    path: &'a Path,
    array: Array<FilesystemStore>,
    attrs: GridAttributes,
    shape: Vec<u64>,
    bands: usize,
    geometry: GridGeometry,
}

impl<'a> OpenedArray<'a> {
    fn open(path: &'a Path) -> Result<Self> {
        let store = FilesystemStore::new(path)
            .map_err(|e| EngineError::open_failed(format!("{}: {}", path.display(), e)))?;
        let array = Array::open(Arc::new(store), "/")
            .map_err(|e| EngineError::open_failed(format!("{}: {}", path.display(), e)))?;

        let attrs = GridAttributes::from_map(array.attributes())?;
        let shape = array.shape().to_vec();

        // Shape is [rows, cols] or [bands, rows, cols]
        let (bands, rows, cols) = match shape.as_slice() {
            [rows, cols] => (1, *rows as usize, *cols as usize),
            [bands, rows, cols] => (*bands as usize, *rows as usize, *cols as usize),
            _ => {
                return Err(EngineError::invalid_metadata(format!(
                    "{}: expected 2 or 3 dimensions, found {}",
                    path.display(),
                    shape.len()
                )))
            }
        };

        if !attrs.band_labels.is_empty() && attrs.band_labels.len() != bands {
            return Err(EngineError::invalid_metadata(format!(
                "{}: {} band labels for {} bands",
                path.display(),
                attrs.band_labels.len(),
                bands
            )));
        }

        let geometry = GridGeometry::new(cols, rows, attrs.bbox, attrs.crs);

        Ok(Self {
            path,
            array,
            attrs,
            shape,
            bands,
            geometry,
        })
    }

    fn read_band(&self, band: usize) -> Result<Grid> {
        if band >= self.bands {
            return Err(EngineError::read_failed(format!(
                "{}: band {} out of range ({} bands)",
                self.path.display(),
                band,
                self.bands
            )));
        }

        let (rows, cols) = (self.geometry.height as u64, self.geometry.width as u64);
        let subset = if self.shape.len() == 2 {
            ArraySubset::new_with_start_shape(vec![0, 0], vec![rows, cols])
        } else {
            ArraySubset::new_with_start_shape(vec![band as u64, 0, 0], vec![1, rows, cols])
        }
        .map_err(|e| EngineError::read_failed(e.to_string()))?;

        let data: Vec<f32> = self
            .array
            .retrieve_array_subset_elements(&subset)
            .map_err(|e| EngineError::read_failed(format!("{}: {}", self.path.display(), e)))?;

        let mut grid = Grid::new(self.geometry.clone(), data)?;
        if let Some(label) = self.attrs.band_labels.get(band) {
            grid = grid.with_band_label(label.clone());
        }
        Ok(grid)
    }
}

/// Decode only the attributes of an array.
pub fn read_attributes(path: &Path) -> Result<GridAttributes> {
    Ok(OpenedArray::open(path)?.attrs)
}

/// Read one band of an array. A 2-D array has exactly one band, index 0.
///
/// The band label is attached to the grid when present.
pub fn read_band(path: &Path, band: usize) -> Result<Grid> {
    let opened = OpenedArray::open(path)?;
    let grid = opened.read_band(band)?;
    debug!(
        path = %path.display(),
        band,
        bands = opened.bands,
        rows = opened.geometry.height,
        cols = opened.geometry.width,
        "Read Zarr band"
    );
    Ok(grid)
}

/// Read a single-band array as one grid.
pub fn read_grid(path: &Path) -> Result<Grid> {
    let opened = OpenedArray::open(path)?;
    if opened.bands != 1 {
        return Err(EngineError::invalid_metadata(format!(
            "{}: expected a single band, found {}",
            path.display(),
            opened.bands
        )));
    }
    opened.read_band(0)
}
