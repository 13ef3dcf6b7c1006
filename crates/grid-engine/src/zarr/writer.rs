//! Zarr V3 writer for grids, band stacks and aggregated products.
//!
//! Each array is written to a `.partial` sibling directory and renamed into
//! place once complete, so an interrupted write never leaves a readable but
//! truncated product.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::{ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use precip_common::{Grid, GridStack};

use crate::aggregate::AggregatedGrid;
use crate::config::{EngineConfig, ZarrCompression};
use crate::error::{EngineError, Result};
use crate::zarr::attributes::{GridAttributes, ProductLabels};

/// Result of writing a Zarr array.
#[derive(Debug, Clone)]
pub struct ZarrWriteResult {
    /// Final location of the array.
    pub path: PathBuf,
    /// Array shape.
    pub shape: Vec<u64>,
    /// Total bytes written (uncompressed).
    pub bytes_written: u64,
}

/// Writer for creating Zarr V3 arrays from grids.
pub struct ZarrGridWriter {
    config: EngineConfig,
}

impl ZarrGridWriter {
    /// Create a new writer with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Write a single grid as a 2-D array.
    pub fn write_grid(&self, path: &Path, grid: &Grid, attrs: &GridAttributes) -> Result<ZarrWriteResult> {
        let mut attrs = attrs.clone();
        if attrs.band_labels.is_empty() {
            if let Some(label) = grid.band_label() {
                attrs.band_labels = vec![label.to_string()];
            }
        }
        self.write_array(
            path,
            vec![grid.height() as u64, grid.width() as u64],
            &attrs,
            grid.data(),
        )
    }

    /// Write an aggregated product with its provenance attributes.
    pub fn write_aggregated(
        &self,
        path: &Path,
        aggregated: &AggregatedGrid,
        labels: &ProductLabels,
    ) -> Result<ZarrWriteResult> {
        let attrs = GridAttributes::for_geometry(aggregated.grid.geometry())
            .with_product(labels, &aggregated.metadata);
        self.write_grid(path, &aggregated.grid, &attrs)
    }

    /// Write a stack as a 3-D `[bands, rows, cols]` array.
    ///
    /// Band labels of the grids are stored when every grid has one.
    pub fn write_stack(&self, path: &Path, stack: &GridStack, units: Option<&str>) -> Result<ZarrWriteResult> {
        let geometry = stack
            .geometry()
            .ok_or_else(|| EngineError::invalid_metadata("cannot write an empty stack"))?;

        let labels: Option<Vec<String>> = stack
            .iter()
            .map(|g| g.band_label().map(String::from))
            .collect();

        let mut attrs = GridAttributes::for_geometry(geometry);
        if let Some(units) = units {
            attrs = attrs.with_units(units);
        }
        if let Some(labels) = labels {
            attrs = attrs.with_band_labels(labels);
        }

        let mut data = Vec::with_capacity(geometry.len() * stack.len());
        for grid in stack {
            data.extend_from_slice(grid.data());
        }

        self.write_array(
            path,
            vec![stack.len() as u64, geometry.height as u64, geometry.width as u64],
            &attrs,
            &data,
        )
    }

    fn write_array(
        &self,
        path: &Path,
        shape: Vec<u64>,
        attrs: &GridAttributes,
        data: &[f32],
    ) -> Result<ZarrWriteResult> {
        if shape.iter().any(|&d| d == 0) {
            return Err(EngineError::invalid_metadata(format!(
                "{}: cannot write array with shape {:?}",
                path.display(),
                shape
            )));
        }

        let staging = staging_path(path);
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        let store = Arc::new(
            FilesystemStore::new(&staging).map_err(|e| EngineError::storage_error(e.to_string()))?,
        );

        // Band dimension is chunked one band at a time
        let chunk_size = self.config.zarr_chunk_size as u64;
        let chunk_shape: Vec<u64> = shape
            .iter()
            .enumerate()
            .map(|(dim, &len)| {
                if shape.len() == 3 && dim == 0 {
                    1
                } else {
                    chunk_size.min(len)
                }
            })
            .collect();

        let chunk_grid: zarrs::array::ChunkGrid = chunk_shape
            .try_into()
            .map_err(|e| EngineError::ConfigError(format!("{:?}", e)))?;

        let mut binding = ArrayBuilder::new(
            shape.clone(),
            DataType::Float32,
            chunk_grid,
            FillValue::from(f32::NAN),
        );
        let mut builder = binding.attributes(attrs.to_map());

        // Add compression if configured
        if self.config.zarr_compression != ZarrCompression::None {
            let codec = self.create_compression_codec()?;
            builder = builder.bytes_to_bytes_codecs(vec![codec]);
        }

        let array = builder
            .build(store, "/")
            .map_err(|e| EngineError::storage_error(e.to_string()))?;

        array
            .store_metadata()
            .map_err(|e| EngineError::storage_error(e.to_string()))?;

        let subset = ArraySubset::new_with_start_shape(vec![0; shape.len()], shape.clone())
            .map_err(|e| EngineError::storage_error(e.to_string()))?;

        array
            .store_array_subset_elements(&subset, data)
            .map_err(|e| EngineError::storage_error(e.to_string()))?;

        if path.exists() {
            fs::remove_dir_all(path)?;
        }
        fs::rename(&staging, path)?;

        let bytes_written = std::mem::size_of_val(data) as u64;
        debug!(path = %path.display(), ?shape, bytes_written, "Wrote Zarr array");

        Ok(ZarrWriteResult {
            path: path.to_path_buf(),
            shape,
            bytes_written,
        })
    }

    /// Create the compression codec based on configuration.
    fn create_compression_codec(
        &self,
    ) -> Result<Arc<dyn zarrs::array::codec::BytesToBytesCodecTraits>> {
        let level = BloscCompressionLevel::try_from(self.config.zarr_compression_level)
            .map_err(|_| EngineError::ConfigError("Invalid compression level".to_string()))?;

        let shuffle = if self.config.zarr_shuffle {
            BloscShuffleMode::Shuffle
        } else {
            BloscShuffleMode::NoShuffle
        };

        // typesize is required when shuffle is enabled
        let typesize = if self.config.zarr_shuffle {
            Some(4) // f32 = 4 bytes
        } else {
            None
        };

        let compressor = match self.config.zarr_compression {
            ZarrCompression::None => {
                return Err(EngineError::ConfigError(
                    "No compression configured".to_string(),
                ))
            }
            ZarrCompression::BloscLz4 => BloscCompressor::LZ4,
            ZarrCompression::BloscZstd => BloscCompressor::Zstd,
        };

        let codec = BloscCodec::new(compressor, level, None, shuffle, typesize)
            .map_err(|e| EngineError::ConfigError(e.to_string()))?;

        Ok(Arc::new(codec))
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}
