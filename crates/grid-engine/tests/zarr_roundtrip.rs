//! Integration test: write grids and products to Zarr V3 and read them back.

use grid_engine::{
    read_attributes, read_band, read_grid, reduce_group, EngineConfig, EngineError,
    GridAttributes, ProductLabels, ReduceOp, Weighting, ZarrCompression, ZarrGridWriter,
};
use precip_common::{CalendarKey, CrsCode, Grid, GridStack, TimeCodec};
use test_utils::{create_test_values, degree_geometry, keyed_grid, pattern_grid};

fn writer(chunk: usize, compression: ZarrCompression) -> ZarrGridWriter {
    ZarrGridWriter::new(EngineConfig {
        zarr_chunk_size: chunk,
        zarr_compression: compression,
        ..Default::default()
    })
}

#[test]
fn test_grid_values_survive_chunked_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("era5.tp.2000.01.zarr");
    let geometry = degree_geometry(37, 23, -10.0, 50.0);
    let grid = pattern_grid(&geometry);

    // Chunk size does not divide the grid evenly
    let result = writer(16, ZarrCompression::BloscZstd)
        .write_grid(&path, &grid, &GridAttributes::for_geometry(&geometry).with_units("m"))
        .unwrap();
    assert_eq!(result.shape, vec![23, 37]);
    assert!(!dir.path().join("era5.tp.2000.01.zarr.partial").exists());

    let back = read_grid(&path).unwrap();
    assert_eq!(back.geometry(), &geometry);
    assert_eq!(back.data(), create_test_values(37, 23).as_slice());
    assert_eq!(read_attributes(&path).unwrap().units.as_deref(), Some("m"));
}

#[test]
fn test_multiband_stack_keys_from_band_labels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("era5.tp.multiband.zarr");
    let geometry = degree_geometry(4, 3, 0.0, 3.0);

    // 2020-01-15, 2020-02-15, 2020-03-15
    let labels = ["time=1579046400", "time=1581724800", "time=1584230400"];
    let grids = labels
        .iter()
        .enumerate()
        .map(|(i, label)| Grid::filled(geometry.clone(), i as f32).with_band_label(*label))
        .collect();
    let stack = GridStack::new(grids).unwrap();

    writer(512, ZarrCompression::None)
        .write_stack(&path, &stack, Some("m"))
        .unwrap();

    let bands = read_attributes(&path).unwrap().band_labels.len();
    let back: Vec<Grid> = (0..bands).map(|b| read_band(&path, b).unwrap()).collect();
    assert_eq!(back.len(), 3);
    let codec = TimeCodec::default();
    let keys: Vec<CalendarKey> = back
        .iter()
        .map(|g| codec.key_from_band_timestamp(g).unwrap())
        .collect();
    assert_eq!(keys[0], CalendarKey::new(2020, 1).unwrap());
    assert_eq!(keys[2], CalendarKey::new(2020, 3).unwrap());
    assert_eq!(back[2].data()[0], 2.0);
    assert!(read_band(&path, 3).is_err());

    // A multi-band array is not a single grid
    assert!(matches!(read_grid(&path), Err(EngineError::InvalidMetadata(_))));
}

#[test]
fn test_aggregated_product_attributes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tp_basin_2000.zarr");
    let geometry = degree_geometry(2, 2, 0.0, 2.0);
    let jan = keyed_grid(&geometry, 2000, 1, 1.0);
    let feb = keyed_grid(&geometry, 2000, 2, f32::NAN);
    let annual = reduce_group(&[&jan, &feb], ReduceOp::WeightedSum, Weighting::DaysInMonth).unwrap();

    let labels = ProductLabels {
        variable: "tp".to_string(),
        region: "basin".to_string(),
        units: "mm".to_string(),
    };
    writer(512, ZarrCompression::BloscLz4)
        .write_aggregated(&path, &annual, &labels)
        .unwrap();

    let attrs = read_attributes(&path).unwrap();
    assert_eq!(attrs.crs, CrsCode::Epsg4326);
    assert_eq!(attrs.variable.as_deref(), Some("tp"));
    let meta = attrs.aggregation.unwrap();
    assert_eq!(meta.operator, ReduceOp::WeightedSum);
    assert_eq!(meta.weighting, Weighting::DaysInMonth);
    assert_eq!(meta.keys.len(), 2);

    let grid = read_grid(&path).unwrap();
    assert_eq!(grid.data(), &[31.0, 31.0, 31.0, 31.0]);
}

#[test]
fn test_rewrite_replaces_existing_array() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.zarr");
    let geometry = degree_geometry(2, 1, 0.0, 1.0);
    let w = writer(512, ZarrCompression::BloscZstd);

    w.write_grid(&path, &Grid::filled(geometry.clone(), 1.0), &GridAttributes::for_geometry(&geometry))
        .unwrap();
    w.write_grid(&path, &Grid::filled(geometry.clone(), 7.0), &GridAttributes::for_geometry(&geometry))
        .unwrap();

    assert_eq!(read_grid(&path).unwrap().data(), &[7.0, 7.0]);
}
