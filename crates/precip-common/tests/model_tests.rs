//! Tests for the shared data model: AOIs, grids and calendar keys together.

use precip_common::{
    assign_ids, days_in_month, AreaOfInterest, BoundingBox, CalendarKey, CommonError, CrsCode,
    GridStack, SitePoint, TimeCodec, MONTH_LABELS,
};
use test_utils::{
    aoi, assert_approx_eq, assert_coords_approx_eq, constant_grid, keyed_grid, unit_geometry,
};

// ============================================================================
// Day table
// ============================================================================

#[test]
fn test_days_in_month_matches_fixed_table() {
    let table = [
        (1, 31),
        (2, 28),
        (3, 31),
        (4, 30),
        (5, 31),
        (6, 30),
        (7, 31),
        (8, 31),
        (9, 30),
        (10, 31),
        (11, 30),
        (12, 31),
    ];
    for (month, days) in table {
        assert_eq!(days_in_month(month), Some(days), "month {}", month);
    }
    let year: u32 = (1..=12).filter_map(days_in_month).sum();
    assert_eq!(year, 365);
    assert_eq!(MONTH_LABELS.len(), 12);
}

// ============================================================================
// AOI parsing
// ============================================================================

#[test]
fn test_geojson_and_wkt_describe_same_polygon() {
    let value: serde_json::Value = serde_json::from_str(aoi::SQUARE_GEOJSON).unwrap();
    let from_json = AreaOfInterest::from_geojson(&value, CrsCode::Epsg4326).unwrap();
    let from_wkt = AreaOfInterest::from_wkt(aoi::SQUARE_WKT, CrsCode::Epsg4326).unwrap();

    assert_eq!(from_json.bbox(), from_wkt.bbox());
    assert_eq!(from_json.bbox(), BoundingBox::new(2.0, 2.0, 6.0, 6.0));
    for (x, y) in [(3.0, 3.0), (5.5, 2.5), (1.0, 1.0), (7.0, 4.0)] {
        assert_eq!(from_json.contains_point(x, y), from_wkt.contains_point(x, y));
    }
}

#[test]
fn test_triangle_excludes_upper_left_half() {
    let triangle = AreaOfInterest::from_wkt(aoi::TRIANGLE_WKT, CrsCode::Epsg4326).unwrap();
    assert!(triangle.contains_point(5.5, 2.5));
    assert!(!triangle.contains_point(2.5, 5.5));
}

#[test]
fn test_invalid_aoi_reports_reason() {
    let err = AreaOfInterest::from_wkt("LINESTRING(0 0, 1 1)", CrsCode::Epsg4326).unwrap_err();
    assert!(matches!(err, CommonError::InvalidAoi(_)));
    assert!(err.to_string().contains("POLYGON"));
}

// ============================================================================
// Grids and keys
// ============================================================================

#[test]
fn test_grid_lookup_on_unit_geometry() {
    let grid = constant_grid(&unit_geometry(), 4.0);
    assert_eq!(grid.value_at(0.1, 9.9), Some(4.0));
    assert_eq!(grid.value_at(10.5, 5.0), None);
    assert_approx_eq!(grid.mean_valid().unwrap(), 4.0, 1e-9);
}

#[test]
fn test_cell_centres_run_top_row_first() {
    let geometry = unit_geometry();
    let (x, y) = geometry.cell_center(0, 0);
    assert_coords_approx_eq!((x, y), (0.5, 9.5), 1e-9);
    let (x, y) = geometry.cell_center(9, 9);
    assert_coords_approx_eq!((x, y), (9.5, 0.5), 1e-9);
    assert_eq!(geometry.cell_at(9.5, 0.5), Some((9, 9)));
}

#[test]
fn test_stack_keeps_order_and_keys() {
    let geometry = unit_geometry();
    let stack = GridStack::new(vec![
        keyed_grid(&geometry, 2001, 3, 1.0),
        keyed_grid(&geometry, 2000, 7, 2.0),
    ])
    .unwrap();
    let keys: Vec<CalendarKey> = stack.iter().filter_map(|g| g.key()).collect();
    assert_eq!(keys[0], CalendarKey::new(2001, 3).unwrap());
    assert_eq!(keys[1], CalendarKey::new(2000, 7).unwrap());
}

#[test]
fn test_band_label_key_matches_name_key() {
    let codec = TimeCodec::default();
    let from_name = codec.key_from_name("era5.tp.2021.06.zarr").unwrap();
    // 2021-06-15T00:00:00Z
    let grid = constant_grid(&unit_geometry(), 0.0).with_band_label("time=1623715200");
    let from_band = codec.key_from_band_timestamp(&grid).unwrap();
    assert_eq!(from_name, from_band);
}

// ============================================================================
// Sites
// ============================================================================

#[test]
fn test_site_ids_are_sequential() {
    let points: Vec<SitePoint> = (0..12).map(|i| SitePoint::new(i as f64, 0.0)).collect();
    let sites = assign_ids(points, CrsCode::Epsg4326).unwrap();
    assert_eq!(sites.first().map(|s| s.id.as_str()), Some("SITE_0001"));
    assert_eq!(sites.last().map(|s| s.id.as_str()), Some("SITE_0012"));
}
