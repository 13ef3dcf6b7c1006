//! Common test fixtures for the precipitation pipeline tests.
//!
//! This module provides pre-defined test data that represents common
//! scenarios in precipitation aggregation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Common bounding box definitions for testing.
pub mod bbox {
    /// Global bounding box (-180 to 180, -90 to 90)
    pub const GLOBAL: (f64, f64, f64, f64) = (-180.0, -90.0, 180.0, 90.0);

    /// Continental United States bounding box
    pub const CONUS: (f64, f64, f64, f64) = (-130.0, 20.0, -60.0, 55.0);

    /// Extent of [`crate::unit_geometry`]
    pub const UNIT: (f64, f64, f64, f64) = (0.0, 0.0, 10.0, 10.0);

    /// Invalid bbox (min > max)
    pub const INVALID: (f64, f64, f64, f64) = (10.0, 10.0, 5.0, 5.0);
}

/// Area of interest documents.
pub mod aoi {
    /// Square covering lon 2..6, lat 2..6 as a GeoJSON FeatureCollection.
    pub const SQUARE_GEOJSON: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "properties": {"name": "basin"},
      "geometry": {
        "type": "Polygon",
        "coordinates": [[[2.0, 2.0], [6.0, 2.0], [6.0, 6.0], [2.0, 6.0], [2.0, 2.0]]]
      }
    }
  ]
}"#;

    /// Same square as WKT.
    pub const SQUARE_WKT: &str = "POLYGON((2 2, 6 2, 6 6, 2 6, 2 2))";

    /// Triangle whose bbox is lon 2..6, lat 2..6 but which leaves the
    /// upper-left half of the box outside the polygon.
    pub const TRIANGLE_WKT: &str = "POLYGON((2 2, 6 2, 6 6, 2 2))";

    /// The whole of [`crate::unit_geometry`].
    pub const UNIT_WKT: &str = "POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))";

    /// Square far away from [`crate::unit_geometry`].
    pub const DISJOINT_WKT: &str = "POLYGON((50 50, 51 50, 51 51, 50 51, 50 50))";
}

/// Site tables.
pub mod sites {
    /// Three sites: two inside [`crate::unit_geometry`], one outside.
    pub const THREE_SITES_CSV: &str = "name,lon,lat,elevation\n\
Alpha,1.5,8.5,120\n\
Bravo,4.5,4.5,95\n\
Outside,45.0,45.0,10\n";

    /// Alternative column naming.
    pub const LONGITUDE_LATITUDE_CSV: &str = "station,longitude,latitude\nA,1.0,1.0\n";
}

/// Common CRS identifiers.
pub mod crs {
    /// WGS84 geographic
    pub const EPSG_4326: &str = "EPSG:4326";

    /// Web Mercator
    pub const EPSG_3857: &str = "EPSG:3857";

    /// OGC lon/lat alias
    pub const CRS_84: &str = "CRS:84";
}

/// Relative subdirectories of a pipeline root.
pub const ROOT_SUBDIRS: [&str; 7] = [
    "aoi",
    "raw",
    "sites",
    "output/sites",
    "output/area",
    "output/rasters",
    "output/aggregated",
];

/// Temporary pipeline root with every subdirectory created.
pub struct RootLayout {
    dir: TempDir,
}

impl RootLayout {
    pub fn new() -> io::Result<Self> {
        let dir = TempDir::new()?;
        for sub in ROOT_SUBDIRS {
            fs::create_dir_all(dir.path().join(sub))?;
        }
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Write a text file below the root, returning its path.
    pub fn write(&self, relative: &str, contents: &str) -> io::Result<PathBuf> {
        let path = self.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }
}
