//! Loading the AOI and the site table.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::info;

use precip_common::{assign_ids, AreaOfInterest, CrsCode, Site, SitePoint};

use crate::config::PipelineConfig;
use crate::discovery::find_single_file;
use crate::error::{PipelineError, Result};

pub const AOI_EXTENSIONS: [&str; 3] = ["geojson", "json", "wkt"];
pub const SITE_EXTENSIONS: [&str; 1] = ["csv"];

/// Accepted coordinate column pairs, matched case-insensitively.
const COORDINATE_COLUMNS: [(&str, &str); 3] = [("lon", "lat"), ("longitude", "latitude"), ("x", "y")];

/// Load the single AOI file of the root.
pub fn load_aoi(config: &PipelineConfig) -> Result<(PathBuf, AreaOfInterest)> {
    let path = find_single_file(&config.aoi_dir(), &AOI_EXTENSIONS, "AOI")?;
    let aoi = read_aoi(&path, config.aoi_crs)?;
    info!(
        path = %path.display(),
        crs = %aoi.crs(),
        parts = aoi.parts().len(),
        "Loaded area of interest"
    );
    Ok((path, aoi))
}

/// Parse an AOI file; the format follows the extension.
pub fn read_aoi(path: &Path, default_crs: CrsCode) -> Result<AreaOfInterest> {
    let content = fs::read_to_string(path).map_err(|e| PipelineError::at(path, e))?;
    let is_wkt = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wkt"));

    let aoi = if is_wkt {
        AreaOfInterest::from_wkt(&content, default_crs)
    } else {
        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| PipelineError::parse(path, e))?;
        AreaOfInterest::from_geojson(&value, default_crs)
    };
    aoi.map_err(|e| PipelineError::parse(path, e))
}

/// Load the single site table of the root and assign identifiers.
pub fn load_sites(config: &PipelineConfig) -> Result<Vec<Site>> {
    let path = find_single_file(&config.sites_dir(), &SITE_EXTENSIONS, "site table")?;
    let file = fs::File::open(&path).map_err(|e| PipelineError::at(&path, e))?;
    let sites = read_sites(file, config.site_crs).map_err(|e| PipelineError::at(&path, e))?;
    info!(path = %path.display(), sites = sites.len(), "Loaded sites");
    Ok(sites)
}

/// Read a site table with a header row.
///
/// Every column, coordinates included, is kept as an attribute.
pub fn read_sites<R: Read>(reader: R, crs: CrsCode) -> Result<Vec<Site>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = reader.headers()?.clone();

    let position = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let (lon_col, lat_col) = COORDINATE_COLUMNS
        .iter()
        .find_map(|(lon, lat)| Some((position(lon)?, position(lat)?)))
        .ok_or_else(|| PipelineError::Parse {
            path: String::new(),
            message: format!(
                "no coordinate columns (lon/lat, longitude/latitude or x/y) in header '{}'",
                headers.iter().collect::<Vec<_>>().join(",")
            ),
        })?;
    let name_col = position("name");

    let mut points = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let row = idx + 1;
        let coordinate = |col: usize, role: &str| -> Result<f64> {
            let raw = record.get(col).unwrap_or("");
            raw.parse::<f64>().map_err(|_| PipelineError::Parse {
                path: String::new(),
                message: format!("row {}: invalid {} '{}'", row, role, raw),
            })
        };

        points.push(SitePoint {
            name: name_col
                .and_then(|c| record.get(c))
                .filter(|s| !s.is_empty())
                .map(String::from),
            lon: coordinate(lon_col, "longitude")?,
            lat: coordinate(lat_col, "latitude")?,
            attributes: headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect(),
        });
    }

    Ok(assign_ids(points, crs)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_sites_lon_lat() {
        let csv = "name,lon,lat,elevation\nAlpha,1.5,8.5,120\nBravo,4.5,4.5,95\n";
        let sites = read_sites(csv.as_bytes(), CrsCode::Epsg4326).unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].id, "SITE_0001");
        assert_eq!(sites[1].id, "SITE_0002");
        assert_eq!(sites[0].name.as_deref(), Some("Alpha"));
        assert_eq!((sites[1].lon, sites[1].lat), (4.5, 4.5));
        assert_eq!(sites[0].attribute("elevation"), Some("120"));
        assert_eq!(sites[0].attributes.len(), 4);
    }

    #[test]
    fn test_read_sites_alternative_columns() {
        let csv = "station,Longitude,Latitude\nA,-1.25,51.5\n";
        let sites = read_sites(csv.as_bytes(), CrsCode::Epsg4326).unwrap();
        assert_eq!((sites[0].lon, sites[0].lat), (-1.25, 51.5));
        assert_eq!(sites[0].name, None);

        let csv = "id,x,y\n7, 100.0 , 200.0\n";
        let sites = read_sites(csv.as_bytes(), CrsCode::Epsg3857).unwrap();
        assert_eq!((sites[0].lon, sites[0].lat), (100.0, 200.0));
        assert_eq!(sites[0].crs, CrsCode::Epsg3857);
    }

    #[test]
    fn test_read_sites_errors() {
        let err = read_sites("name,east,north\nA,1,2\n".as_bytes(), CrsCode::Epsg4326).unwrap_err();
        assert!(err.to_string().contains("no coordinate columns"));

        let err = read_sites("lon,lat\n1.0,abc\n".as_bytes(), CrsCode::Epsg4326).unwrap_err();
        assert!(err.to_string().contains("row 1: invalid latitude 'abc'"));
    }

    #[test]
    fn test_read_aoi_by_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let wkt = dir.path().join("basin.wkt");
        fs::write(&wkt, "POLYGON((2 2, 6 2, 6 6, 2 6, 2 2))").unwrap();
        let aoi = read_aoi(&wkt, CrsCode::Epsg4326).unwrap();
        assert!(aoi.contains_point(4.0, 4.0));

        let bad = dir.path().join("basin.geojson");
        fs::write(&bad, "{ not json").unwrap();
        let err = read_aoi(&bad, CrsCode::Epsg4326).unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
        assert!(err.to_string().contains("basin.geojson"));
    }
}
