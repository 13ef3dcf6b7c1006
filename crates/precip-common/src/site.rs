//! Point sites used for extraction and reporting.

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};
use crate::CrsCode;

/// Prefix of generated site identifiers.
pub const SITE_ID_PREFIX: &str = "SITE_";

/// A named point location.
///
/// `attributes` keeps every original column of the input row, in input
/// order, so the site index can reproduce them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    pub name: Option<String>,
    pub lon: f64,
    pub lat: f64,
    pub crs: CrsCode,
    pub attributes: Vec<(String, String)>,
}

impl Site {
    /// Look up an original attribute by column name.
    pub fn attribute(&self, column: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }
}

/// A site row before an identifier is assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct SitePoint {
    pub name: Option<String>,
    pub lon: f64,
    pub lat: f64,
    pub attributes: Vec<(String, String)>,
}

impl SitePoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self {
            name: None,
            lon,
            lat,
            attributes: Vec::new(),
        }
    }
}

/// Identifier for the 1-based row position.
pub fn site_id(position: usize) -> String {
    format!("{}{:04}", SITE_ID_PREFIX, position)
}

/// Assign sequential identifiers (`SITE_0001`, ...) in input row order.
///
/// Coordinates must be finite; a bad row is rejected rather than skipped so
/// that identifiers stay aligned with the input table.
pub fn assign_ids(points: Vec<SitePoint>, crs: CrsCode) -> CommonResult<Vec<Site>> {
    points
        .into_iter()
        .enumerate()
        .map(|(idx, point)| {
            if !point.lon.is_finite() || !point.lat.is_finite() {
                return Err(CommonError::invalid_site(format!(
                    "row {} has non-finite coordinates ({}, {})",
                    idx + 1,
                    point.lon,
                    point.lat
                )));
            }
            Ok(Site {
                id: site_id(idx + 1),
                name: point.name,
                lon: point.lon,
                lat: point.lat,
                crs,
                attributes: point.attributes,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_follow_row_order() {
        let sites = assign_ids(
            vec![SitePoint::new(1.0, 2.0), SitePoint::new(3.0, 4.0)],
            CrsCode::Epsg4326,
        )
        .unwrap();
        assert_eq!(sites[0].id, "SITE_0001");
        assert_eq!(sites[1].id, "SITE_0002");
        assert_eq!(sites[1].lon, 3.0);
    }

    #[test]
    fn test_rejects_non_finite() {
        let result = assign_ids(vec![SitePoint::new(f64::NAN, 2.0)], CrsCode::Epsg4326);
        assert!(matches!(result, Err(CommonError::InvalidSite(_))));
    }

    #[test]
    fn test_attribute_lookup() {
        let mut point = SitePoint::new(0.0, 0.0);
        point.attributes.push(("station".to_string(), "Alpha".to_string()));
        let sites = assign_ids(vec![point], CrsCode::Epsg4326).unwrap();
        assert_eq!(sites[0].attribute("station"), Some("Alpha"));
        assert_eq!(sites[0].attribute("missing"), None);
    }
}
