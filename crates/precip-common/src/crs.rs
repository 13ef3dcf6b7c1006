//! Coordinate Reference System codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// CRS codes that grids, AOIs and sites may be expressed in.
///
/// Serialized as the `EPSG:<code>` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CrsCode {
    /// WGS84 Geographic (lon/lat in degrees)
    Epsg4326,
    /// Web Mercator (meters)
    Epsg3857,
    /// NAD83 Geographic
    Epsg4269,
    /// CONUS Albers Equal Area
    Epsg5070,
}

impl CrsCode {
    /// Parse a CRS identifier.
    ///
    /// Accepts formats like:
    /// - "EPSG:4326"
    /// - "epsg:4326"
    /// - "CRS:84" / "OGC:CRS84"
    /// - "urn:ogc:def:crs:EPSG::4326" / "urn:ogc:def:crs:OGC:1.3:CRS84" (GeoJSON)
    pub fn parse(s: &str) -> Result<Self, CrsParseError> {
        let normalized = s.trim().to_uppercase();

        match normalized.as_str() {
            "EPSG:4326" | "CRS:84" | "OGC:CRS84" | "URN:OGC:DEF:CRS:EPSG::4326"
            | "URN:OGC:DEF:CRS:OGC:1.3:CRS84" => Ok(CrsCode::Epsg4326),
            "EPSG:3857" | "EPSG:900913" | "URN:OGC:DEF:CRS:EPSG::3857" => Ok(CrsCode::Epsg3857),
            "EPSG:4269" | "URN:OGC:DEF:CRS:EPSG::4269" => Ok(CrsCode::Epsg4269),
            "EPSG:5070" | "URN:OGC:DEF:CRS:EPSG::5070" => Ok(CrsCode::Epsg5070),
            _ => Err(CrsParseError::UnsupportedCrs(s.to_string())),
        }
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326 | CrsCode::Epsg4269)
    }
}

impl Default for CrsCode {
    fn default() -> Self {
        CrsCode::Epsg4326
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            CrsCode::Epsg4326 => "EPSG:4326",
            CrsCode::Epsg3857 => "EPSG:3857",
            CrsCode::Epsg4269 => "EPSG:4269",
            CrsCode::Epsg5070 => "EPSG:5070",
        };
        write!(f, "{}", code)
    }
}

impl TryFrom<String> for CrsCode {
    type Error = CrsParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CrsCode::parse(&value)
    }
}

impl From<CrsCode> for String {
    fn from(code: CrsCode) -> Self {
        code.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crs() {
        assert_eq!(CrsCode::parse("EPSG:4326").unwrap(), CrsCode::Epsg4326);
        assert_eq!(CrsCode::parse("epsg:3857").unwrap(), CrsCode::Epsg3857);
        assert_eq!(CrsCode::parse("CRS:84").unwrap(), CrsCode::Epsg4326);
        assert_eq!(
            CrsCode::parse("urn:ogc:def:crs:OGC:1.3:CRS84").unwrap(),
            CrsCode::Epsg4326
        );
        assert!(CrsCode::parse("EPSG:99999").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for code in [
            CrsCode::Epsg4326,
            CrsCode::Epsg3857,
            CrsCode::Epsg4269,
            CrsCode::Epsg5070,
        ] {
            assert_eq!(CrsCode::parse(&code.to_string()).unwrap(), code);
        }
    }

    #[test]
    fn test_serde_uses_epsg_strings() {
        let json = serde_json::to_string(&CrsCode::Epsg5070).unwrap();
        assert_eq!(json, "\"EPSG:5070\"");
        let code: CrsCode = serde_json::from_str("\"epsg:3857\"").unwrap();
        assert_eq!(code, CrsCode::Epsg3857);
        assert!(serde_json::from_str::<CrsCode>("\"EPSG:1\"").is_err());
    }
}
