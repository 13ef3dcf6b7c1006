//! Attribute layout shared by the reader and writer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use precip_common::{BoundingBox, CalendarKey, CrsCode, GridGeometry};

use crate::aggregate::{AggregationMetadata, ReduceOp};
use crate::error::{EngineError, Result};
use crate::units::Weighting;

/// Names written alongside an aggregated product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductLabels {
    pub variable: String,
    pub region: String,
    pub units: String,
}

/// Decoded array attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct GridAttributes {
    pub bbox: BoundingBox,
    pub crs: CrsCode,
    pub units: Option<String>,
    pub band_labels: Vec<String>,
    pub variable: Option<String>,
    pub region: Option<String>,
    pub aggregation: Option<AggregationMetadata>,
}

impl GridAttributes {
    /// Attributes of a plain grid.
    pub fn for_geometry(geometry: &GridGeometry) -> Self {
        Self {
            bbox: geometry.extent,
            crs: geometry.crs,
            units: None,
            band_labels: Vec::new(),
            variable: None,
            region: None,
            aggregation: None,
        }
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_band_labels(mut self, labels: Vec<String>) -> Self {
        self.band_labels = labels;
        self
    }

    pub fn with_product(mut self, labels: &ProductLabels, metadata: &AggregationMetadata) -> Self {
        self.units = Some(labels.units.clone());
        self.variable = Some(labels.variable.clone());
        self.region = Some(labels.region.clone());
        self.aggregation = Some(metadata.clone());
        self
    }

    /// Encode as a Zarr attribute map.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut attrs = Map::new();
        attrs.insert("bbox".to_string(), self.bbox.to_json_array());
        attrs.insert("crs".to_string(), serde_json::json!(self.crs.to_string()));
        if let Some(units) = &self.units {
            attrs.insert("units".to_string(), serde_json::json!(units));
        }
        if !self.band_labels.is_empty() {
            attrs.insert("band_labels".to_string(), serde_json::json!(self.band_labels));
        }
        if let Some(variable) = &self.variable {
            attrs.insert("variable".to_string(), serde_json::json!(variable));
        }
        if let Some(region) = &self.region {
            attrs.insert("region".to_string(), serde_json::json!(region));
        }
        if let Some(meta) = &self.aggregation {
            attrs.insert("operator".to_string(), serde_json::json!(meta.operator));
            attrs.insert(
                "keys".to_string(),
                serde_json::json!(meta.keys.iter().map(|k| k.to_string()).collect::<Vec<_>>()),
            );
            if let Some((start, end)) = meta.year_range {
                attrs.insert("year_range".to_string(), serde_json::json!([start, end]));
            }
            attrs.insert("weighting".to_string(), serde_json::json!(meta.weighting));
            attrs.insert("count".to_string(), serde_json::json!(meta.count));
        }
        attrs
    }

    /// Decode from a Zarr attribute map. `bbox` is required; `crs` defaults
    /// to EPSG:4326.
    pub fn from_map(attrs: &Map<String, Value>) -> Result<Self> {
        let bbox = attrs
            .get("bbox")
            .ok_or_else(|| EngineError::invalid_metadata("missing bbox attribute"))
            .and_then(|v| {
                BoundingBox::from_json_array(v).map_err(|e| EngineError::invalid_metadata(e.to_string()))
            })?;

        let crs = match attrs.get("crs").and_then(|v| v.as_str()) {
            Some(code) => CrsCode::parse(code).map_err(|e| EngineError::invalid_metadata(e.to_string()))?,
            None => CrsCode::default(),
        };

        let text = |name: &str| attrs.get(name).and_then(|v| v.as_str()).map(String::from);

        let band_labels = match attrs.get("band_labels") {
            Some(v) => serde_json::from_value::<Vec<String>>(v.clone())?,
            None => Vec::new(),
        };

        let aggregation = match attrs.get("operator") {
            Some(op) => {
                let operator: ReduceOp = serde_json::from_value(op.clone())?;
                let keys = match attrs.get("keys").and_then(|v| v.as_array()) {
                    Some(keys) => keys
                        .iter()
                        .map(|k| parse_key(k.as_str().unwrap_or_default()))
                        .collect::<Result<Vec<_>>>()?,
                    None => Vec::new(),
                };
                let year_range = attrs
                    .get("year_range")
                    .map(|v| serde_json::from_value::<(i32, i32)>(v.clone()))
                    .transpose()?;
                let weighting = match attrs.get("weighting") {
                    Some(v) => serde_json::from_value(v.clone())?,
                    None => Weighting::None,
                };
                let count = attrs
                    .get("count")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(keys.len() as u64) as usize;
                Some(AggregationMetadata {
                    operator,
                    keys,
                    year_range,
                    weighting,
                    count,
                })
            }
            None => None,
        };

        Ok(Self {
            bbox,
            crs,
            units: text("units"),
            band_labels,
            variable: text("variable"),
            region: text("region"),
            aggregation,
        })
    }
}

/// Parse a `YYYY-MM` key string.
fn parse_key(s: &str) -> Result<CalendarKey> {
    let (year, month) = s
        .split_once('-')
        .ok_or_else(|| EngineError::invalid_metadata(format!("invalid key '{}'", s)))?;
    let year: i32 = year
        .parse()
        .map_err(|_| EngineError::invalid_metadata(format!("invalid key '{}'", s)))?;
    let month: u32 = month
        .parse()
        .map_err(|_| EngineError::invalid_metadata(format!("invalid key '{}'", s)))?;
    Ok(CalendarKey::new(year, month)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_bbox_is_invalid() {
        let attrs = Map::new();
        assert!(matches!(
            GridAttributes::from_map(&attrs),
            Err(EngineError::InvalidMetadata(_))
        ));
    }

    #[test]
    fn test_crs_defaults_to_geographic() {
        let mut attrs = Map::new();
        attrs.insert("bbox".to_string(), serde_json::json!([0.0, 0.0, 1.0, 1.0]));
        let decoded = GridAttributes::from_map(&attrs).unwrap();
        assert_eq!(decoded.crs, CrsCode::Epsg4326);
        assert!(decoded.aggregation.is_none());
    }

    #[test]
    fn test_product_attributes_decode() {
        let geometry = GridGeometry::new(1, 1, BoundingBox::new(0.0, 0.0, 1.0, 1.0), CrsCode::Epsg3857);
        let metadata = AggregationMetadata {
            operator: ReduceOp::WeightedSum,
            keys: vec![CalendarKey::new(2001, 1).unwrap(), CalendarKey::new(2001, 2).unwrap()],
            year_range: None,
            weighting: Weighting::DaysInMonth,
            count: 2,
        };
        let labels = ProductLabels {
            variable: "tp".into(),
            region: "basin".into(),
            units: "mm".into(),
        };
        let attrs = GridAttributes::for_geometry(&geometry).with_product(&labels, &metadata);
        let map = attrs.to_map();
        assert_eq!(map["operator"], serde_json::json!("weighted_sum"));
        assert_eq!(map["keys"], serde_json::json!(["2001-01", "2001-02"]));
        assert_eq!(GridAttributes::from_map(&map).unwrap(), attrs);
    }
}
