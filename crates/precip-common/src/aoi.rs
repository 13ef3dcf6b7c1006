//! Area of interest polygons.
//!
//! An AOI is one polygon (possibly stored as a multipolygon of several parts,
//! each with optional holes) together with the CRS its vertices are in. AOIs
//! are read from GeoJSON or WKT.

use serde_json::Value;

use crate::error::{CommonError, CommonResult};
use crate::{BoundingBox, CrsCode};

/// A closed ring of (x, y) vertices; first and last points are equal.
pub type Ring = Vec<(f64, f64)>;

/// One polygon: exterior ring plus holes.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonPart {
    pub exterior: Ring,
    pub holes: Vec<Ring>,
}

impl PolygonPart {
    /// Even-odd test over the exterior and every hole.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        let mut inside = ring_crossings(&self.exterior, x, y);
        for hole in &self.holes {
            if ring_crossings(hole, x, y) {
                inside = !inside;
            }
        }
        inside
    }
}

/// Ray casting for a single ring.
fn ring_crossings(ring: &[(f64, f64)], x: f64, y: f64) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;

    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];

        if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// Polygon region used to crop and mask grids.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaOfInterest {
    parts: Vec<PolygonPart>,
    crs: CrsCode,
}

impl AreaOfInterest {
    /// Build an AOI from polygon parts, validating every ring.
    pub fn new(parts: Vec<PolygonPart>, crs: CrsCode) -> CommonResult<Self> {
        if parts.is_empty() {
            return Err(CommonError::invalid_aoi("polygon has no parts"));
        }
        let parts = parts
            .into_iter()
            .map(|part| {
                Ok(PolygonPart {
                    exterior: close_ring(part.exterior)?,
                    holes: part
                        .holes
                        .into_iter()
                        .map(close_ring)
                        .collect::<CommonResult<Vec<_>>>()?,
                })
            })
            .collect::<CommonResult<Vec<_>>>()?;
        Ok(Self { parts, crs })
    }

    /// Single-ring polygon convenience constructor.
    pub fn from_ring(ring: Ring, crs: CrsCode) -> CommonResult<Self> {
        Self::new(
            vec![PolygonPart {
                exterior: ring,
                holes: Vec::new(),
            }],
            crs,
        )
    }

    pub fn crs(&self) -> CrsCode {
        self.crs
    }

    pub fn parts(&self) -> &[PolygonPart] {
        &self.parts
    }

    /// Bounding extent of all exterior rings.
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::enclosing(
            self.parts
                .iter()
                .flat_map(|p| p.exterior.iter().copied()),
        )
        // new() guarantees at least one ring of four points
        .unwrap_or_else(|| BoundingBox::new(0.0, 0.0, 0.0, 0.0))
    }

    /// Whether the point lies inside any part.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        self.parts.iter().any(|p| p.contains_point(x, y))
    }

    /// Transform every vertex into `target` coordinates.
    pub fn map_coords<F, E>(&self, target: CrsCode, f: F) -> Result<AreaOfInterest, E>
    where
        F: Fn(f64, f64) -> Result<(f64, f64), E>,
    {
        let map_ring = |ring: &Ring| -> Result<Ring, E> {
            ring.iter().map(|&(x, y)| f(x, y)).collect()
        };

        let mut parts = Vec::with_capacity(self.parts.len());
        for part in &self.parts {
            parts.push(PolygonPart {
                exterior: map_ring(&part.exterior)?,
                holes: part.holes.iter().map(map_ring).collect::<Result<_, E>>()?,
            });
        }

        Ok(AreaOfInterest {
            parts,
            crs: target,
        })
    }

    /// Parse a WKT `POLYGON` or `MULTIPOLYGON`.
    ///
    /// Accepts formats:
    /// - `POLYGON((x1 y1, x2 y2, x3 y3, x1 y1))`
    /// - `POLYGON((outer), (hole))`
    /// - `MULTIPOLYGON(((ring1)),((ring2)))`
    pub fn from_wkt(wkt: &str, crs: CrsCode) -> CommonResult<Self> {
        let wkt = wkt.trim();
        let upper = wkt.to_uppercase();

        let (is_multi, keyword_len) = if upper.starts_with("MULTIPOLYGON") {
            (true, "MULTIPOLYGON".len())
        } else if upper.starts_with("POLYGON") {
            (false, "POLYGON".len())
        } else {
            return Err(CommonError::invalid_aoi(
                "Expected POLYGON or MULTIPOLYGON format",
            ));
        };

        let body = strip_parens(wkt[keyword_len..].trim())?;

        let parts = if is_multi {
            split_top_level(body)?
                .into_iter()
                .map(|poly| parse_wkt_polygon_body(strip_parens(poly)?))
                .collect::<CommonResult<Vec<_>>>()?
        } else {
            vec![parse_wkt_polygon_body(body)?]
        };

        Self::new(parts, crs)
    }

    /// Parse a GeoJSON geometry, Feature, or single-feature FeatureCollection.
    ///
    /// A named `crs` member overrides `default_crs`.
    pub fn from_geojson(value: &Value, default_crs: CrsCode) -> CommonResult<Self> {
        let crs = match value
            .get("crs")
            .and_then(|c| c.get("properties"))
            .and_then(|p| p.get("name"))
            .and_then(|n| n.as_str())
        {
            Some(name) => CrsCode::parse(name)?,
            None => default_crs,
        };

        let geometry = geojson_geometry(value)?;
        let kind = geometry
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| CommonError::invalid_aoi("geometry has no type"))?;
        let coords = geometry
            .get("coordinates")
            .ok_or_else(|| CommonError::invalid_aoi("geometry has no coordinates"))?;

        let parts = match kind {
            "Polygon" => vec![geojson_polygon(coords)?],
            "MultiPolygon" => coords
                .as_array()
                .ok_or_else(|| CommonError::invalid_aoi("MultiPolygon coordinates must be an array"))?
                .iter()
                .map(geojson_polygon)
                .collect::<CommonResult<Vec<_>>>()?,
            other => {
                return Err(CommonError::invalid_aoi(format!(
                    "expected Polygon or MultiPolygon geometry, got {}",
                    other
                )))
            }
        };

        Self::new(parts, crs)
    }
}

fn close_ring(mut ring: Ring) -> CommonResult<Ring> {
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
        if first != last {
            ring.push(first);
        }
    }
    if ring.len() < 4 {
        return Err(CommonError::invalid_aoi(
            "Polygon must have at least 4 points (including closing point)",
        ));
    }
    if ring.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
        return Err(CommonError::invalid_aoi("Polygon has non-finite coordinates"));
    }
    Ok(ring)
}

/// Strip one level of enclosing parentheses.
fn strip_parens(s: &str) -> CommonResult<&str> {
    let s = s.trim();
    if s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
        Ok(&s[1..s.len() - 1])
    } else {
        Err(CommonError::invalid_aoi(format!(
            "Missing parentheses around '{}'",
            s
        )))
    }
}

/// Split `(a),(b),(c)` into its top-level parenthesised groups.
fn split_top_level(s: &str) -> CommonResult<Vec<&str>> {
    let mut groups = Vec::new();
    let mut depth = 0i32;
    let mut start = None;

    for (idx, ch) in s.char_indices() {
        match ch {
            '(' => {
                if depth == 0 {
                    start = Some(idx);
                }
                depth += 1;
            }
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(CommonError::invalid_aoi("Invalid parenthesis order"));
                }
                if depth == 0 {
                    if let Some(begin) = start.take() {
                        groups.push(&s[begin..=idx]);
                    }
                }
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(CommonError::invalid_aoi("Unbalanced parentheses"));
    }
    if groups.is_empty() {
        return Err(CommonError::invalid_aoi("No coordinate groups found"));
    }
    Ok(groups)
}

fn parse_wkt_polygon_body(body: &str) -> CommonResult<PolygonPart> {
    let mut rings = split_top_level(body)?
        .into_iter()
        .map(|ring| parse_wkt_ring(strip_parens(ring)?))
        .collect::<CommonResult<Vec<_>>>()?;
    let exterior = rings.remove(0);
    Ok(PolygonPart {
        exterior,
        holes: rings,
    })
}

fn parse_wkt_ring(coords: &str) -> CommonResult<Ring> {
    coords
        .split(',')
        .map(|pair| {
            let parts: Vec<&str> = pair.split_whitespace().collect();
            if parts.len() != 2 {
                return Err(CommonError::invalid_aoi(format!(
                    "Expected 'x y' format, got '{}'",
                    pair.trim()
                )));
            }
            let x: f64 = parts[0]
                .parse()
                .map_err(|_| CommonError::invalid_aoi(format!("Invalid coordinate '{}'", parts[0])))?;
            let y: f64 = parts[1]
                .parse()
                .map_err(|_| CommonError::invalid_aoi(format!("Invalid coordinate '{}'", parts[1])))?;
            Ok((x, y))
        })
        .collect()
}

fn geojson_geometry(value: &Value) -> CommonResult<&Value> {
    match value.get("type").and_then(|t| t.as_str()) {
        Some("FeatureCollection") => {
            let features = value
                .get("features")
                .and_then(|f| f.as_array())
                .ok_or_else(|| CommonError::invalid_aoi("FeatureCollection has no features"))?;
            if features.len() != 1 {
                return Err(CommonError::invalid_aoi(format!(
                    "expected exactly one feature, found {}",
                    features.len()
                )));
            }
            geojson_geometry(&features[0])
        }
        Some("Feature") => value
            .get("geometry")
            .filter(|g| !g.is_null())
            .ok_or_else(|| CommonError::invalid_aoi("Feature has no geometry")),
        Some(_) => Ok(value),
        None => Err(CommonError::invalid_aoi("GeoJSON object has no type")),
    }
}

fn geojson_polygon(coords: &Value) -> CommonResult<PolygonPart> {
    let rings = coords
        .as_array()
        .ok_or_else(|| CommonError::invalid_aoi("Polygon coordinates must be an array"))?;
    let mut parsed = rings
        .iter()
        .map(geojson_ring)
        .collect::<CommonResult<Vec<_>>>()?;
    if parsed.is_empty() {
        return Err(CommonError::invalid_aoi("Polygon has no rings"));
    }
    let exterior = parsed.remove(0);
    Ok(PolygonPart {
        exterior,
        holes: parsed,
    })
}

fn geojson_ring(ring: &Value) -> CommonResult<Ring> {
    ring.as_array()
        .ok_or_else(|| CommonError::invalid_aoi("ring must be an array of positions"))?
        .iter()
        .map(|pos| {
            let x = pos.get(0).and_then(|v| v.as_f64());
            let y = pos.get(1).and_then(|v| v.as_f64());
            match (x, y) {
                (Some(x), Some(y)) => Ok((x, y)),
                _ => Err(CommonError::invalid_aoi(format!("invalid position {}", pos))),
            }
        })
        .collect()
}
