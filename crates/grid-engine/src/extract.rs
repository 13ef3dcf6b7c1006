//! Point sampling of grid stacks and per-site monthly reports.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use precip_common::{CalendarKey, GridStack, Site};
use projection::site_position;

use crate::error::{EngineError, Result};
use crate::units::{ScalingPolicy, Weighting};

/// Value of one site for one period. `value` is NaN when missing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionRecord {
    pub site_id: String,
    pub key: CalendarKey,
    pub value: f32,
}

impl ExtractionRecord {
    pub fn is_missing(&self) -> bool {
        self.value.is_nan()
    }
}

/// Sample every grid of a keyed stack at every site.
///
/// Lookup is nearest-cell (the cell containing the point). Sites outside the
/// grid get NaN. Records are ordered site-major, then stack order.
pub fn sample(stack: &GridStack, sites: &[Site]) -> Result<Vec<ExtractionRecord>> {
    let Some(geometry) = stack.geometry() else {
        return Ok(Vec::new());
    };

    let keys = stack
        .iter()
        .enumerate()
        .map(|(idx, g)| g.key().ok_or(EngineError::MissingKey(idx)))
        .collect::<Result<Vec<_>>>()?;

    let mut records = Vec::with_capacity(sites.len() * stack.len());
    for site in sites {
        let (x, y) = site_position(site, geometry.crs).map_err(|_| {
            EngineError::crs_mismatch(format!("site {}", site.id), site.crs, geometry.crs)
        })?;
        let cell = geometry.cell_at(x, y);
        if cell.is_none() {
            debug!(site = %site.id, x, y, "Site outside grid coverage");
        }

        for (grid, key) in stack.iter().zip(&keys) {
            let value = cell
                .and_then(|(col, row)| grid.get(col, row))
                .unwrap_or(f32::NAN);
            records.push(ExtractionRecord {
                site_id: site.id.clone(),
                key: *key,
                value,
            });
        }
    }

    Ok(records)
}

/// Multiply each record by the day count of its month.
pub fn to_monthly_totals(records: &[ExtractionRecord]) -> Vec<ExtractionRecord> {
    apply_weighting(records, Weighting::DaysInMonth)
}

/// Monthly totals under the given input semantics.
pub fn scale_records(records: &[ExtractionRecord], policy: ScalingPolicy) -> Vec<ExtractionRecord> {
    apply_weighting(records, policy.weighting())
}

fn apply_weighting(records: &[ExtractionRecord], weighting: Weighting) -> Vec<ExtractionRecord> {
    records
        .iter()
        .map(|r| ExtractionRecord {
            site_id: r.site_id.clone(),
            key: r.key,
            value: r.value * weighting.factor(r.key),
        })
        .collect()
}

/// Wide monthly report for one site: one row per year, twelve month columns.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteReport {
    pub site_id: String,
    /// Year -> values for Jan..Dec; `None` marks a missing value.
    pub rows: BTreeMap<i32, [Option<f32>; 12]>,
}

impl SiteReport {
    /// Pivot records into one report per site, in first-seen site order.
    ///
    /// Months without a record, and NaN records, are `None`; zero stays zero.
    pub fn pivot(records: &[ExtractionRecord]) -> Vec<SiteReport> {
        let mut reports: Vec<SiteReport> = Vec::new();
        let mut index: BTreeMap<&str, usize> = BTreeMap::new();

        for record in records {
            let pos = *index.entry(record.site_id.as_str()).or_insert_with(|| {
                reports.push(SiteReport {
                    site_id: record.site_id.clone(),
                    rows: BTreeMap::new(),
                });
                reports.len() - 1
            });

            let row = reports[pos]
                .rows
                .entry(record.key.year())
                .or_insert([None; 12]);
            row[record.key.month_index()] = if record.is_missing() {
                None
            } else {
                Some(record.value)
            };
        }

        reports
    }

    /// Value for a year and month (1-12).
    pub fn value(&self, year: i32, month: u32) -> Option<f32> {
        self.rows
            .get(&year)
            .and_then(|row| row.get((month as usize).checked_sub(1)?).copied())
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use precip_common::{assign_ids, BoundingBox, CrsCode, Grid, GridGeometry, SitePoint};

    fn stack() -> GridStack {
        let geometry = GridGeometry::new(2, 2, BoundingBox::new(0.0, 0.0, 2.0, 2.0), CrsCode::Epsg4326);
        let jan = Grid::new(geometry.clone(), vec![1.0, 2.0, 3.0, 4.0])
            .unwrap()
            .with_key(CalendarKey::new(2000, 1).unwrap());
        let feb = Grid::new(geometry, vec![10.0, 20.0, 30.0, 40.0])
            .unwrap()
            .with_key(CalendarKey::new(2000, 2).unwrap());
        GridStack::new(vec![jan, feb]).unwrap()
    }

    #[test]
    fn test_sample_is_site_major_nearest_cell() {
        let sites = assign_ids(
            vec![SitePoint::new(1.5, 1.5), SitePoint::new(0.2, 0.2)],
            CrsCode::Epsg4326,
        )
        .unwrap();
        let records = sample(&stack(), &sites).unwrap();
        let values: Vec<f32> = records.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![2.0, 20.0, 3.0, 30.0]);
        assert_eq!(records[0].site_id, "SITE_0001");
        assert_eq!(records[2].site_id, "SITE_0002");
    }

    #[test]
    fn test_site_in_unsupported_crs_is_mismatch() {
        let sites = assign_ids(vec![SitePoint::new(0.5, 0.5)], CrsCode::Epsg5070).unwrap();
        assert!(matches!(
            sample(&stack(), &sites),
            Err(EngineError::CrsMismatch { .. })
        ));
    }

    #[test]
    fn test_pivot_marks_absent_months_missing() {
        let records = vec![
            ExtractionRecord {
                site_id: "SITE_0001".into(),
                key: CalendarKey::new(2000, 3).unwrap(),
                value: 0.0,
            },
            ExtractionRecord {
                site_id: "SITE_0001".into(),
                key: CalendarKey::new(2001, 1).unwrap(),
                value: f32::NAN,
            },
        ];
        let reports = SiteReport::pivot(&records);
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.value(2000, 3), Some(0.0));
        assert_eq!(report.value(2000, 4), None);
        assert_eq!(report.value(2001, 1), None);
        assert_eq!(report.rows.len(), 2);
    }
}
