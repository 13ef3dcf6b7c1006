//! Tabular outputs.
//!
//! Tables are written to a `.partial` sibling and renamed into place, like
//! the Zarr products.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use grid_engine::{AreaSeriesPoint, SiteReport};
use precip_common::{Site, MONTH_LABELS};

use crate::error::{PipelineError, Result};

/// Cell text for a missing value.
pub const MISSING: &str = "NA";

/// File name of the site index.
pub const SITE_INDEX_FILE: &str = "sites_index.csv";

/// Values are written with three decimals.
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.3}", v),
        _ => MISSING.to_string(),
    }
}

/// `region,year,month,value_mm`, one row per point.
pub fn write_area_series<W: Write>(writer: W, region: &str, points: &[AreaSeriesPoint]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["region", "year", "month", "value_mm"])?;
    for point in points {
        csv.write_record([
            region.to_string(),
            point.key.year().to_string(),
            point.key.month().to_string(),
            format_value(point.value_mm),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

/// `year,Jan,...,Dec`, one row per year in ascending order.
pub fn write_site_report<W: Write>(writer: W, report: &SiteReport) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec!["year"];
    header.extend(MONTH_LABELS);
    csv.write_record(&header)?;

    for (year, row) in &report.rows {
        let mut record = Vec::with_capacity(13);
        record.push(year.to_string());
        record.extend(row.iter().map(|v| format_value(v.map(f64::from))));
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}

/// Leading columns of the site index.
const SITE_INDEX_COLUMNS: [&str; 3] = ["site_id", "lon", "lat"];

/// `site_id,lon,lat,<original columns...>`.
///
/// Original columns are those of the first site; every site of one table
/// shares them. An original column named like a leading one is not repeated.
pub fn write_site_index<W: Write>(writer: W, sites: &[Site]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);

    let columns: Vec<&str> = sites
        .first()
        .map(|s| {
            s.attributes
                .iter()
                .map(|(name, _)| name.as_str())
                .filter(|name| !SITE_INDEX_COLUMNS.iter().any(|c| c.eq_ignore_ascii_case(name)))
                .collect()
        })
        .unwrap_or_default();

    let mut header: Vec<&str> = SITE_INDEX_COLUMNS.to_vec();
    header.extend(&columns);
    csv.write_record(&header)?;

    for site in sites {
        let mut record = vec![site.id.clone(), site.lon.to_string(), site.lat.to_string()];
        record.extend(
            columns
                .iter()
                .map(|c| site.attribute(c).unwrap_or_default().to_string()),
        );
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}

/// Per-site report file name.
pub fn site_report_name(site_id: &str) -> String {
    format!("{}.csv", site_id)
}

/// Area series file name.
pub fn area_series_name(variable: &str, region: &str) -> String {
    format!("{}_{}_monthly.csv", variable, region)
}

/// Write a table to `path` through a staging file.
pub fn write_table<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut fs::File) -> Result<()>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PipelineError::at(parent, e))?;
    }

    let staging = staging_path(path);
    let mut file = fs::File::create(&staging).map_err(|e| PipelineError::at(&staging, e))?;
    write(&mut file).map_err(|e| PipelineError::at(path, e))?;
    file.sync_all().map_err(|e| PipelineError::at(&staging, e))?;
    drop(file);

    fs::rename(&staging, path).map_err(|e| PipelineError::at(path, e))?;
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}
