//! Output file names.
//!
//! - annual total: `<variable>_<region>_<year>.zarr`
//! - annual climatology: `<variable>_<region>_clim_<start>-<end>.zarr`
//! - monthly climatology: `<variable>_<region>_clim_<start>-<end>_<MM>.zarr`

use crate::config::YearWindow;

pub const ZARR_EXTENSION: &str = "zarr";

pub fn annual_total_name(variable: &str, region: &str, year: i32) -> String {
    format!("{}_{}_{}.{}", variable, region, year, ZARR_EXTENSION)
}

pub fn annual_climatology_name(variable: &str, region: &str, window: YearWindow) -> String {
    format!("{}_{}_clim_{}.{}", variable, region, window, ZARR_EXTENSION)
}

pub fn monthly_climatology_name(variable: &str, region: &str, window: YearWindow, month: u32) -> String {
    format!(
        "{}_{}_clim_{}_{:02}.{}",
        variable, region, window, month, ZARR_EXTENSION
    )
}

/// Year of an annual-total file written for `variable` and `region`.
///
/// Other files, climatologies included, give `None`.
pub fn parse_annual_total_name(name: &str, variable: &str, region: &str) -> Option<i32> {
    let stem = name.strip_suffix(ZARR_EXTENSION)?.strip_suffix('.')?;
    let year = stem
        .strip_prefix(variable)?
        .strip_prefix('_')?
        .strip_prefix(region)?
        .strip_prefix('_')?;
    if year.is_empty() || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    year.parse().ok()
}

/// Group label of a monthly climatology in run summaries.
pub fn month_group(window: YearWindow, month: u32) -> String {
    format!("{}/{:02}", window, month)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_names() {
        let window = YearWindow::new(1991, 2020);
        assert_eq!(annual_total_name("tp", "basin", 2003), "tp_basin_2003.zarr");
        assert_eq!(
            annual_climatology_name("tp", "basin", window),
            "tp_basin_clim_1991-2020.zarr"
        );
        assert_eq!(
            monthly_climatology_name("tp", "basin", window, 4),
            "tp_basin_clim_1991-2020_04.zarr"
        );
    }

    #[test]
    fn test_parse_annual_total_name() {
        assert_eq!(parse_annual_total_name("tp_basin_2003.zarr", "tp", "basin"), Some(2003));
        assert_eq!(parse_annual_total_name("tp_basin_clim_1991-2020.zarr", "tp", "basin"), None);
        assert_eq!(parse_annual_total_name("tp_other_2003.zarr", "tp", "basin"), None);
        assert_eq!(parse_annual_total_name("tp_basin_2003.zarr.partial", "tp", "basin"), None);
        assert_eq!(parse_annual_total_name("tp_basin_.zarr", "tp", "basin"), None);
    }
}
