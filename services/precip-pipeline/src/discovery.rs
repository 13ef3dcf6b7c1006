//! Input discovery under the pipeline root.
//!
//! Calendar keys are derived while discovering, before any cell data is
//! read, so stages can group inputs and load only what a group needs.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use grid_engine::{read_attributes, read_band, read_grid};
use precip_common::{CalendarKey, Grid, TimeCodec};

use crate::config::{PipelineConfig, TimeSource};
use crate::error::{PipelineError, Result};
use crate::naming::{parse_annual_total_name, ZARR_EXTENSION};

/// One monthly grid: a band of a Zarr array and its calendar key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInput {
    pub path: PathBuf,
    pub band: usize,
    pub key: CalendarKey,
}

impl RawInput {
    /// Read the band's cells and attach the key.
    pub fn load(&self) -> Result<Grid> {
        let grid = read_band(&self.path, self.band).map_err(|e| PipelineError::at(&self.path, e))?;
        Ok(grid.with_key(self.key))
    }
}

/// An annual-total product found in the rasters directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnualInput {
    pub year: i32,
    pub path: PathBuf,
}

impl AnnualInput {
    pub fn load(&self) -> Result<Grid> {
        read_grid(&self.path).map_err(|e| PipelineError::at(&self.path, e))
    }
}

/// Fail unless the root directory exists.
pub fn check_root(config: &PipelineConfig) -> Result<()> {
    if !config.root.is_dir() {
        return Err(PipelineError::configuration(format!(
            "root directory {} does not exist",
            config.root.display()
        )));
    }
    Ok(())
}

/// Zarr arrays below `dir`, sorted by path. Arrays are not descended into.
///
/// A missing directory yields an empty list.
pub fn find_zarr_arrays(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    if !dir.is_dir() {
        return Ok(found);
    }

    let mut entries = WalkDir::new(dir).min_depth(1).sort_by_file_name().into_iter();
    while let Some(entry) = entries.next() {
        let entry = entry.map_err(|e| PipelineError::Storage(format!("{}: {}", dir.display(), e)))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) == Some(ZARR_EXTENSION) {
            found.push(entry.path().to_path_buf());
            entries.skip_current_dir();
        }
    }

    Ok(found)
}

/// Every monthly input grid under `raw/`, sorted by key then path.
///
/// Fails with `Discovery` when there are none, and with `Parse` naming the
/// file when a key cannot be derived.
pub fn discover_raw(config: &PipelineConfig) -> Result<Vec<RawInput>> {
    let raw_dir = config.raw_dir();
    let codec = config.time_codec();

    let mut inputs = Vec::new();
    for path in find_zarr_arrays(&raw_dir)? {
        match config.time_source {
            TimeSource::FileName => inputs.push(keyed_by_name(&codec, path)?),
            TimeSource::BandTimestamp => inputs.extend(keyed_by_band(&codec, &path)?),
        }
    }

    if inputs.is_empty() {
        return Err(PipelineError::discovery(format!(
            "no input grids found in {}",
            raw_dir.display()
        )));
    }

    inputs.sort_by(|a, b| (a.key, &a.path, a.band).cmp(&(b.key, &b.path, b.band)));
    info!(
        dir = %raw_dir.display(),
        inputs = inputs.len(),
        first = %inputs[0].key,
        last = %inputs[inputs.len() - 1].key,
        "Discovered raw inputs"
    );
    Ok(inputs)
}

fn keyed_by_name(codec: &TimeCodec, path: PathBuf) -> Result<RawInput> {
    let name = path.to_string_lossy();
    let key = codec
        .key_from_name(&name)
        .map_err(|e| PipelineError::parse(&path, e))?;
    Ok(RawInput { path, band: 0, key })
}

fn keyed_by_band(codec: &TimeCodec, path: &Path) -> Result<Vec<RawInput>> {
    let attrs = read_attributes(path).map_err(|e| PipelineError::at(path, e))?;
    if attrs.band_labels.is_empty() {
        return Err(PipelineError::parse(path, "array has no band labels"));
    }

    attrs
        .band_labels
        .iter()
        .enumerate()
        .map(|(band, label)| {
            let key = codec
                .key_from_band_label(label)
                .map_err(|e| PipelineError::parse(path, e))?;
            Ok(RawInput {
                path: path.to_path_buf(),
                band,
                key,
            })
        })
        .collect()
}

/// Annual totals for the configured variable and region, sorted by year.
///
/// Other arrays in the directory are ignored.
pub fn discover_annual_totals(config: &PipelineConfig) -> Result<Vec<AnnualInput>> {
    let mut inputs: Vec<AnnualInput> = find_zarr_arrays(&config.raster_output_dir())?
        .into_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            let year = parse_annual_total_name(name, &config.variable, &config.region)?;
            Some(AnnualInput { year, path })
        })
        .collect();
    inputs.sort_by_key(|i| i.year);

    debug!(count = inputs.len(), "Discovered annual totals");
    Ok(inputs)
}

/// The single file in `dir` with one of `extensions`.
///
/// Zero or several matches is a configuration error.
pub fn find_single_file(dir: &Path, extensions: &[&str], role: &str) -> Result<PathBuf> {
    if !dir.is_dir() {
        return Err(PipelineError::configuration(format!(
            "{} directory {} does not exist",
            role,
            dir.display()
        )));
    }

    let mut matches = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| PipelineError::Storage(format!("{}: {}", dir.display(), e)))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let extension = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        if extension.is_some_and(|e| extensions.contains(&e.as_str())) {
            matches.push(entry.into_path());
        }
    }

    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => Err(PipelineError::configuration(format!(
            "no {} file ({}) in {}",
            role,
            extensions.join(", "),
            dir.display()
        ))),
        n => Err(PipelineError::configuration(format!(
            "expected one {} file in {}, found {}: {}",
            role,
            dir.display(),
            n,
            matches
                .iter()
                .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_at(root: &Path) -> PipelineConfig {
        PipelineConfig {
            root: root.to_path_buf(),
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_find_zarr_arrays_does_not_descend() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("b.zarr/c/0")).unwrap();
        fs::create_dir_all(dir.path().join("nested/a.zarr")).unwrap();
        fs::create_dir_all(dir.path().join("b.zarr/inner.zarr")).unwrap();
        fs::write(dir.path().join("notes.zarr"), "file, not an array").unwrap();

        let found = find_zarr_arrays(dir.path()).unwrap();
        assert_eq!(
            found,
            vec![dir.path().join("b.zarr"), dir.path().join("nested/a.zarr")]
        );
        assert!(find_zarr_arrays(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_discover_raw_by_name() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join("raw");
        for name in ["era5.tp.2001.02.zarr", "era5.tp.2000.12.zarr", "era5.tp.2001.01.zarr"] {
            fs::create_dir_all(raw.join(name)).unwrap();
        }

        let inputs = discover_raw(&config_at(dir.path())).unwrap();
        let keys: Vec<String> = inputs.iter().map(|i| i.key.to_string()).collect();
        assert_eq!(keys, vec!["2000-12", "2001-01", "2001-02"]);
        assert!(inputs.iter().all(|i| i.band == 0));
    }

    #[test]
    fn test_discover_raw_with_underscore_pattern() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join("raw");
        for name in ["chirps_precip_1995_04.zarr", "chirps_precip_1994_12.zarr"] {
            fs::create_dir_all(raw.join(name)).unwrap();
        }

        let mut config = config_at(dir.path());
        config.token_pattern = precip_common::TokenPattern {
            separator: '_',
            year_index: 2,
            month_index: 3,
        };
        let inputs = discover_raw(&config).unwrap();
        let keys: Vec<String> = inputs.iter().map(|i| i.key.to_string()).collect();
        assert_eq!(keys, vec!["1994-12", "1995-04"]);
    }

    #[test]
    fn test_discover_raw_errors() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            discover_raw(&config_at(dir.path())),
            Err(PipelineError::Discovery(_))
        ));

        fs::create_dir_all(dir.path().join("raw/era5.tp.2001.13.zarr")).unwrap();
        let err = discover_raw(&config_at(dir.path())).unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
        assert!(err.to_string().contains("era5.tp.2001.13.zarr"));
    }

    #[test]
    fn test_find_single_file() {
        let dir = TempDir::new().unwrap();
        let exts = ["geojson", "json", "wkt"];
        assert!(matches!(
            find_single_file(dir.path(), &exts, "AOI"),
            Err(PipelineError::Configuration(_))
        ));

        fs::write(dir.path().join("readme.txt"), "ignored").unwrap();
        fs::write(dir.path().join("basin.WKT"), "POLYGON((0 0, 1 0, 1 1, 0 0))").unwrap();
        assert_eq!(
            find_single_file(dir.path(), &exts, "AOI").unwrap(),
            dir.path().join("basin.WKT")
        );

        fs::write(dir.path().join("basin.geojson"), "{}").unwrap();
        let err = find_single_file(dir.path(), &exts, "AOI").unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
        assert!(err.to_string().contains("found 2"));
    }

    #[test]
    fn test_check_root() {
        let dir = TempDir::new().unwrap();
        assert!(check_root(&config_at(dir.path())).is_ok());
        assert!(matches!(
            check_root(&config_at(&dir.path().join("nope"))),
            Err(PipelineError::Configuration(_))
        ));
    }
}
