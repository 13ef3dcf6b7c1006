//! Pipeline configuration.
//!
//! One [`PipelineConfig`] value is built at start-up (defaults, then an
//! optional YAML file, then environment overrides) and passed to every stage.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use grid_engine::{EngineConfig, ProductLabels, ScalingPolicy, UnitConverter};
use precip_common::{CrsCode, TimeCodec, TokenPattern};

/// Subdirectory holding the single AOI file.
pub const AOI_DIR: &str = "aoi";
/// Subdirectory holding the monthly input grids.
pub const RAW_DIR: &str = "raw";
/// Subdirectory holding the site table.
pub const SITES_DIR: &str = "sites";
pub const SITE_OUTPUT_DIR: &str = "output/sites";
pub const AREA_OUTPUT_DIR: &str = "output/area";
/// Annual totals, the input of the annual climatology.
pub const RASTER_OUTPUT_DIR: &str = "output/rasters";
pub const AGGREGATED_OUTPUT_DIR: &str = "output/aggregated";

/// Where a raw grid's calendar key comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSource {
    /// Year and month tokens of the file name.
    FileName,
    /// Epoch seconds in each band's label.
    BandTimestamp,
}

/// Inclusive range of years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearWindow {
    pub start: i32,
    pub end: i32,
}

impl YearWindow {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

}

impl std::fmt::Display for YearWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root directory with the fixed subdirectory layout.
    pub root: PathBuf,

    /// Variable name used in output file names and attributes.
    pub variable: String,

    /// Region name used in output file names and the area series.
    pub region: String,

    /// Nodata masking and unit conversion of raw grids.
    pub units: UnitConverter,

    /// Units attribute written on derived products.
    pub output_units: String,

    /// File name tokens holding year and month.
    pub token_pattern: TokenPattern,

    pub time_source: TimeSource,

    /// Epoch of band timestamps; Unix epoch when unset.
    pub band_epoch: Option<NaiveDateTime>,

    /// Reference system of site coordinates.
    pub site_crs: CrsCode,

    /// Reference system of a WKT AOI, or a GeoJSON AOI without `crs`.
    pub aoi_crs: CrsCode,

    /// Input semantics for site reports.
    pub site_scaling: ScalingPolicy,

    /// Input semantics for the area series and annual totals.
    pub area_scaling: ScalingPolicy,

    /// Input semantics for monthly climatologies.
    pub monthly_climatology_scaling: ScalingPolicy,

    /// Windows averaged over annual totals.
    pub annual_windows: Vec<YearWindow>,

    /// Windows averaged per calendar month over raw grids.
    pub monthly_windows: Vec<YearWindow>,

    /// Zarr writer and worker pool settings.
    pub engine: EngineConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            variable: "tp".to_string(),
            region: "aoi".to_string(),
            units: UnitConverter::default(),
            output_units: "mm".to_string(),
            token_pattern: TokenPattern::default(),
            time_source: TimeSource::FileName,
            band_epoch: None,
            site_crs: CrsCode::Epsg4326,
            aoi_crs: CrsCode::Epsg4326,
            site_scaling: ScalingPolicy::DailyAverage,
            area_scaling: ScalingPolicy::DailyAverage,
            monthly_climatology_scaling: ScalingPolicy::DailyAverage,
            annual_windows: vec![YearWindow::new(1991, 2020)],
            monthly_windows: vec![YearWindow::new(1991, 2020)],
            engine: EngineConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load a YAML file, then apply environment overrides.
    ///
    /// Fields missing from the file keep their defaults.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read pipeline config from {:?}", path.as_ref()))?;

        let mut config: PipelineConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse pipeline config from {:?}", path.as_ref()))?;

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        self.apply_overrides(|name| env::var(name).ok());
    }

    /// Override fields from `PRECIP_*` and the engine variables as returned
    /// by `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup("PRECIP_ROOT") {
            self.root = PathBuf::from(root);
        }
        if let Some(variable) = lookup("PRECIP_VARIABLE") {
            self.variable = variable;
        }
        if let Some(region) = lookup("PRECIP_REGION") {
            self.region = region;
        }
        self.engine.apply_overrides(lookup);
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.variable.trim().is_empty() {
            return Err("variable cannot be empty".to_string());
        }
        if self.region.trim().is_empty() {
            return Err("region cannot be empty".to_string());
        }
        for (field, name) in [("variable", &self.variable), ("region", &self.region)] {
            if name.contains(['/', '\\']) {
                return Err(format!("{} '{}' cannot contain a path separator", field, name));
            }
        }

        if !self.units.factor.is_finite() || self.units.factor == 0.0 {
            return Err(format!("units.factor must be finite and non-zero, got {}", self.units.factor));
        }
        if !self.units.nodata.rel_epsilon.is_finite() || self.units.nodata.rel_epsilon < 0.0 {
            return Err("units.nodata.rel_epsilon must be a non-negative number".to_string());
        }

        if self.token_pattern.year_index == self.token_pattern.month_index {
            return Err("token_pattern year and month positions must differ".to_string());
        }

        for window in self.annual_windows.iter().chain(&self.monthly_windows) {
            if window.start > window.end {
                return Err(format!("year window {} is reversed", window));
            }
        }

        self.engine.validate()
    }

    /// Codec deriving calendar keys for this configuration.
    pub fn time_codec(&self) -> TimeCodec {
        let codec = TimeCodec::new(self.token_pattern.clone());
        match self.band_epoch {
            Some(epoch) => codec.with_epoch(epoch),
            None => codec,
        }
    }

    /// Labels written on derived products.
    pub fn product_labels(&self) -> ProductLabels {
        ProductLabels {
            variable: self.variable.clone(),
            region: self.region.clone(),
            units: self.output_units.clone(),
        }
    }

    pub fn aoi_dir(&self) -> PathBuf {
        self.root.join(AOI_DIR)
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join(RAW_DIR)
    }

    pub fn sites_dir(&self) -> PathBuf {
        self.root.join(SITES_DIR)
    }

    pub fn site_output_dir(&self) -> PathBuf {
        self.root.join(SITE_OUTPUT_DIR)
    }

    pub fn area_output_dir(&self) -> PathBuf {
        self.root.join(AREA_OUTPUT_DIR)
    }

    pub fn raster_output_dir(&self) -> PathBuf {
        self.root.join(RASTER_OUTPUT_DIR)
    }

    pub fn aggregated_output_dir(&self) -> PathBuf {
        self.root.join(AGGREGATED_OUTPUT_DIR)
    }
}
