//! Precipitation product pipeline.
//!
//! Turns a root directory of monthly precipitation grids into:
//!
//! - per-site monthly reports (`output/sites`)
//! - an area-averaged monthly series (`output/area`) and annual totals
//!   (`output/rasters`)
//! - annual and monthly climatologies (`output/aggregated`)
//!
//! Stages share one [`PipelineConfig`] and run their groups on a rayon pool.

pub mod config;
pub mod discovery;
pub mod error;
pub mod inputs;
pub mod naming;
pub mod stages;
pub mod tabular;

pub use config::{PipelineConfig, TimeSource, YearWindow};
pub use error::{PipelineError, Result};
pub use stages::{Pipeline, Stage};
