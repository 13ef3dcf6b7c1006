//! Pipeline stages.
//!
//! Each stage discovers its inputs, computes every group on the worker pool,
//! and only then writes its outputs. A fatal error in any group therefore
//! leaves the stage's output directories untouched.

pub mod area;
pub mod climatology;
pub mod sites;

use std::fmt;

use metrics::counter;
use tracing::{info, warn};

use grid_engine::{crop_and_mask, CancellationToken, RunSummary, ZarrGridWriter};
use precip_common::{AreaOfInterest, Grid};

use crate::config::PipelineConfig;
use crate::discovery::{check_root, RawInput};
use crate::error::{PipelineError, Result};

/// One unit of pipeline work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Per-site monthly reports.
    Sites,
    /// Area-averaged series and annual totals.
    Area,
    /// Long-term means over annual and monthly windows.
    Climatology,
}

impl Stage {
    /// Every stage in dependency order; climatology reads the area stage's totals.
    pub const ALL: [Stage; 3] = [Stage::Sites, Stage::Area, Stage::Climatology];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Sites => "sites",
            Stage::Area => "area",
            Stage::Climatology => "climatology",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared state handed to a stage.
pub struct StageContext<'a> {
    pub config: &'a PipelineConfig,
    pub cancel: &'a CancellationToken,
    pub writer: ZarrGridWriter,
}

impl StageContext<'_> {
    /// Load a raw input, crop and mask it to the AOI, and normalize units.
    pub fn prepare(&self, input: &RawInput, aoi: &AreaOfInterest) -> Result<Grid> {
        let grid = input.load()?;
        let masked = crop_and_mask(&grid, aoi).map_err(|e| PipelineError::at(&input.path, e))?;
        Ok(self.config.units.normalize(&masked))
    }
}

/// Runs stages against one configuration.
pub struct Pipeline {
    config: PipelineConfig,
    cancel: CancellationToken,
    pool: rayon::ThreadPool,
}

impl Pipeline {
    /// Validate the configuration and build the worker pool.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate().map_err(PipelineError::Configuration)?;
        let pool = config
            .engine
            .thread_pool()
            .map_err(|e| PipelineError::configuration(format!("worker pool: {}", e)))?;

        Ok(Self {
            config,
            cancel: CancellationToken::new(),
            pool,
        })
    }

    /// Use an externally owned token, e.g. one cancelled by a signal handler.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the stages in order, stopping at the first fatal error.
    pub fn run(&self, stages: &[Stage]) -> Result<Vec<(Stage, RunSummary)>> {
        check_root(&self.config)?;

        let mut summaries = Vec::with_capacity(stages.len());
        for &stage in stages {
            summaries.push((stage, self.run_stage(stage)?));
        }
        Ok(summaries)
    }

    /// Run a single stage on the worker pool and log its summary.
    pub fn run_stage(&self, stage: Stage) -> Result<RunSummary> {
        check_root(&self.config)?;
        self.cancel.check()?;

        info!(stage = %stage, root = %self.config.root.display(), "Starting stage");
        let ctx = StageContext {
            config: &self.config,
            cancel: &self.cancel,
            writer: ZarrGridWriter::new(self.config.engine.clone()),
        };

        let summary = self.pool.install(|| match stage {
            Stage::Sites => sites::run(&ctx),
            Stage::Area => area::run(&ctx),
            Stage::Climatology => climatology::run(&ctx),
        })?;

        log_summary(stage, &summary);
        Ok(summary)
    }
}

/// Log a stage's merged outcomes once, with one warning per skipped group.
pub fn log_summary(stage: Stage, summary: &RunSummary) {
    for skipped in &summary.skipped {
        warn!(
            stage = %stage,
            group = %skipped.group,
            reason = %skipped.reason,
            "Skipped group"
        );
    }

    counter!("groups_produced_total", "stage" => stage.as_str())
        .increment(summary.produced_count() as u64);
    counter!("groups_skipped_total", "stage" => stage.as_str())
        .increment(summary.skipped_count() as u64);

    info!(
        stage = %stage,
        produced = summary.produced_count(),
        skipped = summary.skipped_count(),
        "Stage complete"
    );
}
