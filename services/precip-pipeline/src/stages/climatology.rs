//! Long-term means over annual and monthly windows.
//!
//! Annual windows average the annual totals of `output/rasters`; monthly
//! windows average the raw grids of each calendar month. A window or month
//! with no matching input is skipped, the others are still produced.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use tracing::{debug, info};

use grid_engine::{
    annual_climatology, group_by_key, monthly_climatology, reduce_groups, select_window,
    GroupOutcome, RunSummary, SkipReason,
};
use precip_common::{AreaOfInterest, Grid, GridStack};

use crate::config::YearWindow;
use crate::discovery::{discover_annual_totals, discover_raw, AnnualInput, RawInput};
use crate::error::{PipelineError, Result};
use crate::inputs::load_aoi;
use crate::naming::{annual_climatology_name, month_group, monthly_climatology_name};
use crate::stages::StageContext;

/// One window to average, with every candidate input tagged by year.
enum WindowGroup {
    Annual {
        window: YearWindow,
        candidates: Vec<(i32, AnnualInput)>,
    },
    Monthly {
        window: YearWindow,
        candidates: Vec<(i32, RawInput)>,
    },
}

/// A product of one window group: output file name, summary label, outcome.
type WindowProduct = (String, String, GroupOutcome);

pub fn run(ctx: &StageContext<'_>) -> Result<RunSummary> {
    let config = ctx.config;

    let annual = discover_annual_totals(config)?;
    let raw = match discover_raw(config) {
        Ok(raw) => raw,
        Err(PipelineError::Discovery(msg)) => {
            debug!(%msg, "No raw inputs for monthly windows");
            Vec::new()
        }
        Err(e) => return Err(e),
    };
    if annual.is_empty() && raw.is_empty() {
        return Err(PipelineError::discovery(format!(
            "no annual totals in {} and no input grids in {}",
            config.raster_output_dir().display(),
            config.raw_dir().display()
        )));
    }

    // Raw grids are masked like in the other stages
    let aoi: Option<AreaOfInterest> = if raw.is_empty() || config.monthly_windows.is_empty() {
        None
    } else {
        Some(load_aoi(config)?.1)
    };

    // Calendar months with at least one raw input, in or out of any window
    let months_with_inputs: BTreeSet<u32> =
        group_by_key(&raw, |r| r.key.month()).into_keys().collect();

    let mut groups: Vec<(YearWindow, WindowGroup)> = Vec::new();
    for &window in &config.annual_windows {
        let candidates = annual.iter().map(|a| (a.year, a.clone())).collect();
        groups.push((window, WindowGroup::Annual { window, candidates }));
    }
    for &window in &config.monthly_windows {
        let candidates = raw.iter().map(|r| (r.key.year(), r.clone())).collect();
        groups.push((window, WindowGroup::Monthly { window, candidates }));
    }

    let products = reduce_groups(groups, ctx.cancel, |_, group| -> Result<Vec<WindowProduct>> {
        match group {
            WindowGroup::Annual { window, candidates } => {
                let outcome = match select_window(candidates, window.start, window.end) {
                    Err(reason) => GroupOutcome::Skipped(reason),
                    Ok(selected) => {
                        let loaded = selected
                            .into_iter()
                            .map(|(year, input)| Ok((year, input.load()?)))
                            .collect::<Result<Vec<(i32, Grid)>>>()?;
                        annual_climatology(&loaded, window.start, window.end)?
                    }
                };
                let name = annual_climatology_name(&config.variable, &config.region, window);
                Ok(vec![(name, window.to_string(), outcome)])
            }
            WindowGroup::Monthly { window, candidates } => {
                let outcomes = match (select_window(candidates, window.start, window.end), &aoi) {
                    // Nothing in the window; months seen elsewhere become out of range below
                    (Err(_), _) => (1..=12)
                        .map(|month| (month, GroupOutcome::Skipped(SkipReason::NoCandidates)))
                        .collect::<BTreeMap<u32, GroupOutcome>>(),
                    (Ok(selected), Some(aoi)) => {
                        let grids = selected
                            .iter()
                            .map(|(_, input)| ctx.prepare(input, aoi))
                            .collect::<Result<Vec<Grid>>>()?;
                        let stack = GridStack::new(grids).map_err(|e| {
                            PipelineError::GeometryMismatch(format!("inputs of {}: {}", window, e))
                        })?;
                        monthly_climatology(
                            &stack,
                            window.start,
                            window.end,
                            config.monthly_climatology_scaling.weighting(),
                        )?
                    }
                    // Candidates exist only when raw inputs do, and then the AOI is loaded
                    (Ok(_), None) => {
                        return Err(PipelineError::configuration("monthly window without an AOI"))
                    }
                };

                Ok(outcomes
                    .into_iter()
                    .map(|(month, outcome)| {
                        // Only in-window grids were loaded, so a month seen
                        // elsewhere is out of range rather than absent
                        let outcome = match outcome {
                            GroupOutcome::Skipped(SkipReason::NoCandidates)
                                if months_with_inputs.contains(&month) =>
                            {
                                GroupOutcome::Skipped(SkipReason::EmptyForRange {
                                    start: window.start,
                                    end: window.end,
                                })
                            }
                            other => other,
                        };
                        (
                            monthly_climatology_name(&config.variable, &config.region, window, month),
                            month_group(window, month),
                            outcome,
                        )
                    })
                    .collect())
            }
        }
    })?;

    ctx.cancel.check()?;
    let out_dir = config.aggregated_output_dir();
    let labels = config.product_labels();
    let mut summary = RunSummary::new();
    for (file_name, group, outcome) in products.iter().flat_map(|(_, p)| p) {
        if let GroupOutcome::Produced(product) = outcome {
            let path: PathBuf = out_dir.join(file_name);
            ctx.writer
                .write_aggregated(&path, product, &labels)
                .map_err(|e| PipelineError::at(&path, e))?;
            info!(
                path = %path.display(),
                group = %group,
                members = product.metadata.count,
                "Wrote climatology"
            );
        }
        summary.record(group.clone(), outcome);
    }

    Ok(summary)
}
