//! Per-site monthly reports.

use std::collections::HashMap;

use tracing::info;

use grid_engine::{reduce_groups, sample, scale_records, ExtractionRecord, RunSummary, SiteReport};
use precip_common::GridStack;

use crate::discovery::discover_raw;
use crate::error::Result;
use crate::inputs::{load_aoi, load_sites};
use crate::stages::StageContext;
use crate::tabular::{site_report_name, write_site_index, write_site_report, write_table, SITE_INDEX_FILE};

pub fn run(ctx: &StageContext<'_>) -> Result<RunSummary> {
    let config = ctx.config;
    let inputs = discover_raw(config)?;
    let (_, aoi) = load_aoi(config)?;
    let sites = load_sites(config)?;

    let groups = inputs.into_iter().map(|input| (input.key, input)).collect();
    let sampled = reduce_groups(groups, ctx.cancel, |_, input| -> Result<Vec<ExtractionRecord>> {
        let grid = ctx.prepare(&input, &aoi)?;
        Ok(sample(&GridStack::new(vec![grid])?, &sites)?)
    })?;

    // Site-major, then input order
    let position: HashMap<&str, usize> = sites
        .iter()
        .enumerate()
        .map(|(idx, site)| (site.id.as_str(), idx))
        .collect();
    let mut records: Vec<ExtractionRecord> = sampled.into_iter().flat_map(|(_, r)| r).collect();
    records.sort_by_key(|r| position.get(r.site_id.as_str()).copied().unwrap_or(usize::MAX));

    let totals = scale_records(&records, config.site_scaling);
    let reports = SiteReport::pivot(&totals);

    ctx.cancel.check()?;
    let out_dir = config.site_output_dir();
    let mut summary = RunSummary::new();
    for report in &reports {
        write_table(&out_dir.join(site_report_name(&report.site_id)), |f| {
            write_site_report(f, report)
        })?;
        summary.record_produced(report.site_id.clone());
    }
    write_table(&out_dir.join(SITE_INDEX_FILE), |f| write_site_index(f, &sites))?;

    info!(
        dir = %out_dir.display(),
        sites = sites.len(),
        records = totals.len(),
        "Wrote site reports"
    );
    Ok(summary)
}
