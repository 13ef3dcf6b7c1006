//! Area-averaged monthly series and annual-total grids.

use tracing::info;

use grid_engine::{
    annual_total, area_series, group_by_key, reduce_groups, AggregatedGrid, AreaSeriesPoint,
    RunSummary,
};
use precip_common::{Grid, GridStack};

use crate::discovery::{discover_raw, RawInput};
use crate::error::{PipelineError, Result};
use crate::inputs::load_aoi;
use crate::naming::annual_total_name;
use crate::stages::StageContext;
use crate::tabular::{area_series_name, write_area_series, write_table};

/// Everything computed for one year.
struct YearProducts {
    series: Vec<AreaSeriesPoint>,
    total: AggregatedGrid,
}

pub fn run(ctx: &StageContext<'_>) -> Result<RunSummary> {
    let config = ctx.config;
    let inputs = discover_raw(config)?;
    let (_, aoi) = load_aoi(config)?;

    let groups: Vec<(i32, Vec<RawInput>)> = group_by_key(&inputs, |input| input.key.year())
        .into_iter()
        .map(|(year, members)| (year, members.iter().map(|&idx| inputs[idx].clone()).collect()))
        .collect();

    let products = reduce_groups(
        groups,
        ctx.cancel,
        |year, members| -> Result<YearProducts> {
            let grids = members
                .iter()
                .map(|input| ctx.prepare(input, &aoi))
                .collect::<Result<Vec<Grid>>>()?;
            let stack = GridStack::new(grids).map_err(|e| {
                PipelineError::GeometryMismatch(format!("inputs of {}: {}", year, e))
            })?;

            let series = area_series(&stack, config.area_scaling)?;
            let refs: Vec<&Grid> = stack.iter().collect();
            let total = annual_total(&refs, config.area_scaling)?.with_year_range(*year, *year);
            Ok(YearProducts { series, total })
        },
    )?;

    ctx.cancel.check()?;
    let mut summary = RunSummary::new();
    let series: Vec<AreaSeriesPoint> = products
        .iter()
        .flat_map(|(_, p)| p.series.iter().copied())
        .collect();

    let area_path = config
        .area_output_dir()
        .join(area_series_name(&config.variable, &config.region));
    write_table(&area_path, |f| write_area_series(f, &config.region, &series))?;

    let raster_dir = config.raster_output_dir();
    let labels = config.product_labels();
    for (year, product) in &products {
        let path = raster_dir.join(annual_total_name(&config.variable, &config.region, *year));
        let written = ctx
            .writer
            .write_aggregated(&path, &product.total, &labels)
            .map_err(|e| PipelineError::at(&path, e))?;
        info!(
            path = %written.path.display(),
            year,
            months = product.total.metadata.count,
            "Wrote annual total"
        );
        summary.record_produced(year.to_string());
    }

    info!(path = %area_path.display(), points = series.len(), "Wrote area series");
    Ok(summary)
}
