//! Long-term averages over multi-year windows.

use std::collections::BTreeMap;

use precip_common::{Grid, GridStack};

use crate::aggregate::{group_stack_by_key, reduce_group, window_skip_reason, AggregatedGrid, ReduceOp};
use crate::error::Result;
use crate::outcome::GroupOutcome;
use crate::units::Weighting;

/// Keep the candidates whose year lies in `[start, end]`.
///
/// Works on anything tagged with a year, so callers can select files before
/// loading them. Returns the skip reason when nothing qualifies.
pub fn select_window<T>(
    candidates: Vec<(i32, T)>,
    start: i32,
    end: i32,
) -> std::result::Result<Vec<(i32, T)>, crate::outcome::SkipReason> {
    let total = candidates.len();
    let selected: Vec<(i32, T)> = candidates
        .into_iter()
        .filter(|(year, _)| *year >= start && *year <= end)
        .collect();
    match window_skip_reason(total, selected.len(), start, end) {
        Some(reason) => Err(reason),
        None => Ok(selected),
    }
}

/// Unweighted mean of the annual-total grids whose year is in range.
pub fn annual_climatology(annual: &[(i32, Grid)], start: i32, end: i32) -> Result<GroupOutcome> {
    let candidates: Vec<(i32, &Grid)> = annual.iter().map(|(y, g)| (*y, g)).collect();
    let selected = match select_window(candidates, start, end) {
        Ok(selected) => selected,
        Err(reason) => return Ok(GroupOutcome::Skipped(reason)),
    };

    let grids: Vec<&Grid> = selected.into_iter().map(|(_, g)| g).collect();
    let aggregated = reduce_group(&grids, ReduceOp::Mean, Weighting::None)?;
    Ok(GroupOutcome::Produced(aggregated.with_year_range(start, end)))
}

/// Climatology of one calendar month from its in-window grids.
///
/// The per-cell mean is scaled once by `weighting` for `month`.
pub fn month_climatology(
    month: u32,
    grids: &[&Grid],
    start: i32,
    end: i32,
    weighting: Weighting,
) -> Result<AggregatedGrid> {
    let mut aggregated = reduce_group(grids, ReduceOp::Mean, Weighting::None)?;
    let factor = weighting.factor_for_month(month)?;
    aggregated.grid = aggregated.grid.map(|v| v * factor);
    aggregated.metadata.weighting = weighting;
    Ok(aggregated.with_year_range(start, end))
}

/// Per-month climatologies of a keyed monthly stack over `[start, end]`.
///
/// Every month 1-12 appears in the result; months with no in-window grid
/// are skipped with the matching reason.
pub fn monthly_climatology(
    monthly: &GridStack,
    start: i32,
    end: i32,
    weighting: Weighting,
) -> Result<BTreeMap<u32, GroupOutcome>> {
    let by_month = group_stack_by_key(monthly, |key| key.month())?;

    let mut outcomes = BTreeMap::new();
    for month in 1..=12 {
        let candidates: Vec<(i32, &Grid)> = by_month
            .get(&month)
            .into_iter()
            .flatten()
            .filter_map(|&idx| monthly.get(idx))
            .filter_map(|grid| grid.key().map(|key| (key.year(), grid)))
            .collect();
        let outcome = match select_window(candidates, start, end) {
            Ok(selected) => {
                let grids: Vec<&Grid> = selected.into_iter().map(|(_, g)| g).collect();
                GroupOutcome::Produced(month_climatology(month, &grids, start, end, weighting)?)
            }
            Err(reason) => GroupOutcome::Skipped(reason),
        };
        outcomes.insert(month, outcome);
    }
    Ok(outcomes)
}
