//! Calendar grouping and cell-wise reduction of grids.
//!
//! Grouping is an explicit map from key to member positions, built before any
//! reduction runs. Reductions skip NaN inputs per cell: a result cell is NaN
//! only when every input is NaN there.

use std::collections::BTreeMap;
use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use precip_common::{CalendarKey, Grid, GridStack};

use crate::error::{EngineError, Result};
use crate::outcome::{CancellationToken, SkipReason};
use crate::units::{ScalingPolicy, Weighting};

/// Cell-wise reduction operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReduceOp {
    /// Mean over non-missing inputs.
    Mean,
    /// Sum of weighted non-missing inputs.
    WeightedSum,
}

impl ReduceOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReduceOp::Mean => "mean",
            ReduceOp::WeightedSum => "weighted_sum",
        }
    }
}

impl fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an aggregated grid was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationMetadata {
    pub operator: ReduceOp,
    /// Calendar keys of the contributing grids, sorted.
    pub keys: Vec<CalendarKey>,
    /// Inclusive year window for long-term products.
    pub year_range: Option<(i32, i32)>,
    /// Weighting applied to inputs before reducing (sum) or to the result (mean).
    pub weighting: Weighting,
    /// Number of grids combined.
    pub count: usize,
}

/// A grid produced by reducing a group, with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedGrid {
    pub grid: Grid,
    pub metadata: AggregationMetadata,
}

impl AggregatedGrid {
    pub fn with_year_range(mut self, start: i32, end: i32) -> Self {
        self.metadata.year_range = Some((start, end));
        self
    }
}

/// Partition item positions by key. Within-group order follows input order.
pub fn group_by_key<T, K, F>(items: &[T], key_fn: F) -> BTreeMap<K, Vec<usize>>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut groups: BTreeMap<K, Vec<usize>> = BTreeMap::new();
    for (idx, item) in items.iter().enumerate() {
        groups.entry(key_fn(item)).or_default().push(idx);
    }
    groups
}

/// Group the grids of a stack by their attached calendar keys.
pub fn group_stack_by_key<K, F>(stack: &GridStack, key_fn: F) -> Result<BTreeMap<K, Vec<usize>>>
where
    K: Ord,
    F: Fn(CalendarKey) -> K,
{
    let mut groups: BTreeMap<K, Vec<usize>> = BTreeMap::new();
    for (idx, grid) in stack.iter().enumerate() {
        let key = grid.key().ok_or(EngineError::MissingKey(idx))?;
        groups.entry(key_fn(key)).or_default().push(idx);
    }
    Ok(groups)
}

/// Why a candidate set filtered to `[start, end]` is empty, if it is.
pub fn window_skip_reason(candidates: usize, in_range: usize, start: i32, end: i32) -> Option<SkipReason> {
    if candidates == 0 {
        Some(SkipReason::NoCandidates)
    } else if in_range == 0 {
        Some(SkipReason::EmptyForRange { start, end })
    } else {
        None
    }
}

/// Reduce a group of grids cell-wise.
///
/// `WeightedSum` multiplies each grid by `weighting.factor(key)` before
/// summing; `Mean` ignores `weighting` for the inputs. Every grid must carry
/// a calendar key when a day-count weighting is requested.
pub fn reduce_group(grids: &[&Grid], op: ReduceOp, weighting: Weighting) -> Result<AggregatedGrid> {
    let first = grids.first().ok_or(EngineError::EmptyGroup)?;
    let geometry = first.geometry();

    let mut weights = Vec::with_capacity(grids.len());
    for (idx, grid) in grids.iter().enumerate() {
        if !grid.geometry().matches(geometry) {
            return Err(EngineError::GeometryMismatch(format!(
                "group member {} is {}x{} over {:?}, expected {}x{} over {:?}",
                idx,
                grid.width(),
                grid.height(),
                grid.geometry().extent,
                geometry.width,
                geometry.height,
                geometry.extent
            )));
        }
        let weight = match (op, weighting) {
            (ReduceOp::WeightedSum, Weighting::DaysInMonth) => {
                let key = grid.key().ok_or(EngineError::MissingKey(idx))?;
                weighting.factor(key) as f64
            }
            _ => 1.0,
        };
        weights.push(weight);
    }

    let len = geometry.len();
    let mut sum = vec![0.0f64; len];
    let mut count = vec![0u32; len];

    for (grid, weight) in grids.iter().zip(&weights) {
        for (cell, &value) in grid.data().iter().enumerate() {
            if !value.is_nan() {
                sum[cell] += value as f64 * weight;
                count[cell] += 1;
            }
        }
    }

    let data: Vec<f32> = sum
        .iter()
        .zip(&count)
        .map(|(&s, &n)| {
            if n == 0 {
                f32::NAN
            } else {
                match op {
                    ReduceOp::Mean => (s / n as f64) as f32,
                    ReduceOp::WeightedSum => s as f32,
                }
            }
        })
        .collect();

    let mut keys: Vec<CalendarKey> = grids.iter().filter_map(|g| g.key()).collect();
    keys.sort();

    debug!(
        operator = %op,
        weighting = weighting.as_str(),
        members = grids.len(),
        "Reduced group"
    );

    Ok(AggregatedGrid {
        grid: Grid::new(geometry.clone(), data)?,
        metadata: AggregationMetadata {
            operator: op,
            keys,
            year_range: None,
            weighting,
            count: grids.len(),
        },
    })
}

/// Annual total of one year's monthly grids.
///
/// Monthly grids are converted to monthly totals per `policy` and summed.
pub fn annual_total(monthly: &[&Grid], policy: ScalingPolicy) -> Result<AggregatedGrid> {
    reduce_group(monthly, ReduceOp::WeightedSum, policy.weighting())
}

/// Run `reduce` for every group on the current rayon pool.
///
/// Outcomes come back in group order. The token is checked before each
/// group starts; once cancelled, the whole call fails with `Cancelled`.
/// Reducers may use any error type that engine errors convert into.
pub fn reduce_groups<K, T, R, E, F>(
    groups: Vec<(K, T)>,
    cancel: &CancellationToken,
    reduce: F,
) -> std::result::Result<Vec<(K, R)>, E>
where
    K: Send,
    T: Send,
    R: Send,
    E: From<EngineError> + Send,
    F: Fn(&K, T) -> std::result::Result<R, E> + Sync,
{
    groups
        .into_par_iter()
        .map(|(key, members)| {
            cancel.check()?;
            let outcome = reduce(&key, members)?;
            Ok((key, outcome))
        })
        .collect()
}

/// Area mean of the non-missing cells of a grid.
pub fn area_mean(grid: &Grid) -> Option<f64> {
    grid.mean_valid()
}

/// One value of an area-averaged monthly series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AreaSeriesPoint {
    pub key: CalendarKey,
    /// Millimetres; `None` when the AOI holds no valid cell that month.
    pub value_mm: Option<f64>,
}

/// Area-averaged monthly series of a keyed stack, sorted by key.
///
/// Each month's area mean is converted to a monthly total per `policy`.
pub fn area_series(stack: &GridStack, policy: ScalingPolicy) -> Result<Vec<AreaSeriesPoint>> {
    let weighting = policy.weighting();
    let mut points = stack
        .iter()
        .enumerate()
        .map(|(idx, grid)| {
            let key = grid.key().ok_or(EngineError::MissingKey(idx))?;
            Ok(AreaSeriesPoint {
                key,
                value_mm: area_mean(grid).map(|m| m * weighting.factor(key) as f64),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    points.sort_by_key(|p| p.key);
    Ok(points)
}
