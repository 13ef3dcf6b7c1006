//! Temporal-spatial aggregation engine for precipitation grids.
//!
//! The engine turns time-indexed grids into derived products:
//!
//! - **Units**: nodata sentinel masking and metre-to-millimetre conversion
//! - **Mask**: crop to an AOI's extent and blank cells outside its polygon
//! - **Aggregate**: calendar grouping with mean / day-weighted sum reductions
//! - **Extract**: nearest-cell sampling at sites and wide monthly reports
//! - **Climatology**: long-term means over annual and monthly windows
//!
//! # Architecture
//!
//! ```text
//! raw grids (Zarr)
//!      │
//!      ├─► keys from file names / band timestamps
//!      │
//!      ├─► crop_and_mask(aoi) ─► UnitConverter::normalize
//!      │
//!      ├─► sample(sites) ─► to_monthly_totals ─► SiteReport::pivot
//!      │
//!      └─► reduce_group(WeightedSum) ─► annual totals (Zarr)
//!                                            │
//!                                            ▼
//!                              annual_climatology / monthly_climatology
//! ```
//!
//! Groups are independent and may be reduced in parallel with
//! [`reduce_groups`]; each returns a [`GroupOutcome`] that callers merge
//! into a [`RunSummary`].

pub mod aggregate;
pub mod climatology;
pub mod config;
pub mod error;
pub mod extract;
pub mod mask;
pub mod outcome;
pub mod units;
pub mod zarr;

// Re-export commonly used types at crate root
pub use aggregate::{
    annual_total, area_mean, area_series, group_by_key, group_stack_by_key, reduce_group,
    reduce_groups, AggregatedGrid,
    AggregationMetadata, AreaSeriesPoint, ReduceOp,
};
pub use climatology::{annual_climatology, month_climatology, monthly_climatology, select_window};
pub use config::{EngineConfig, ZarrCompression};
pub use error::{EngineError, Result};
pub use extract::{sample, scale_records, to_monthly_totals, ExtractionRecord, SiteReport};
pub use mask::{crop_and_mask, crop_and_mask_stack, PreparedMask};
pub use outcome::{CancellationToken, GroupOutcome, RunSummary, SkipReason, SkippedGroup};
pub use units::{
    mask_nodata, rescale, to_millimeters, NodataRule, ScalingPolicy, UnitConverter, Weighting,
    DEFAULT_REL_EPSILON, MM_PER_METER, NODATA_SENTINEL,
};
pub use zarr::{read_attributes, read_band, read_grid, GridAttributes, ProductLabels, ZarrGridWriter, ZarrWriteResult};
