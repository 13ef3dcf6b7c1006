//! Unit conversion, nodata masking and day-count scaling.
//!
//! Raw grids are in metres with a float sentinel marking invalid cells. The
//! sentinel must become NaN before any arithmetic, so [`UnitConverter::normalize`]
//! always masks first and scales second.

use serde::{Deserialize, Serialize};

use precip_common::{days_in_month, CalendarKey, Grid, GridStack, TimeParseError};

use crate::error::Result;

/// Nodata sentinel: the largest finite `f32`.
pub const NODATA_SENTINEL: f64 = 3.4028234663852886e38;

/// Default relative tolerance for sentinel matching.
pub const DEFAULT_REL_EPSILON: f64 = 1e-6;

/// Metres to millimetres.
pub const MM_PER_METER: f32 = 1000.0;

/// Which cell values count as nodata.
///
/// A cell matches when `|v - sentinel| <= rel_epsilon * |sentinel|`.
/// Non-finite cells are always treated as nodata.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodataRule {
    pub sentinel: f64,
    pub rel_epsilon: f64,
}

impl Default for NodataRule {
    fn default() -> Self {
        Self {
            sentinel: NODATA_SENTINEL,
            rel_epsilon: DEFAULT_REL_EPSILON,
        }
    }
}

impl NodataRule {
    pub fn new(sentinel: f64, rel_epsilon: f64) -> Self {
        Self {
            sentinel,
            rel_epsilon,
        }
    }

    pub fn is_nodata(&self, value: f32) -> bool {
        let value = value as f64;
        if !value.is_finite() {
            return true;
        }
        (value - self.sentinel).abs() <= self.rel_epsilon * self.sentinel.abs()
    }
}

/// Replace nodata cells with NaN.
pub fn mask_nodata(grid: &Grid, rule: &NodataRule) -> Grid {
    grid.map(|v| if rule.is_nodata(v) { f32::NAN } else { v })
}

/// Multiply every cell by `factor`. NaN stays NaN.
pub fn rescale(grid: &Grid, factor: f32) -> Grid {
    grid.map(|v| v * factor)
}

/// Metres to millimetres with the given factor.
pub fn to_millimeters(grid: &Grid, factor: f32) -> Grid {
    rescale(grid, factor)
}

/// Nodata masking followed by unit scaling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitConverter {
    pub factor: f32,
    pub nodata: NodataRule,
}

impl Default for UnitConverter {
    fn default() -> Self {
        Self {
            factor: MM_PER_METER,
            nodata: NodataRule::default(),
        }
    }
}

impl UnitConverter {
    pub fn new(factor: f32, nodata: NodataRule) -> Self {
        Self { factor, nodata }
    }

    /// Mask nodata, then convert to millimetres.
    pub fn normalize(&self, grid: &Grid) -> Grid {
        let factor = self.factor;
        let rule = self.nodata;
        grid.map(|v| if rule.is_nodata(v) { f32::NAN } else { v * factor })
    }

    /// [`normalize`](Self::normalize) every grid of a stack, keeping order.
    pub fn normalize_stack(&self, stack: &GridStack) -> Result<GridStack> {
        Ok(GridStack::new(
            stack.iter().map(|g| self.normalize(g)).collect(),
        )?)
    }
}

/// Day-count weighting applied to a value or grid with a calendar key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weighting {
    /// Values are used as-is.
    None,
    /// Values are multiplied by the days of their month.
    DaysInMonth,
}

impl Weighting {
    pub fn factor(&self, key: CalendarKey) -> f32 {
        match self {
            Weighting::None => 1.0,
            Weighting::DaysInMonth => key.days() as f32,
        }
    }

    /// Factor for a bare month number; a month outside 1-12 is an error.
    pub fn factor_for_month(&self, month: u32) -> Result<f32> {
        let days = days_in_month(month).ok_or(TimeParseError::MonthOutOfRange(month))?;
        Ok(match self {
            Weighting::None => 1.0,
            Weighting::DaysInMonth => days as f32,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Weighting::None => "none",
            Weighting::DaysInMonth => "days_in_month",
        }
    }
}

/// What one monthly input value means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingPolicy {
    /// Mean daily amount over the month; a monthly total needs day weighting.
    DailyAverage,
    /// Already a monthly total.
    MonthlyTotal,
}

impl ScalingPolicy {
    /// Weighting that turns a value under this policy into a monthly total.
    pub fn weighting(&self) -> Weighting {
        match self {
            ScalingPolicy::DailyAverage => Weighting::DaysInMonth,
            ScalingPolicy::MonthlyTotal => Weighting::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use precip_common::{BoundingBox, CrsCode, GridGeometry};

    fn grid(data: Vec<f32>) -> Grid {
        let geometry = GridGeometry::new(
            data.len(),
            1,
            BoundingBox::new(0.0, 0.0, data.len() as f64, 1.0),
            CrsCode::Epsg4326,
        );
        Grid::new(geometry, data).unwrap()
    }

    #[test]
    fn test_sentinel_matching_is_tolerant() {
        let rule = NodataRule::default();
        assert!(rule.is_nodata(f32::MAX));
        assert!(rule.is_nodata(3.4028230e38));
        assert!(rule.is_nodata(f32::INFINITY));
        assert!(!rule.is_nodata(0.0));
        assert!(!rule.is_nodata(3.0e38));
    }

    #[test]
    fn test_normalize_masks_before_scaling() {
        let converter = UnitConverter::default();
        let out = converter.normalize(&grid(vec![0.002, f32::MAX, 0.0]));
        assert!((out.data()[0] - 2.0).abs() < 1e-6);
        assert!(out.data()[1].is_nan());
        assert_eq!(out.data()[2], 0.0);
    }

    #[test]
    fn test_normalize_stack_keeps_order() {
        let stack = GridStack::new(vec![grid(vec![0.001, 0.002]), grid(vec![f32::MAX, 0.003])]).unwrap();
        let out = UnitConverter::default().normalize_stack(&stack).unwrap();
        assert_eq!(out.len(), 2);
        assert!((out.grids()[0].data()[1] - 2.0).abs() < 1e-6);
        assert!(out.grids()[1].data()[0].is_nan());
        assert!((out.grids()[1].data()[1] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_millimeter_round_trip() {
        let original = grid(vec![0.0001, 0.0123, 1.5, 0.0]);
        let back = rescale(&to_millimeters(&original, MM_PER_METER), 1.0 / MM_PER_METER);
        for (a, b) in original.data().iter().zip(back.data()) {
            assert!((a - b).abs() <= 1e-6 * a.abs().max(1.0));
        }
    }

    #[test]
    fn test_weighting_factors() {
        let april = CalendarKey::new(2001, 4).unwrap();
        assert_eq!(Weighting::DaysInMonth.factor(april), 30.0);
        assert_eq!(Weighting::None.factor(april), 1.0);
        assert_eq!(Weighting::DaysInMonth.factor_for_month(2).unwrap(), 28.0);
        assert!(matches!(
            Weighting::None.factor_for_month(13),
            Err(EngineError::Time(TimeParseError::MonthOutOfRange(13)))
        ));
        assert_eq!(ScalingPolicy::DailyAverage.weighting(), Weighting::DaysInMonth);
        assert_eq!(ScalingPolicy::MonthlyTotal.weighting(), Weighting::None);
    }
}
