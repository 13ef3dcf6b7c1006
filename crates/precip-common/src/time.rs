//! Calendar keys and the codec that derives them from source encodings.
//!
//! Grids carry their temporal identity either in the file name
//! (`<source>.<variable>.<year>.<month>.<ext>`) or in a per-band label holding
//! seconds since an epoch. Both decode to a [`CalendarKey`], the only key used
//! for grouping and sorting.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::grid::Grid;

/// Days per month, February fixed at 28. Leap years are never special-cased.
pub const DAYS_IN_MONTH: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Column labels for monthly reports.
pub const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Number of days in `month` (1-12) from the fixed non-leap table.
pub fn days_in_month(month: u32) -> Option<u32> {
    month
        .checked_sub(1)
        .and_then(|idx| DAYS_IN_MONTH.get(idx as usize))
        .copied()
}

/// Observation period of a grid or value.
///
/// Ordering is year first, then month. The month is always within 1-12:
/// keys are only built through [`CalendarKey::new`], deserialization
/// included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "KeyFields")]
pub struct CalendarKey {
    year: i32,
    month: u32,
}

#[derive(Deserialize)]
struct KeyFields {
    year: i32,
    month: u32,
}

impl TryFrom<KeyFields> for CalendarKey {
    type Error = TimeParseError;

    fn try_from(fields: KeyFields) -> Result<Self, Self::Error> {
        CalendarKey::new(fields.year, fields.month)
    }
}

impl CalendarKey {
    pub fn new(year: i32, month: u32) -> Result<Self, TimeParseError> {
        if !(1..=12).contains(&month) {
            return Err(TimeParseError::MonthOutOfRange(month));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Month of the year, 1-12.
    pub fn month(&self) -> u32 {
        self.month
    }

    /// Zero-based month position, for month-indexed tables.
    pub fn month_index(&self) -> usize {
        (self.month - 1) as usize
    }

    /// First day of the period, used as the date of monthly products.
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// Day count of this key's month.
    pub fn days(&self) -> u32 {
        DAYS_IN_MONTH[self.month_index()]
    }
}

impl fmt::Display for CalendarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Positions of the year and month tokens in a separator-delimited name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPattern {
    pub separator: char,
    pub year_index: usize,
    pub month_index: usize,
}

impl Default for TokenPattern {
    /// `<source>.<variable>.<year>.<month>.<ext>`
    fn default() -> Self {
        Self {
            separator: '.',
            year_index: 2,
            month_index: 3,
        }
    }
}

/// Read the calendar key encoded in a file name.
///
/// Only the final path component is inspected. With a separator other than
/// `.` the extension is dropped before splitting.
pub fn key_from_name(name: &str, pattern: &TokenPattern) -> Result<CalendarKey, TimeParseError> {
    let file_name = file_name_of(name);
    let tokens = tokens_of(file_name, pattern.separator);

    let year: i32 = parse_token(file_name, &tokens, pattern.year_index, "year")?;
    let month: u32 = parse_token(file_name, &tokens, pattern.month_index, "month")?;

    CalendarKey::new(year, month)
}

/// Read only the year token, for annual products named without a month.
pub fn year_from_name(name: &str, pattern: &TokenPattern) -> Result<i32, TimeParseError> {
    let file_name = file_name_of(name);
    let tokens = tokens_of(file_name, pattern.separator);
    parse_token(file_name, &tokens, pattern.year_index, "year")
}

fn file_name_of(name: &str) -> &str {
    Path::new(name)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

fn tokens_of(file_name: &str, separator: char) -> Vec<&str> {
    let stem = if separator == '.' {
        file_name
    } else {
        Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name)
    };
    stem.split(separator).collect()
}

fn parse_token<T: std::str::FromStr>(
    name: &str,
    tokens: &[&str],
    index: usize,
    role: &'static str,
) -> Result<T, TimeParseError> {
    let token = tokens
        .get(index)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| TimeParseError::MissingToken {
            name: name.to_string(),
            role,
            index,
        })?;

    if !token.chars().all(|c| c.is_ascii_digit()) {
        return Err(TimeParseError::InvalidToken {
            name: name.to_string(),
            role,
            token: token.to_string(),
        });
    }

    token.parse().map_err(|_| TimeParseError::InvalidToken {
        name: name.to_string(),
        role,
        token: token.to_string(),
    })
}

/// Derives calendar keys from names and band timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeCodec {
    pattern: TokenPattern,
    /// Seconds between the Unix epoch and the band timestamp epoch.
    epoch_offset_secs: i64,
}

impl Default for TimeCodec {
    fn default() -> Self {
        Self::new(TokenPattern::default())
    }
}

impl TimeCodec {
    /// Codec with band timestamps counted from the Unix epoch.
    pub fn new(pattern: TokenPattern) -> Self {
        Self {
            pattern,
            epoch_offset_secs: 0,
        }
    }

    /// Count band timestamps from a different epoch (UTC).
    pub fn with_epoch(mut self, epoch: NaiveDateTime) -> Self {
        self.epoch_offset_secs = epoch.and_utc().timestamp();
        self
    }

    pub fn pattern(&self) -> &TokenPattern {
        &self.pattern
    }

    pub fn key_from_name(&self, name: &str) -> Result<CalendarKey, TimeParseError> {
        key_from_name(name, &self.pattern)
    }

    pub fn year_from_name(&self, name: &str) -> Result<i32, TimeParseError> {
        year_from_name(name, &self.pattern)
    }

    /// Decode the key from the grid's band label.
    pub fn key_from_band_timestamp(&self, grid: &Grid) -> Result<CalendarKey, TimeParseError> {
        let label = grid
            .band_label()
            .ok_or(TimeParseError::MissingBandLabel)?;
        self.key_from_band_label(label)
    }

    /// Decode `"<name>=<seconds>"` or a bare `"<seconds>"` label.
    pub fn key_from_band_label(&self, label: &str) -> Result<CalendarKey, TimeParseError> {
        let raw = label.rsplit('=').next().unwrap_or(label).trim();

        let seconds: f64 = raw
            .parse()
            .map_err(|_| TimeParseError::InvalidTimestamp(label.to_string()))?;
        // Anything beyond ~300k years is corrupt, not a date.
        if !seconds.is_finite() || seconds.abs() > 1.0e13 {
            return Err(TimeParseError::InvalidTimestamp(label.to_string()));
        }

        let datetime: DateTime<Utc> =
            DateTime::from_timestamp(self.epoch_offset_secs + seconds.floor() as i64, 0)
                .ok_or_else(|| TimeParseError::InvalidTimestamp(label.to_string()))?;

        CalendarKey::new(datetime.year(), datetime.month())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeParseError {
    #[error("'{name}' has no {role} token at position {index}")]
    MissingToken {
        name: String,
        role: &'static str,
        index: usize,
    },

    #[error("'{name}' has non-numeric {role} token '{token}'")]
    InvalidToken {
        name: String,
        role: &'static str,
        token: String,
    },

    #[error("Month out of range: {0}")]
    MonthOutOfRange(u32),

    #[error("Grid has no band label to read a timestamp from")]
    MissingBandLabel,

    #[error("Invalid band timestamp: {0}")]
    InvalidTimestamp(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_in_month_table() {
        let expected = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
        for (i, days) in expected.iter().enumerate() {
            assert_eq!(days_in_month(i as u32 + 1), Some(*days));
        }
        assert_eq!(days_in_month(0), None);
        assert_eq!(days_in_month(13), None);
    }

    #[test]
    fn test_february_is_never_leap() {
        // 2000 and 2024 are leap years; the table ignores that.
        assert_eq!(CalendarKey::new(2000, 2).unwrap().days(), 28);
        assert_eq!(CalendarKey::new(2024, 2).unwrap().days(), 28);
    }

    #[test]
    fn test_key_from_name() {
        let pattern = TokenPattern::default();
        let key = key_from_name("era5.tp.1981.07.zarr", &pattern).unwrap();
        assert_eq!(key, CalendarKey { year: 1981, month: 7 });

        let key = key_from_name("/data/raw/era5.tp.2003.12.zarr", &pattern).unwrap();
        assert_eq!(key, CalendarKey { year: 2003, month: 12 });
    }

    #[test]
    fn test_key_from_name_errors() {
        let pattern = TokenPattern::default();
        assert!(matches!(
            key_from_name("era5.tp.zarr", &pattern),
            Err(TimeParseError::InvalidToken { role: "year", .. })
        ));
        assert!(matches!(
            key_from_name("era5.tp", &pattern),
            Err(TimeParseError::MissingToken { role: "year", .. })
        ));
        assert!(matches!(
            key_from_name("era5.tp.1981.x7.zarr", &pattern),
            Err(TimeParseError::InvalidToken { role: "month", .. })
        ));
        assert_eq!(
            key_from_name("era5.tp.1981.13.zarr", &pattern),
            Err(TimeParseError::MonthOutOfRange(13))
        );
    }

    #[test]
    fn test_custom_pattern() {
        let pattern = TokenPattern {
            separator: '_',
            year_index: 2,
            month_index: 3,
        };
        let key = key_from_name("chirps_precip_1995_04.zarr", &pattern).unwrap();
        assert_eq!(key, CalendarKey { year: 1995, month: 4 });
        assert_eq!(year_from_name("tp_basin_1995.zarr", &pattern).unwrap(), 1995);
        // Names without an extension split the same way
        assert_eq!(
            key_from_name("raw/chirps_precip_1995_04", &pattern).unwrap(),
            CalendarKey { year: 1995, month: 4 }
        );
    }

    #[test]
    fn test_key_from_band_label() {
        let codec = TimeCodec::default();
        // 2020-03-01T00:00:00Z
        let key = codec.key_from_band_label("time=1583020800").unwrap();
        assert_eq!(key, CalendarKey { year: 2020, month: 3 });
        // One second earlier is still February
        let key = codec.key_from_band_label("1583020799").unwrap();
        assert_eq!(key, CalendarKey { year: 2020, month: 2 });
        assert!(codec.key_from_band_label("time=soon").is_err());
    }

    #[test]
    fn test_key_from_band_label_custom_epoch() {
        let epoch = NaiveDate::from_ymd_opt(1900, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let codec = TimeCodec::default().with_epoch(epoch);
        // 31 days after 1900-01-01
        let key = codec.key_from_band_label(&(31 * 86_400).to_string()).unwrap();
        assert_eq!(key, CalendarKey { year: 1900, month: 2 });
    }

    #[test]
    fn test_deserialized_keys_are_validated() {
        let key: CalendarKey = serde_json::from_str(r#"{"year":2001,"month":4}"#).unwrap();
        assert_eq!(key, CalendarKey::new(2001, 4).unwrap());
        assert_eq!(key.days(), 30);
        assert!(serde_json::from_str::<CalendarKey>(r#"{"year":2001,"month":13}"#).is_err());
        assert!(serde_json::from_str::<CalendarKey>(r#"{"year":2001,"month":0}"#).is_err());
    }

    #[test]
    fn test_key_ordering() {
        let mut keys = vec![
            CalendarKey::new(2001, 1).unwrap(),
            CalendarKey::new(2000, 12).unwrap(),
            CalendarKey::new(2000, 2).unwrap(),
        ];
        keys.sort();
        assert_eq!(keys[0].to_string(), "2000-02");
        assert_eq!(keys[2].to_string(), "2001-01");
        assert_eq!(
            keys[0].first_day(),
            NaiveDate::from_ymd_opt(2000, 2, 1)
        );
    }
}
