//! Pipeline error taxonomy.
//!
//! Every variant aborts the running stage. The one non-fatal condition, an
//! empty group, is a `GroupOutcome::Skipped` value and never an error.

use std::path::Path;

use grid_engine::EngineError;
use precip_common::{CommonError, TimeParseError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Root or a required singular input is missing or ambiguous.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No inputs of the stage's primary class.
    #[error("discovery error: {0}")]
    Discovery(String),

    #[error("CRS mismatch: {0}")]
    CrsMismatch(String),

    /// Malformed file name, band timestamp or table cell.
    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("geometry mismatch: {0}")]
    GeometryMismatch(String),

    #[error("area of interest outside grid: {0}")]
    AoiOutsideGrid(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("run cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery(msg.into())
    }

    pub fn parse(path: &Path, message: impl ToString) -> Self {
        Self::Parse {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// Wrap an error raised while handling `path`, keeping its category.
    pub fn at(path: &Path, err: impl Into<PipelineError>) -> Self {
        let location = path.display();
        match err.into() {
            Self::Parse { message, .. } => Self::Parse {
                path: location.to_string(),
                message,
            },
            Self::Configuration(m) => Self::Configuration(format!("{}: {}", location, m)),
            Self::Discovery(m) => Self::Discovery(format!("{}: {}", location, m)),
            Self::CrsMismatch(m) => Self::CrsMismatch(format!("{}: {}", location, m)),
            Self::GeometryMismatch(m) => Self::GeometryMismatch(format!("{}: {}", location, m)),
            Self::AoiOutsideGrid(m) => Self::AoiOutsideGrid(format!("{}: {}", location, m)),
            Self::Storage(m) => Self::Storage(format!("{}: {}", location, m)),
            Self::Cancelled => Self::Cancelled,
        }
    }
}

impl From<EngineError> for PipelineError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::CrsMismatch { .. } => Self::CrsMismatch(err.to_string()),
            EngineError::AoiOutsideGrid { .. } => Self::AoiOutsideGrid(err.to_string()),
            EngineError::GeometryMismatch(m) => Self::GeometryMismatch(m),
            EngineError::Time(e) => e.into(),
            EngineError::MissingKey(_) => Self::Parse {
                path: String::new(),
                message: err.to_string(),
            },
            EngineError::Common(e) => e.into(),
            EngineError::ConfigError(m) => Self::Configuration(m),
            EngineError::Cancelled => Self::Cancelled,
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<CommonError> for PipelineError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::GeometryMismatch(m) => Self::GeometryMismatch(m),
            CommonError::Time(e) => e.into(),
            other => Self::Parse {
                path: String::new(),
                message: other.to_string(),
            },
        }
    }
}

impl From<TimeParseError> for PipelineError {
    fn from(err: TimeParseError) -> Self {
        Self::Parse {
            path: String::new(),
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_engine_errors_keep_category() {
        let err: PipelineError = EngineError::crs_mismatch("aoi", "EPSG:5070", "EPSG:4326").into();
        assert!(matches!(err, PipelineError::CrsMismatch(_)));

        let err: PipelineError = EngineError::Cancelled.into();
        assert!(matches!(err, PipelineError::Cancelled));

        let err: PipelineError = EngineError::Time(TimeParseError::MonthOutOfRange(13)).into();
        assert!(matches!(err, PipelineError::Parse { .. }));
    }

    #[test]
    fn test_at_names_the_path() {
        let path = PathBuf::from("raw/era5.tp.x.01.zarr");
        let err = PipelineError::at(&path, TimeParseError::MonthOutOfRange(13));
        assert!(err.to_string().contains("raw/era5.tp.x.01.zarr"));
        assert!(matches!(err, PipelineError::Parse { .. }));

        let err = PipelineError::at(&path, EngineError::storage_error("disk full"));
        assert_eq!(err.to_string(), "storage error: raw/era5.tp.x.01.zarr: storage error: disk full");
    }
}
