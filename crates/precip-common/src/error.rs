//! Error types shared by the pipeline's data model.

use thiserror::Error;

use crate::bbox::BboxParseError;
use crate::crs::CrsParseError;
use crate::time::TimeParseError;

/// Result type alias using CommonError.
pub type CommonResult<T> = Result<T, CommonError>;

/// Errors raised while building or decoding the shared data model.
#[derive(Debug, Error)]
pub enum CommonError {
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Grid geometry mismatch: {0}")]
    GeometryMismatch(String),

    #[error("Invalid area of interest: {0}")]
    InvalidAoi(String),

    #[error("Invalid site: {0}")]
    InvalidSite(String),

    #[error(transparent)]
    Time(#[from] TimeParseError),

    #[error(transparent)]
    Crs(#[from] CrsParseError),

    #[error(transparent)]
    Bbox(#[from] BboxParseError),
}

impl CommonError {
    pub fn invalid_grid(msg: impl Into<String>) -> Self {
        Self::InvalidGrid(msg.into())
    }

    pub fn invalid_aoi(msg: impl Into<String>) -> Self {
        Self::InvalidAoi(msg.into())
    }

    pub fn invalid_site(msg: impl Into<String>) -> Self {
        Self::InvalidSite(msg.into())
    }
}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        CommonError::InvalidAoi(format!("JSON error: {}", err))
    }
}
