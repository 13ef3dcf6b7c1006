//! Error types for grid processing.

use thiserror::Error;

use precip_common::{CommonError, TimeParseError};

/// Errors that can occur while masking, reducing, sampling or storing grids.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Failed to open a grid store.
    #[error("failed to open grid: {0}")]
    OpenFailed(String),

    /// Failed to read data from a grid store.
    #[error("failed to read grid data: {0}")]
    ReadFailed(String),

    /// Invalid metadata in a grid store.
    #[error("invalid grid metadata: {0}")]
    InvalidMetadata(String),

    /// Storage/IO error.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// AOI or site reference system cannot be brought into the grid's.
    #[error("CRS mismatch: {subject} is in {from}, grid is in {to}, and no transform path exists")]
    CrsMismatch {
        subject: String,
        from: String,
        to: String,
    },

    /// The AOI does not overlap the grid.
    #[error("area of interest {aoi} does not overlap grid extent {grid}")]
    AoiOutsideGrid { aoi: String, grid: String },

    /// Grids in one reduction do not share geometry.
    #[error("grid geometry mismatch: {0}")]
    GeometryMismatch(String),

    /// A grid needed a calendar key but carried none.
    #[error("grid {0} has no calendar key")]
    MissingKey(usize),

    /// A reduction was asked to combine zero grids.
    #[error("cannot reduce an empty group")]
    EmptyGroup,

    /// The run was cancelled between groups.
    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Time(#[from] TimeParseError),

    #[error(transparent)]
    Common(CommonError),
}

impl EngineError {
    /// Create an OpenFailed error.
    pub fn open_failed(msg: impl Into<String>) -> Self {
        Self::OpenFailed(msg.into())
    }

    /// Create a ReadFailed error.
    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// Create a StorageError.
    pub fn storage_error(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }

    /// Create a CrsMismatch error.
    pub fn crs_mismatch(
        subject: impl Into<String>,
        from: impl ToString,
        to: impl ToString,
    ) -> Self {
        Self::CrsMismatch {
            subject: subject.into(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl From<CommonError> for EngineError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::GeometryMismatch(msg) => Self::GeometryMismatch(msg),
            CommonError::Time(e) => Self::Time(e),
            other => Self::Common(other),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidMetadata(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
