//! Error types for gridline.

use gridline_types::BoundingBoxError;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GridlineError>;

#[derive(Debug, Error)]
pub enum GridlineError {
    #[error("invalid bounding box: {0}")]
    InvalidBoundingBox(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("upstream request failed: {0}")]
    Http(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("storage quota exceeded: need {needed} bytes, {available} available")]
    QuotaExceeded { needed: u64, available: u64 },

    #[error("corrupt cache entry: {0}")]
    CorruptEntry(String),

    #[error("all {0} tiles failed to load")]
    AllTilesFailed(usize),
}

impl From<BoundingBoxError> for GridlineError {
    fn from(err: BoundingBoxError) -> Self {
        GridlineError::InvalidBoundingBox(err.to_string())
    }
}

impl From<serde_json::Error> for GridlineError {
    fn from(err: serde_json::Error) -> Self {
        GridlineError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for GridlineError {
    fn from(err: bincode::Error) -> Self {
        GridlineError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for GridlineError {
    fn from(err: reqwest::Error) -> Self {
        GridlineError::Http(err.to_string())
    }
}

impl GridlineError {
    /// True for errors caused by the caller's input rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GridlineError::InvalidBoundingBox(_) | GridlineError::InvalidInput(_)
        )
    }
}
