//! Error types for spinview-core

use thiserror::Error;

/// Result type alias for spinview operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or starting the fixture server
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid HTTP method
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// Hostname/port pair that does not form a socket address
    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),

    /// Route table rejected a registration
    #[error("Route error: {0}")]
    Route(#[from] spinview_router::InsertError),

    /// Measurement series of unequal length in one fixture
    #[error("Series {series} has {actual} samples, expected {expected}")]
    SeriesLength {
        series: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Fixture could not be serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
