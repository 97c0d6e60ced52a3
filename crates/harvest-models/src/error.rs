//! Model validation errors.

use thiserror::Error;

/// Result type for model construction.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised when a model value would violate its invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Invalid interval: onset {onset} must be before offset {offset}")]
    InvalidInterval { onset: f64, offset: f64 },

    #[error("Invalid time range: start {start} must be before end {end}")]
    InvalidTimeRange { start: f64, end: f64 },

    #[error("Empty identifier")]
    EmptyId,

    #[error("Unknown catalog kind: {0}")]
    UnknownCatalogKind(String),
}
