//! Error types for the wikisample pipeline.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while interpreting change events.
#[derive(Error, Debug)]
pub enum Error {
    /// A field required for the CSV row is absent from the event.
    #[error("missing required field '{field}'")]
    MissingField {
        /// Dotted path of the absent field (e.g. `length.old`).
        field: &'static str,
    },

    /// A field required for the CSV row is present but has the wrong type.
    #[error("invalid value for field '{field}'")]
    InvalidField {
        /// Dotted path of the mistyped field.
        field: &'static str,
    },

    /// Sampling threshold outside `[0, 1]` (or NaN).
    #[error("invalid threshold {0}: must be within [0, 1]")]
    InvalidThreshold(f64),

    /// Sample key could not be parsed.
    #[error("invalid sample key '{0}'")]
    InvalidSampleKey(String),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
