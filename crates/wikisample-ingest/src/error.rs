//! Error types for the sampling pipeline.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during a sampling run.
#[derive(Error, Debug)]
pub enum Error {
    /// Event model error (missing required field, invalid sampler settings).
    #[error(transparent)]
    Event(#[from] wikisample_core::Error),

    /// HTTP error while connecting to or reading from the stream.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writer error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Stream URL could not be parsed.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}
