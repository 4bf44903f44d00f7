//! Error types for sequence training.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or training the sequence model.
#[derive(Error, Debug)]
pub enum Error {
    /// Pipeline error (configuration, missing columns, bad data).
    #[error(transparent)]
    Core(#[from] ticklab_core::Error),

    /// Tensor or device error.
    #[error("Tensor error: {0}")]
    Candle(#[from] candle_core::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Core(ticklab_core::Error::config(msg))
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Core(ticklab_core::Error::data(msg))
    }

    /// Create an insufficient data error.
    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Error::Core(ticklab_core::Error::insufficient_data(msg))
    }
}
