//! Error types for flimscreen-io.

use thiserror::Error;

/// Result type alias for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed text input.
    #[error("parse error in {path}: {message}")]
    Parse {
        /// File the malformed content came from.
        path: String,
        /// What was wrong with it.
        message: String,
    },

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from core validation.
    #[error("core error: {0}")]
    Core(#[from] flimscreen_core::Error),
}

impl Error {
    pub(crate) fn parse(path: &std::path::Path, message: impl Into<String>) -> Self {
        Error::Parse {
            path: path.display().to_string(),
            message: message.into(),
        }
    }
}
