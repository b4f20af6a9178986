//! Error types for the tape proxy

use thiserror::Error;

/// Result type alias for tape operations
pub type Result<T> = std::result::Result<T, TapeError>;

/// Error types that can occur while recording or replaying tapes
#[derive(Error, Debug)]
pub enum TapeError {
    #[error("Tape not found for: {method} {path}")]
    TapeNotFound { method: String, path: String },

    #[error("Corrupted tape: {0}")]
    TapeCorrupted(String),

    #[error("Upstream request failed: {0}")]
    UpstreamFailure(String),

    #[error("Failed to persist tape: {0}")]
    WriteFailure(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for TapeError {
    fn from(err: std::io::Error) -> Self {
        TapeError::IoError(err.to_string())
    }
}

impl TapeError {
    /// Convert error to the HTTP status code reported to the caller
    ///
    /// - Missing tape: 404 Not Found
    /// - Corrupted tape: 500 Internal Server Error
    /// - Upstream failure: 502 Bad Gateway
    /// - Everything else: 500 Internal Server Error
    pub fn to_http_status(&self) -> u16 {
        match self {
            TapeError::TapeNotFound { .. } => 404,
            TapeError::TapeCorrupted(_) => 500,
            TapeError::UpstreamFailure(_) => 502,
            TapeError::WriteFailure(_) => 500,
            TapeError::ConfigError(_) => 500,
            TapeError::IoError(_) => 500,
        }
    }
}
