//! Common error types for the brew tuner

use thiserror::Error;

/// Common result type for brew tuner operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the brew tuner crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid caller input, rejected before any computation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Dataset or metadata could not be loaded
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Backend answered with a non-success status
    #[error("Request failed ({status}): {message}")]
    Transport {
        /// HTTP status code
        status: u16,
        /// Server-provided detail, or the canonical status reason
        message: String,
    },

    /// Backend could not be reached at all
    #[error("Network unreachable: {0}")]
    Network(String),

    /// Payload could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    /// True for errors raised by input validation
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::InvalidInput(_))
    }

    /// True for errors that came from talking to the backend
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. } | Error::Network(_))
    }
}
