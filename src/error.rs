//! Centralized error types for mailstash.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailstash library.
#[derive(Error, Debug)]
pub enum StashError {
    /// A required configuration key is missing or invalid. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network-level failure talking to the mail server.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The server rejected the credentials.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The `Date` header is missing or does not match the expected shape.
    #[error("Cannot derive timestamp from Date header: {reason}")]
    DateParse { reason: String },

    /// The raw message bytes could not be parsed at all.
    #[error("Message parse error: {0}")]
    Parse(String),

    /// I/O error with the associated file path.
    #[error("I/O error for '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias for `Result<T, StashError>`.
pub type Result<T> = std::result::Result<T, StashError>;

impl StashError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a bounded retry makes sense for this error.
    ///
    /// Connection resets and timeouts are transient; rejected credentials,
    /// malformed messages, and disk failures are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// Allow `?` on `std::io::Error` inside functions returning `StashError`
/// when no path context is available (rare — prefer `StashError::io`).
impl From<std::io::Error> for StashError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
