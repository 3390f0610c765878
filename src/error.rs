// src/error.rs

//! Unified error handling for the draw archive.
//!
//! Two layers exist:
//! - [`FetchError`]: per-round failures. Always recoverable; the round is
//!   recorded as a gap and the batch continues.
//! - [`AppError`]: everything else (cache I/O, configuration, misuse of the
//!   dataset manager). Cache failures are logged by callers and treated as
//!   "cache unavailable".

use std::fmt;

use thiserror::Error;

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation not allowed in the manager's current state
    #[error("Cannot {operation} while {state}")]
    State {
        operation: &'static str,
        state: String,
    },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a state transition error.
    pub fn state(operation: &'static str, state: impl fmt::Display) -> Self {
        Self::State {
            operation,
            state: state.to_string(),
        }
    }
}

/// Failure of a single round fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Connection, DNS or non-success HTTP status
    #[error("network error: {0}")]
    NetworkError(String),

    /// Request exceeded the configured timeout
    #[error("request timed out")]
    Timeout,

    /// Payload malformed, incomplete or inconsistent
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Source explicitly reported the round as unavailable
    #[error("round rejected by source: {0}")]
    PayloadRejected(String),
}

/// Coarse classification of [`FetchError`], used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FetchErrorKind {
    Network,
    Timeout,
    InvalidResponse,
    PayloadRejected,
}

impl FetchError {
    pub fn network(message: impl fmt::Display) -> Self {
        Self::NetworkError(message.to_string())
    }

    pub fn invalid(message: impl fmt::Display) -> Self {
        Self::InvalidResponse(message.to_string())
    }

    pub fn rejected(message: impl fmt::Display) -> Self {
        Self::PayloadRejected(message.to_string())
    }

    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::NetworkError(_) => FetchErrorKind::Network,
            Self::Timeout => FetchErrorKind::Timeout,
            Self::InvalidResponse(_) => FetchErrorKind::InvalidResponse,
            Self::PayloadRejected(_) => FetchErrorKind::PayloadRejected,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::invalid(error)
        } else {
            Self::network(error)
        }
    }
}
