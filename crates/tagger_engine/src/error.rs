use std::fmt;

use thiserror::Error;

/// Failure of a UI-driver step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// Element absent after the retry budget ran out.
    #[error("{what} not found after {attempts} attempts")]
    NotFound { what: String, attempts: u32 },
    #[error("timed out waiting for {0}")]
    Timeout(String),
    /// The stop flag was raised while waiting.
    #[error("stopped")]
    Stopped,
    #[error("driver io: {0}")]
    Io(String),
}

/// Failure talking to one of the remote stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: RemoteFailure,
    pub message: String,
}

impl RemoteError {
    pub(crate) fn new(kind: RemoteFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteFailure {
    InvalidUrl,
    Network,
    Timeout,
    HttpStatus(u16),
    /// Body was not the JSON shape the endpoint promises, or `ok` was false.
    Decode,
}

impl fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteFailure::InvalidUrl => write!(f, "invalid url"),
            RemoteFailure::Network => write!(f, "network error"),
            RemoteFailure::Timeout => write!(f, "timeout"),
            RemoteFailure::HttpStatus(code) => write!(f, "http status {code}"),
            RemoteFailure::Decode => write!(f, "unexpected response"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError {
    #[error("expected a single letter A-Z, got {0:?}")]
    InvalidOperatorInput(String),
    #[error("no URL is waiting for a letter")]
    NoActivePrompt,
}
