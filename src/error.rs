//! Error types for the watchdog core

use std::fmt;

/// Result type alias for watchdog operations
pub type GuardResult<T> = Result<T, GuardError>;

/// Errors that can occur while setting up or running a target monitor
#[derive(Debug)]
pub enum GuardError {
    /// Required configuration is missing or invalid for a target
    Configuration(String),

    /// Health query failed at the transport level (HTTP, process table)
    ProbeTransport(String),

    /// Recovery action could not be carried out
    RecoveryExecution(String),

    /// Native service manager rejected or failed a request
    ServiceControl(String),

    /// Anything that should not have happened
    Unexpected(String),

    /// I/O error (process spawn, file access, etc.)
    Io(std::io::Error),
}

impl fmt::Display for GuardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardError::Configuration(msg) => write!(f, "configuration error: {}", msg),
            GuardError::ProbeTransport(msg) => write!(f, "probe transport error: {}", msg),
            GuardError::RecoveryExecution(msg) => write!(f, "recovery failed: {}", msg),
            GuardError::ServiceControl(msg) => write!(f, "service control error: {}", msg),
            GuardError::Unexpected(msg) => write!(f, "unexpected error: {}", msg),
            GuardError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for GuardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GuardError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GuardError {
    fn from(err: std::io::Error) -> Self {
        GuardError::Io(err)
    }
}

impl From<tokio::task::JoinError> for GuardError {
    fn from(err: tokio::task::JoinError) -> Self {
        GuardError::Unexpected(format!("task failed: {}", err))
    }
}
