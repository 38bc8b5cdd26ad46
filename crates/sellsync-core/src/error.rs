//! Unified error type for the SellSync workspace.
//!
//! Every fallible operation across the crates returns [`AppError`] (usually
//! through the [`crate::result::AppResult`] alias). The error carries a
//! machine-readable [`ErrorKind`], a human-readable message, and optionally
//! the underlying source error for logging.

use std::fmt;

/// Classifies an [`AppError`] for dispatch and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested entity does not exist.
    NotFound,
    /// The request was malformed or violated a domain rule.
    Validation,
    /// The operation conflicts with the current state of an entity.
    Conflict,
    /// A remote call did not answer within its deadline.
    Timeout,
    /// The targeted user has no live agent connection.
    NotConnected,
    /// The remote agent executed the command and reported a failure.
    RemoteExecution,
    /// A database query or transaction failed.
    Database,
    /// Serialization or deserialization failed.
    Serialization,
    /// The application configuration is missing or invalid.
    Configuration,
    /// An unexpected internal error.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::NotConnected => "NOT_CONNECTED",
            ErrorKind::RemoteExecution => "REMOTE_EXECUTION",
            ErrorKind::Database => "DATABASE",
            ErrorKind::Serialization => "SERIALIZATION",
            ErrorKind::Configuration => "CONFIGURATION",
            ErrorKind::Internal => "INTERNAL",
        };
        write!(f, "{name}")
    }
}

/// Application-wide error type.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// Error classification.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Underlying cause, if any.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Creates an error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error that wraps an underlying source error.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Shorthand for a `NotFound` error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Shorthand for a `Validation` error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Shorthand for a `Conflict` error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Shorthand for a `Timeout` error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Shorthand for a `NotConnected` error.
    pub fn not_connected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotConnected, message)
    }

    /// Shorthand for a `RemoteExecution` error.
    pub fn remote_execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RemoteExecution, message)
    }

    /// Shorthand for a `Database` error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Shorthand for an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Returns true when the error is of the given kind.
    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

// Clone drops the source; the kind and message are what callers branch on.
impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorKind::Serialization, "JSON serialization failed", err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Internal, "I/O error", err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(ErrorKind::Configuration, "Configuration error", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::not_found("job 42 does not exist");
        assert_eq!(err.to_string(), "NOT_FOUND: job 42 does not exist");
    }

    #[test]
    fn test_error_kind_matching() {
        let err = AppError::conflict("job is already terminal");
        assert!(err.is_kind(ErrorKind::Conflict));
        assert!(!err.is_kind(ErrorKind::NotFound));
    }

    #[test]
    fn test_clone_drops_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = AppError::with_source(ErrorKind::Internal, "wrapped", io);
        assert!(err.source.is_some());
        let cloned = err.clone();
        assert!(cloned.source.is_none());
        assert_eq!(cloned.kind, ErrorKind::Internal);
        assert_eq!(cloned.message, "wrapped");
    }

    #[test]
    fn test_from_serde_json() {
        let bad: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: AppError = bad.unwrap_err().into();
        assert_eq!(err.kind, ErrorKind::Serialization);
    }
}
