//! Error types for connection setup and client operations.

use std::time::Duration;
use thiserror::Error;

/// All errors that can occur while configuring, connecting or querying.
#[derive(Debug, Clone, Error)]
pub enum MongoError {
    /// One or more required options are missing or invalid.
    #[error("invalid configuration: {}", .0.join(", "))]
    Configuration(Vec<&'static str>),

    /// The connect call failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The driver rejected the connection string or client settings.
    #[error("connection error: {0}")]
    ConnectFailed(#[source] mongodb::error::Error),

    /// The connect call did not finish before the deadline.
    #[error("connection timed out after {0:?}")]
    ConnectionTimeout(Duration),

    /// An operation failed.
    #[error("operation error: {0}")]
    Operation(String),

    /// Error reported by the driver during an operation.
    #[error(transparent)]
    Driver(#[from] mongodb::error::Error),

    /// Operation deadline exceeded.
    #[error("operation timed out")]
    Timeout,

    /// Operation cancelled through its context.
    #[error("operation cancelled")]
    Cancelled,

    /// No document matched a find-one filter.
    #[error("no document found")]
    NotFound,
}

impl MongoError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        MongoError::Connection(msg.into())
    }

    /// Create an operation error.
    pub fn operation(msg: impl Into<String>) -> Self {
        MongoError::Operation(msg.into())
    }

    /// Fields rejected by validation, empty for other errors.
    pub fn invalid_fields(&self) -> &[&'static str] {
        match self {
            MongoError::Configuration(fields) => fields,
            _ => &[],
        }
    }

    /// Check if this is a configuration error.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, MongoError::Configuration(_))
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            MongoError::Connection(_)
                | MongoError::ConnectFailed(_)
                | MongoError::ConnectionTimeout(_)
        )
    }

    /// Check if this is a timeout, either at connect time or on an operation.
    pub fn is_timeout(&self) -> bool {
        matches!(self, MongoError::Timeout | MongoError::ConnectionTimeout(_))
    }

    /// Check if a find-one matched nothing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MongoError::NotFound)
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, MongoError>;

/// Error kind enumeration for pattern matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Options failed validation.
    Configuration,
    /// Connect call failed or timed out.
    Connection,
    /// Ping, find or find-one failed.
    Operation,
    /// Find-one matched nothing.
    NotFound,
}

impl MongoError {
    /// Get the error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MongoError::Configuration(_) => ErrorKind::Configuration,
            MongoError::Connection(_)
            | MongoError::ConnectFailed(_)
            | MongoError::ConnectionTimeout(_) => ErrorKind::Connection,
            MongoError::NotFound => ErrorKind::NotFound,
            MongoError::Operation(_)
            | MongoError::Driver(_)
            | MongoError::Timeout
            | MongoError::Cancelled => ErrorKind::Operation,
        }
    }
}
