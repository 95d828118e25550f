//! Error types for sqlmapper

use thiserror::Error;

/// Result type alias for sqlmapper operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for query building and database operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// Malformed or missing pool configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller error detected before any I/O (bad operator, offset without limit, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Statement handed to the router does not match the called operation
    #[error("Expected {expected} statement, got: {sql}")]
    StatementKind { expected: &'static str, sql: String },

    /// Driver failure surfaced at the router boundary.
    ///
    /// The low-level cause is logged, not carried.
    #[error("Error executing {operation} query")]
    Execution { operation: &'static str },

    /// Raw driver failure, as reported by a [`Driver`](crate::Driver) implementation
    #[error("Driver error: {0}")]
    Driver(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a driver error
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver(message.into())
    }

    /// Check if this error was raised before any I/O happened
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::StatementKind { .. })
    }

    /// Check if this is a wrapped execution failure
    pub fn is_execution(&self) -> bool {
        matches!(self, Self::Execution { .. })
    }

    /// Check if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "mysql")]
impl From<mysql_async::Error> for OrmError {
    fn from(err: mysql_async::Error) -> Self {
        Self::Driver(err.to_string())
    }
}
