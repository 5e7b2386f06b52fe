//! Error types for stride-db.
//!
//! Every failure of a query run is reported as a [`DbError`] value. The
//! console only ever shows [`DbError::LEGACY_MESSAGE`]; the details go to the log.

use thiserror::Error;

/// Main error type for query runs.
#[derive(Error, Debug)]
pub enum DbError {
    /// Configuration errors (unreadable .env file, missing key, bad port, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution errors (syntax errors, missing relations, decode failures, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// A projected column is not part of the result set.
    #[error("Column '{0}' not found in result set")]
    ColumnNotFound(String),

    /// Internal errors (runtime construction, use of a closed handle, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DbError {
    /// The fixed line printed on the console for any failure.
    pub const LEGACY_MESSAGE: &'static str = "Database Error";

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a column-not-found error for the given column name.
    pub fn column_not_found(name: impl Into<String>) -> Self {
        Self::ColumnNotFound(name.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "Configuration Error",
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::ColumnNotFound(_) => "Column Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using DbError.
pub type Result<T> = std::result::Result<T, DbError>;
