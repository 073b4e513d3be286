//! Error types for the SQLite note index

use kiln_core::IndexError;
use thiserror::Error;

/// SQLite storage error type
#[derive(Error, Debug)]
pub enum SqliteError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(String),

    /// Schema/migration error
    #[error("Schema error: {0}")]
    Schema(String),

    /// Note or link not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Invalid user input in a query, shown as-is
    #[error("{0}")]
    InvalidFilter(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Underlying rusqlite error
    #[error("SQLite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

/// Result type for SQLite operations
pub type SqliteResult<T> = Result<T, SqliteError>;

impl From<serde_json::Error> for SqliteError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<SqliteError> for IndexError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::InvalidFilter(msg) => Self::InvalidFilter(msg),
            SqliteError::NotFound(msg) => Self::NotFound(msg),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<IndexError> for SqliteError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::InvalidFilter(msg) => Self::InvalidFilter(msg),
            IndexError::NotFound(msg) => Self::NotFound(msg),
            other => Self::Query(other.to_string()),
        }
    }
}
