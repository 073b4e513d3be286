//! Index Error Types
//!
//! Errors shared by every `NoteIndex` implementation and the indexing
//! orchestrator.

use thiserror::Error;

/// Error type for note index operations
#[derive(Error, Debug, Clone)]
pub enum IndexError {
    /// Invalid user input in find or sort options.
    ///
    /// The message is shown to the user as-is.
    #[error("{0}")]
    InvalidFilter(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{path}: failed to parse note: {message}")]
    Parse { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage backend error: {0}")]
    Storage(String),

    /// A failure wrapped with the operation that was running
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<IndexError>,
    },
}

/// Result type for note index operations
pub type IndexResult<T> = Result<T, IndexError>;

impl IndexError {
    /// Create an invalid filter error
    pub fn invalid_filter<S: Into<String>>(msg: S) -> Self {
        Self::InvalidFilter(msg.into())
    }

    /// Create a generic storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Wrap this error with the operation it occurred in.
    ///
    /// User input errors are returned unchanged so they surface verbatim.
    pub fn context<S: Into<String>>(self, context: S) -> Self {
        match self {
            Self::InvalidFilter(_) => self,
            other => Self::Context {
                context: context.into(),
                source: Box::new(other),
            },
        }
    }

    /// Check if the error was caused by invalid user input
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::InvalidFilter(_) => true,
            Self::Context { source, .. } => source.is_user_error(),
            _ => false,
        }
    }
}

impl From<std::io::Error> for IndexError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Extension trait adding operation context to index results
pub trait ResultExt<T> {
    /// Wrap the error, if any, with the given context
    fn context<S: Into<String>>(self, context: S) -> IndexResult<T>;

    /// Wrap the error, if any, with a lazily built context
    fn with_context<S: Into<String>, F: FnOnce() -> S>(self, f: F) -> IndexResult<T>;
}

impl<T, E: Into<IndexError>> ResultExt<T> for Result<T, E> {
    fn context<S: Into<String>>(self, context: S) -> IndexResult<T> {
        self.map_err(|e| e.into().context(context))
    }

    fn with_context<S: Into<String>, F: FnOnce() -> S>(self, f: F) -> IndexResult<T> {
        self.map_err(|e| e.into().context(f()))
    }
}
