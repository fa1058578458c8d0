//! Error types for Poolside

use std::fmt;

use thiserror::Error;

/// Upper bound on how many links of a `next` chain are ever visited.
///
/// Drivers are free to build arbitrarily long chains; walkers stop here.
pub const MAX_CHAIN_DEPTH: usize = 32;

/// Core error type for Poolside operations
#[derive(Error, Debug)]
pub enum PoolsideError {
    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("Statement is closed")]
    StatementClosed,

    #[error(transparent)]
    Sql(#[from] SqlError),

    #[error("Wrapped connection is not an instance of {0}")]
    NotWrapperFor(&'static str),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl PoolsideError {
    /// The SQL state of the outermost driver error, if this is one
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            PoolsideError::Sql(e) => e.sql_state(),
            _ => None,
        }
    }

    /// The driver error carried by this error, if any
    pub fn as_sql_error(&self) -> Option<&SqlError> {
        match self {
            PoolsideError::Sql(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type alias for Poolside operations
pub type Result<T> = std::result::Result<T, PoolsideError>;

/// An error reported by a database driver.
///
/// Carries the five-character SQL state, the vendor error code, and an
/// optional next error. Drivers that report several failures for one call
/// link them through `next`, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlError {
    message: String,
    sql_state: Option<String>,
    vendor_code: i32,
    next: Option<Box<SqlError>>,
}

impl SqlError {
    /// Create a driver error with no SQL state
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sql_state: None,
            vendor_code: 0,
            next: None,
        }
    }

    /// Set the SQL state
    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }

    /// Set the vendor-specific error code
    pub fn with_vendor_code(mut self, vendor_code: i32) -> Self {
        self.vendor_code = vendor_code;
        self
    }

    /// Append `next` to the end of the chain
    pub fn with_next(mut self, next: SqlError) -> Self {
        self.next = Some(Box::new(match self.next.take() {
            Some(tail) => (*tail).with_next(next),
            None => next,
        }));
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn sql_state(&self) -> Option<&str> {
        self.sql_state.as_deref()
    }

    pub fn vendor_code(&self) -> i32 {
        self.vendor_code
    }

    pub fn next(&self) -> Option<&SqlError> {
        self.next.as_deref()
    }

    /// Iterate this error and every linked error, stopping after
    /// [`MAX_CHAIN_DEPTH`] links.
    pub fn chain(&self) -> impl Iterator<Item = &SqlError> {
        std::iter::successors(Some(self), |e| e.next()).take(MAX_CHAIN_DEPTH)
    }
}

impl fmt::Display for SqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sql_state {
            Some(state) => write!(f, "{} (SQLSTATE {})", self.message, state),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for SqlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.next
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}
