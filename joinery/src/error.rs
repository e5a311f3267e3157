//! Error types for the joinery library.
//!
//! All fallible operations return [`JoineryError`] through the [`Result`] alias.
//! The column profiler and the join suggestion engine never fail; every error
//! here comes from the join operator, the query builder, the engine, or storage.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Which operand of a join an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSide {
    Left,
    Right,
}

impl fmt::Display for JoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinSide::Left => write!(f, "left"),
            JoinSide::Right => write!(f, "right"),
        }
    }
}

/// The main error type for the joinery library.
#[derive(Error, Debug)]
pub enum JoineryError {
    /// A join column does not exist in the schema of its operand.
    #[error("Column '{column}' not found in {side} dataset")]
    ColumnNotFound { column: String, side: JoinSide },

    /// Storage holds no bytes for a table that was asked to be materialized.
    #[error("Table '{table_id}' is not available in storage (key '{key}')")]
    TableNotLoaded { table_id: String, key: String },

    /// The execution engine rejected or failed a statement.
    #[error("Engine execution failed: {message} (sql: {sql})")]
    EngineExecution {
        /// Statement (or engine call description) that failed
        sql: String,
        /// Detailed error message
        message: String,
        /// Underlying engine error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Loading a table into the engine failed; the loader and every concurrent
    /// waiter share the same cause.
    #[error("Materialization of table '{table_id}' failed: {source}")]
    MaterializationFailed {
        table_id: String,
        #[source]
        source: Arc<JoineryError>,
    },

    /// An operation is not supported by this build or backend.
    #[error("Operation not supported: {0}")]
    UnsupportedOperation(String),

    /// A malformed operation or predicate.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Error from blob storage.
    #[error("Storage error ({backend}): {message}")]
    Storage {
        /// Storage backend name (e.g., "memory", "filesystem")
        backend: String,
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error related to configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A type alias for `Result<T, JoineryError>`.
pub type Result<T> = std::result::Result<T, JoineryError>;

impl JoineryError {
    /// Creates a column-not-found error for the given join side.
    pub fn column_not_found(column: impl Into<String>, side: JoinSide) -> Self {
        Self::ColumnNotFound {
            column: column.into(),
            side,
        }
    }

    /// Wraps an engine error together with the statement that produced it.
    pub fn engine(
        sql: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::EngineExecution {
            sql: sql.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an engine error without an underlying source.
    pub fn engine_message(sql: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EngineExecution {
            sql: sql.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a storage error.
    pub fn storage(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            backend: backend.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a storage error with a source error.
    pub fn storage_with_source(
        backend: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            backend: backend.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    /// The underlying error, looking through materialization failures.
    pub fn root_cause(&self) -> &JoineryError {
        match self {
            Self::MaterializationFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns true if retrying the same call could succeed.
    ///
    /// Only engine and storage failures are transient; structural errors
    /// (missing columns, malformed operations) will fail again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::EngineExecution { .. }
            | Self::Storage { .. }
            | Self::Io(_)
            | Self::TableNotLoaded { .. } => true,
            Self::MaterializationFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for JoineryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
