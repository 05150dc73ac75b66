//! Error types for cache loads.
//!
//! Only fatal conditions are represented here. Rows that reference unknown
//! parents or columns are recoverable anomalies: they are logged and counted
//! in the [`LoadReport`](crate::loader::LoadReport), never returned as errors.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that abort a cache load or a cache operation
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid scope: {0}")]
    InvalidScope(String),

    #[error("query execution failed ({template}): {message}")]
    QueryExecution { template: String, message: String },

    #[error("row mapping error: {0}")]
    RowMapping(String),

    #[error("cannot reset '{parent}' in '{container}': container is fully loaded")]
    InconsistentReset { container: String, parent: String },

    #[error("load cancelled")]
    Cancelled,

    #[error("catalog error: {0}")]
    Catalog(#[from] rusqlite::Error),
}

impl CacheError {
    /// Create a new QueryExecution error.
    pub fn query_execution(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::QueryExecution {
            template: template.into(),
            message: message.into(),
        }
    }

    /// Create a new InconsistentReset error.
    pub fn inconsistent_reset(container: impl Into<String>, parent: impl Into<String>) -> Self {
        Self::InconsistentReset {
            container: container.into(),
            parent: parent.into(),
        }
    }

    /// Classify a SQLite failure raised while running a query template.
    ///
    /// Interrupts become [`CacheError::Cancelled`]; everything else is a
    /// [`CacheError::QueryExecution`].
    pub fn from_query(template: &str, err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref e, _)
                if e.code == ErrorCode::OperationInterrupted =>
            {
                Self::Cancelled
            }
            other => Self::query_execution(template, other.to_string()),
        }
    }
}
