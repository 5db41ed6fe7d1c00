//! Migration-specific error types

use crate::executor::DbError;
use thiserror::Error;

/// Migration-specific errors
///
/// Operations raise these on the run's context instead of returning them;
/// the driver returns them once a run is over.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The database rejected or could not run a generated statement
    #[error("error while {operation}: {source}")]
    Statement {
        operation: &'static str,
        #[source]
        source: DbError,
    },
    /// A read-only query (probe, ledger read) failed
    #[error("error while {operation}: {source}")]
    Query {
        operation: &'static str,
        #[source]
        source: DbError,
    },
    /// A query result could not be mapped to the expected shape
    #[error("error while {operation}: could not decode result: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
    /// A SQL template referenced a placeholder with no value
    #[error("invalid SQL template: {0}")]
    Template(String),
    /// The run was cancelled through its `CancelToken`
    #[error("migration run cancelled")]
    Cancelled,
    /// The run outlived its configured deadline
    #[error("migration run exceeded its deadline")]
    DeadlineExceeded,
    /// A version id is not a 14-digit UTC timestamp
    #[error("invalid migration version: {0:?} (expected YYYYMMDDHHMMSS)")]
    InvalidVersion(String),
    /// Two registered migrations share a version
    #[error("duplicate migration version: {0}")]
    DuplicateVersion(String),
    /// An applied version has no registered migration
    #[error("applied migration {0} is not registered; cannot revert it")]
    UnknownVersion(String),
    /// A migration raised one or more errors while running
    #[error("migration {version} ({name}) failed: {source}")]
    Failed {
        version: String,
        name: String,
        #[source]
        source: Box<MigrationError>,
        /// Errors raised after the first one, in order
        further: Vec<MigrationError>,
    },
    /// Driver-level database error outside any migration body
    #[error("database error: {0}")]
    Database(#[from] DbError),
    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl MigrationError {
    /// Map a failed read into `Decode` or `Query`.
    pub(crate) fn from_query(operation: &'static str, source: DbError) -> Self {
        match source {
            DbError::Decode(message) => MigrationError::Decode { operation, message },
            source => MigrationError::Query { operation, source },
        }
    }

    /// Build `Failed` from the errors a run accumulated, first one as the source.
    ///
    /// Returns `None` when nothing was raised.
    pub(crate) fn failed(
        version: impl Into<String>,
        name: impl Into<String>,
        errors: Vec<MigrationError>,
    ) -> Option<Self> {
        let mut errors = errors.into_iter();
        let first = errors.next()?;
        Some(MigrationError::Failed {
            version: version.into(),
            name: name.into(),
            source: Box::new(first),
            further: errors.collect(),
        })
    }
}
