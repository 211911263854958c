//! Core error types for dayroll-core.
//!
//! This module defines the error hierarchy using thiserror. Value errors
//! (bad input, missing rows, lifecycle violations) are recoverable at the
//! API boundary; store failures are transient and surface as a generic
//! failure after the transaction has been rolled back.

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for dayroll-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Item, goal, or rest day does not exist
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    /// Bad operator input (time string, out-of-range value, empty field)
    #[error("invalid value for '{field}': {message}")]
    InvalidArgument { field: &'static str, message: String },

    /// start() refused because the dependency is neither completed nor in today's plan
    #[error("item {item} cannot start: dependency {depends_on} not met")]
    DependencyNotMet { item: i64, depends_on: i64 },

    /// Roll was already executed for this effective date
    #[error("roll already done for {date}")]
    RollAlreadyDone { date: NaiveDate },

    /// Roll is gated until the configured availability time
    #[error("roll not available until {available_at}")]
    RollNotAvailable { available_at: String },

    /// Penalties for this date were already finalized.
    ///
    /// Internal-only: the scheduler swallows this silently.
    #[error("day {date} already finalized")]
    AlreadyFinalized { date: NaiveDate },

    /// Persistence failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Backup failure, isolated to the backup job
    #[error("backup error: {0}")]
    Backup(#[from] BackupError),
}

/// Store-specific errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open database
    #[error("failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("schema migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("database is locked")]
    Locked,

    /// A stored value could not be decoded
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

/// Backup-specific errors.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("database file not found at {0}")]
    DatabaseMissing(PathBuf),

    #[error("backup io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("backup {0} not found")]
    NotFound(i64),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Store(err.into())
    }
}

/// Result type alias for CoreError.
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
