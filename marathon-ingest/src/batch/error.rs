//! Error taxonomy for ingestion runs
//!
//! - `RowError`: one row failed; skippable when its kind is in the policy
//! - `StoreError`: persistence failure, classified for retry/skip routing
//! - `PipelineError`: the run terminates in Failed
//! - `StartError`: the run could not be launched at all

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification used by the skip/retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Mandatory cell content missing or malformed
    Parse,
    /// Field constraint violated (blank, too long, bad gender, ...)
    InvalidField,
    /// Bib number already present for the event
    DuplicateBib,
    /// Race category not defined for the event
    UnknownCategory,
    /// Uniqueness constraint rejected the record at write time
    WriteConstraint,
    /// Store temporarily unavailable (busy, locked, pool timeout, I/O)
    TransientStore,
    /// Any other store failure
    Store,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Parse => "parse",
            ErrorKind::InvalidField => "invalid_field",
            ErrorKind::DuplicateBib => "duplicate_bib",
            ErrorKind::UnknownCategory => "unknown_category",
            ErrorKind::WriteConstraint => "write_constraint",
            ErrorKind::TransientStore => "transient_store",
            ErrorKind::Store => "store",
        };
        f.write_str(name)
    }
}

/// Per-row failure
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RowError {
    #[error("Error processing row {row}: {message}")]
    Parse { row: usize, message: String },

    #[error("Validation failed for bib {bib}: {}", reasons.join(", "))]
    Validation {
        row: usize,
        bib: String,
        kind: ErrorKind,
        reasons: Vec<String>,
    },

    #[error("Store rejected bib {bib} at row {row}: {message}")]
    WriteConstraint {
        row: usize,
        bib: String,
        message: String,
    },
}

impl RowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RowError::Parse { .. } => ErrorKind::Parse,
            RowError::Validation { kind, .. } => *kind,
            RowError::WriteConstraint { .. } => ErrorKind::WriteConstraint,
        }
    }

    pub fn row(&self) -> usize {
        match self {
            RowError::Parse { row, .. }
            | RowError::Validation { row, .. }
            | RowError::WriteConstraint { row, .. } => *row,
        }
    }

    pub fn bib(&self) -> Option<&str> {
        match self {
            RowError::Parse { .. } => None,
            RowError::Validation { bib, .. } | RowError::WriteConstraint { bib, .. } => Some(bib),
        }
    }
}

/// Persistence failure
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Transient store error: {0}")]
    Transient(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Transient(_) => ErrorKind::TransientStore,
            StoreError::ConstraintViolation(_) => ErrorKind::WriteConstraint,
            StoreError::NotFound(_) | StoreError::Database(_) => ErrorKind::Store,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    return StoreError::ConstraintViolation(db_err.message().to_string());
                }
                // SQLITE_BUSY (5) / SQLITE_LOCKED (6), including extended codes
                let busy = db_err
                    .code()
                    .and_then(|code| code.parse::<i64>().ok())
                    .map(|code| matches!(code & 0xff, 5 | 6))
                    .unwrap_or(false);
                if busy || db_err.message().contains("database is locked") {
                    return StoreError::Transient(db_err.message().to_string());
                }
                StoreError::Database(err)
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => StoreError::Transient(err.to_string()),
            sqlx::Error::RowNotFound => StoreError::NotFound(err.to_string()),
            _ => StoreError::Database(err),
        }
    }
}

impl From<marathon_common::Error> for StoreError {
    fn from(err: marathon_common::Error) -> Self {
        match err {
            marathon_common::Error::Database(e) => e.into(),
            marathon_common::Error::NotFound(msg) => StoreError::NotFound(msg),
            other => StoreError::Database(sqlx::Error::Protocol(other.to_string())),
        }
    }
}

/// Fatal run termination
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Cannot open results file {path}: {message}")]
    SourceOpen { path: String, message: String },

    #[error("Failed to read row: {0}")]
    SourceRead(String),

    #[error("Invalid reference data for event {event_id}: {message}")]
    Snapshot { event_id: i64, message: String },

    #[error("Unskippable {kind} error: {error}")]
    Unskippable { kind: ErrorKind, error: RowError },

    #[error("Skip limit of {limit} exceeded ({skipped} rows skipped), last: {last}")]
    SkipLimitExceeded {
        limit: u64,
        skipped: u64,
        last: RowError,
    },

    #[error("Write failed after {attempts} attempts: {source}")]
    RetryLimitExhausted {
        attempts: u32,
        #[source]
        source: StoreError,
    },

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}

/// Synchronous launch failure
#[derive(Debug, Error)]
pub enum StartError {
    #[error("Event not found: {0}")]
    EventNotFound(i64),

    #[error("Failed to load reference data: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to serialize reference data: {0}")]
    Encode(#[from] serde_json::Error),
}
