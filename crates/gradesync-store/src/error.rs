//! Store error types.

use std::path::PathBuf;

use gradesync_types::TypesError;

/// Errors from a replica store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying OS I/O error.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// A persisted line or document could not be decoded.
    #[error("corrupt data in {path} at line {line}: {reason}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// A persisted timestamp could not be normalized.
    #[error("unparseable timestamp {value:?}")]
    Timestamp { value: String },

    /// A value failed identifier validation.
    #[error(transparent)]
    Invalid(#[from] TypesError),

    /// JSON encoding failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The caller's time budget ran out mid-scan.
    #[error("deadline exceeded while scanning the oplog")]
    DeadlineExceeded,

    /// The store refused to serve the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failure of a combined update-and-log commit, split by which half failed.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    /// The record update failed. Nothing was logged.
    #[error("record update failed: {0}")]
    Update(#[source] StoreError),

    /// The log append failed. Under the default commit the record may
    /// already hold the new grade.
    #[error("oplog append failed: {0}")]
    Log(#[source] StoreError),
}
