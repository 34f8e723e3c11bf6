//! Kernel error types.

use gradesync_store::StoreError;
use gradesync_types::{GradeKey, OperationKind, ReplicaName};

/// Errors from a single replica operation.
///
/// A missing record is not an error; see [`crate::SetOutcome::NotFound`].
#[derive(thiserror::Error, Debug)]
pub enum ReplicaError {
    /// The store changed but its oplog entry could not be written.
    ///
    /// `restored` tells whether the previous grade was put back. When it is
    /// `false` the store holds a value with no trail.
    #[error("failed to log {operation} for {key} (previous value restored: {restored}): {source}")]
    LogAppendFailure {
        key: GradeKey,
        operation: OperationKind,
        restored: bool,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors that abort a whole merge.
///
/// Failures on individual keys do not abort; they are collected in
/// [`crate::MergeReport::failures`].
#[derive(thiserror::Error, Debug)]
pub enum MergeError {
    /// The source oplog could not be fetched within budget. Nothing was
    /// applied.
    #[error("source replica {replica} unavailable: {reason}")]
    SourceUnavailable { replica: ReplicaName, reason: String },

    /// The target's own oplog could not be read. Nothing was applied.
    #[error("cannot read oplog of target replica {target}: {error}")]
    TargetScan {
        target: ReplicaName,
        #[source]
        error: ReplicaError,
    },

    #[error("replica {0} cannot merge with itself")]
    SelfMerge(ReplicaName),
}
