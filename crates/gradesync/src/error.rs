//! Error types for the gradesync SDK.

use gradesync_kernel::{MergeError, ReplicaError};
use gradesync_store::StoreError;
use gradesync_types::{ReplicaName, TypesError};

/// Result type for cluster operations.
pub type Result<T, E = ClusterError> = std::result::Result<T, E>;

/// Errors returned by [`crate::Cluster`].
#[derive(thiserror::Error, Debug)]
pub enum ClusterError {
    #[error("unknown replica {0}")]
    UnknownReplica(ReplicaName),

    #[error("replica {0} is configured more than once")]
    DuplicateReplica(ReplicaName),

    #[error("cluster has no replicas")]
    Empty,

    #[error("failed to open replica {replica}: {source}")]
    Open {
        replica: ReplicaName,
        source: ReplicaError,
    },

    #[error("replica {replica}: {source}")]
    Replica {
        replica: ReplicaName,
        source: ReplicaError,
    },

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Invalid(#[from] TypesError),

    #[error("lock poisoned for replica {0}")]
    LockPoisoned(ReplicaName),
}
