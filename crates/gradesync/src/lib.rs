//! # gradesync
//!
//! Last-writer-wins replication of student grades across independently
//! operated stores.
//!
//! Every replica keeps its own copy of the grade records plus an append-only
//! operation log. Replicas never talk on their own: convergence happens when
//! a MERGE pulls one replica's log into another and applies each write that
//! is strictly newer than what the target has.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           Cluster                           │
//! │  ┌──────────┐   ┌──────────┐   ┌──────────┐                 │
//! │  │   HIVE   │   │  MONGO   │   │   SQL    │  one lock each  │
//! │  │ records  │   │ records  │   │ records  │                 │
//! │  │  oplog   │   │  oplog   │   │  oplog   │                 │
//! │  └──────────┘   └──────────┘   └──────────┘                 │
//! │        ▲   MERGE: fetch source oplog → LWW → apply          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use gradesync::{Cluster, GradesyncConfig, GradeKey, bootstrap};
//!
//! let config = GradesyncConfig::load()?;
//! let cluster = Cluster::open(&config)?;
//! cluster.bootstrap(&bootstrap::read_csv("student_course_grades.csv")?)?;
//!
//! let hive = "HIVE".parse()?;
//! let key = GradeKey::parse("SID1033", "CSE016")?;
//! cluster.set(&hive, &key, &"A".parse()?)?;
//!
//! let report = cluster.merge(&"SQL".parse()?, &hive)?;
//! assert_eq!(report.merged, 1);
//! ```
//!
//! # Modules
//!
//! - **SDK Layer**: [`Cluster`] - name-routed GET, SET and MERGE
//! - [`bootstrap`]: CSV snapshot loading
//! - [`script`]: command-script parsing and execution

pub mod bootstrap;
mod cluster;
mod error;
pub mod script;


// SDK Layer - Main API
pub use cluster::Cluster;
pub use error::{ClusterError, Result};

// Re-export core types
pub use gradesync_types::{
    BackendKind, CourseId, Grade, GradeKey, GradeRecord, LogFilter, OperationKind, OplogEntry,
    Origin, ReplicaName, StudentId, Timestamp,
};

// Re-export the engine
pub use gradesync_kernel::{
    ApplyFailure, ApplyFailureReason, MergeError, MergeReport, ReplicaError, SetOutcome,
};

// Re-export storage
pub use gradesync_store::{Backend, StoreError};

// Re-export configuration
pub use gradesync_config::{ConfigLoader, GradesyncConfig, ReplicaConfig};
