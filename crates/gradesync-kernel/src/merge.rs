//! Last-writer-wins merge.
//!
//! A merge runs in two steps so callers can lock each replica only for the
//! step that touches it:
//!
//! 1. [`fetch_source`] reads every SET from the source under a deadline.
//! 2. [`reconcile`] reduces both sides to latest-write tables and applies each
//!    strictly newer remote write to the target.
//!
//! The source is only ever read. Writes applied to the target keep their
//! remote timestamp, so running the same merge again applies nothing.

use gradesync_store::ReplicaStore;
use gradesync_types::{Deadline, GradeKey, LogFilter, OplogEntry, ReplicaName};
use serde::Serialize;

use crate::clock::Clock;
use crate::error::{MergeError, ReplicaError};
use crate::lww::LatestWrites;
use crate::replica::{Replica, SetOutcome};

/// Why a winning remote write was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ApplyFailureReason {
    /// The target has no record for the key.
    NotFound,
    /// The target's oplog rejected the write. `restored` says whether the
    /// record was put back to its pre-merge grade.
    LogAppendFailure { restored: bool, error: String },
    /// The target store rejected the write.
    Failed(String),
}

impl ApplyFailureReason {
    /// True if the target record may hold a grade its oplog does not explain.
    pub fn is_unrestored(&self) -> bool {
        matches!(self, ApplyFailureReason::LogAppendFailure { restored: false, .. })
    }
}

impl std::fmt::Display for ApplyFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyFailureReason::NotFound => f.write_str("not found"),
            ApplyFailureReason::LogAppendFailure { restored, error } => {
                let state = if *restored { "restored" } else { "NOT restored" };
                write!(f, "oplog append failed, grade {state}: {error}")
            }
            ApplyFailureReason::Failed(detail) => f.write_str(detail),
        }
    }
}

/// A key whose winning remote write could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyFailure {
    pub key: GradeKey,
    pub reason: ApplyFailureReason,
}

/// Outcome of one merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub source: ReplicaName,
    /// Remote writes applied to the target.
    pub merged: usize,
    /// Keys in the source's latest-write table.
    pub considered: usize,
    /// Keys left alone because the target was as new or newer.
    pub stale: usize,
    pub failures: Vec<ApplyFailure>,
}

impl MergeReport {
    fn new(source: ReplicaName, considered: usize) -> Self {
        Self {
            source,
            merged: 0,
            considered,
            stale: 0,
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// True if any failed apply left its target record unrestored.
    pub fn has_unrestored(&self) -> bool {
        self.failures.iter().any(|f| f.reason.is_unrestored())
    }
}

/// Reads every SET entry from `source`.
///
/// Any failure, including an expired `deadline`, is
/// [`MergeError::SourceUnavailable`].
pub fn fetch_source<S, C>(
    source: &Replica<S, C>,
    deadline: Deadline,
) -> Result<Vec<OplogEntry>, MergeError>
where
    S: ReplicaStore,
    C: Clock,
{
    let unavailable = |reason: String| {
        tracing::warn!(source = %source.name(), reason = %reason, "merge source unavailable");
        MergeError::SourceUnavailable {
            replica: source.name().clone(),
            reason,
        }
    };

    let entries = source
        .oplog(LogFilter::Sets, deadline)
        .map_err(|e| unavailable(e.to_string()))?;
    if deadline.is_expired() {
        return Err(unavailable("fetch deadline exceeded".to_string()));
    }

    tracing::debug!(source = %source.name(), entries = entries.len(), "fetched source oplog");
    Ok(entries)
}

/// Applies every write in `remote` that is strictly newer than the target's
/// latest write for the same key.
///
/// Per-key failures are recorded in the report and do not stop the merge.
pub fn reconcile<S, C>(
    target: &mut Replica<S, C>,
    source: &ReplicaName,
    remote: Vec<OplogEntry>,
) -> Result<MergeReport, MergeError>
where
    S: ReplicaStore,
    C: Clock,
{
    if target.name() == source {
        return Err(MergeError::SelfMerge(source.clone()));
    }

    let remote = LatestWrites::from_entries(remote);
    let local = target
        .oplog(LogFilter::Sets, Deadline::none())
        .map(LatestWrites::from_entries)
        .map_err(|error| MergeError::TargetScan {
            target: target.name().clone(),
            error,
        })?;

    let mut report = MergeReport::new(source.clone(), remote.len());
    for (key, write) in remote.iter() {
        if !local.loses_to(key, write.timestamp) {
            report.stale += 1;
            continue;
        }

        let reason = match target.apply_remote(key, &write.grade, write.timestamp, source) {
            Ok(SetOutcome::Applied) => {
                report.merged += 1;
                continue;
            }
            Ok(SetOutcome::NotFound) => ApplyFailureReason::NotFound,
            Err(ReplicaError::LogAppendFailure {
                restored, source, ..
            }) => ApplyFailureReason::LogAppendFailure {
                restored,
                error: source.to_string(),
            },
            Err(e) => ApplyFailureReason::Failed(e.to_string()),
        };
        tracing::warn!(
            replica = %target.name(),
            source = %source,
            key = %key,
            reason = %reason,
            "skipping remote write"
        );
        report.failures.push(ApplyFailure {
            key: key.clone(),
            reason,
        });
    }

    tracing::info!(
        replica = %target.name(),
        source = %source,
        merged = report.merged,
        considered = report.considered,
        stale = report.stale,
        failed = report.failures.len(),
        "merge complete"
    );
    Ok(report)
}

/// Pulls `source` into `target`: [`fetch_source`] then [`reconcile`].
pub fn merge<S, C, S2, C2>(
    target: &mut Replica<S, C>,
    source: &Replica<S2, C2>,
    deadline: Deadline,
) -> Result<MergeReport, MergeError>
where
    S: ReplicaStore,
    C: Clock,
    S2: ReplicaStore,
    C2: Clock,
{
    if target.name() == source.name() {
        return Err(MergeError::SelfMerge(source.name().clone()));
    }
    let remote = fetch_source(source, deadline)?;
    reconcile(target, source.name(), remote)
}
