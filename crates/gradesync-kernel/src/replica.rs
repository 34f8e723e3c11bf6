//! The replica adapter: record store plus operation log behind GET and SET.

use gradesync_store::{CommitError, ReplicaStore};
use gradesync_types::{
    Deadline, Grade, GradeKey, GradeRecord, LogFilter, OperationKind, OplogEntry, ReplicaName,
    Timestamp,
};

use crate::clock::{Clock, SystemClock};
use crate::error::ReplicaError;

/// Result of a write that targets a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The record was updated and the write logged.
    Applied,
    /// No record exists for the key. Nothing was changed or logged.
    NotFound,
}

impl SetOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, SetOutcome::Applied)
    }
}

/// One autonomous copy of the grade records and their oplog.
///
/// All mutation goes through `&mut self`, so a store update and its oplog
/// append never interleave with another operation on the same replica.
pub struct Replica<S, C = SystemClock> {
    name: ReplicaName,
    store: S,
    clock: C,
    /// Largest timestamp this replica has logged, own or merged.
    last_timestamp: Option<Timestamp>,
}

impl<S, C> std::fmt::Debug for Replica<S, C>
where
    S: ReplicaStore,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replica")
            .field("name", &self.name)
            .field("backend", &self.store.kind())
            .field("last_timestamp", &self.last_timestamp)
            .finish_non_exhaustive()
    }
}

impl<S, C> Replica<S, C>
where
    S: ReplicaStore,
    C: Clock,
{
    /// Wraps `store`, resuming timestamp monotonicity from its existing oplog.
    pub fn new(name: ReplicaName, store: S, clock: C) -> Result<Self, ReplicaError> {
        let last_timestamp = store
            .scan_log(LogFilter::All, Deadline::none())?
            .last()
            .map(|e| e.timestamp);

        tracing::debug!(
            replica = %name,
            backend = %store.kind(),
            last_timestamp = ?last_timestamp,
            "replica opened"
        );

        Ok(Self {
            name,
            store,
            clock,
            last_timestamp,
        })
    }

    pub fn name(&self) -> &ReplicaName {
        &self.name
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Direct store access, bypassing the oplog. Intended for fault
    /// injection in tests.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.last_timestamp
    }

    /// Reads the grade for `key`, logging a GET entry on a hit.
    ///
    /// Returns `Ok(None)` if no record exists; nothing is logged then.
    pub fn get(&mut self, key: &GradeKey) -> Result<Option<Grade>, ReplicaError> {
        let Some(grade) = self.store.lookup(key)? else {
            tracing::debug!(replica = %self.name, key = %key, "get: not found");
            return Ok(None);
        };

        let entry = OplogEntry::get(self.next_timestamp(), key.clone());
        self.store
            .append_log(&entry)
            .map_err(|source| {
                tracing::error!(
                    replica = %self.name,
                    key = %key,
                    error = %source,
                    "failed to log GET"
                );
                ReplicaError::LogAppendFailure {
                    key: key.clone(),
                    operation: OperationKind::Get,
                    restored: true,
                    source,
                }
            })?;
        self.observe(entry.timestamp);

        tracing::debug!(replica = %self.name, key = %key, grade = %grade, "get");
        Ok(Some(grade))
    }

    /// Updates an existing record and logs the SET.
    ///
    /// Never creates a record: an absent key yields [`SetOutcome::NotFound`]
    /// and leaves both the store and the oplog untouched.
    pub fn set(&mut self, key: &GradeKey, grade: &Grade) -> Result<SetOutcome, ReplicaError> {
        let entry = OplogEntry::set(self.next_timestamp(), key.clone(), grade.clone());
        self.write(entry)
    }

    /// Applies a write that won a merge.
    ///
    /// Behaves like [`Replica::set`], but the logged entry keeps the remote
    /// timestamp and records `source` as its origin.
    pub fn apply_remote(
        &mut self,
        key: &GradeKey,
        grade: &Grade,
        remote_timestamp: Timestamp,
        source: &ReplicaName,
    ) -> Result<SetOutcome, ReplicaError> {
        let entry = OplogEntry::merged(remote_timestamp, key.clone(), grade.clone(), source.clone());
        self.write(entry)
    }

    /// Scans this replica's oplog.
    pub fn oplog(
        &self,
        filter: LogFilter,
        deadline: Deadline,
    ) -> Result<Vec<OplogEntry>, ReplicaError> {
        Ok(self.store.scan_log(filter, deadline)?)
    }

    /// Every record, ordered by key.
    pub fn records(&self) -> Result<Vec<GradeRecord>, ReplicaError> {
        Ok(self.store.records()?)
    }

    /// Replaces all records and clears the oplog.
    ///
    /// The timestamp high-water mark is kept, so entries logged after a
    /// reload still sort after everything logged before it.
    pub fn bootstrap(&mut self, records: &[GradeRecord]) -> Result<(), ReplicaError> {
        self.store.load_snapshot(records)?;
        tracing::info!(
            replica = %self.name,
            records = records.len(),
            "replica bootstrapped"
        );
        Ok(())
    }

    /// Store mutation and oplog append, committed as one unit.
    fn write(&mut self, entry: OplogEntry) -> Result<SetOutcome, ReplicaError> {
        let key = &entry.key;
        let Some(grade) = entry.new_grade() else {
            return Ok(SetOutcome::NotFound);
        };

        let Some(previous) = self.store.lookup(key)? else {
            tracing::warn!(replica = %self.name, key = %key, "set: no such record");
            return Ok(SetOutcome::NotFound);
        };
        match self.store.commit_set(key, grade, &entry) {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(replica = %self.name, key = %key, "set: no such record");
                return Ok(SetOutcome::NotFound);
            }
            Err(CommitError::Update(source)) => return Err(ReplicaError::Store(source)),
            Err(CommitError::Log(source)) => {
                let restored = self.restore(key, &previous);
                tracing::error!(
                    replica = %self.name,
                    key = %key,
                    restored,
                    error = %source,
                    "failed to log SET"
                );
                return Err(ReplicaError::LogAppendFailure {
                    key: key.clone(),
                    operation: OperationKind::Set,
                    restored,
                    source,
                });
            }
        }
        self.observe(entry.timestamp);

        tracing::debug!(
            replica = %self.name,
            key = %key,
            grade = %grade,
            timestamp = %entry.timestamp,
            origin = %entry.origin,
            "set"
        );
        Ok(SetOutcome::Applied)
    }

    /// Puts `previous` back after a failed commit. True if the record holds
    /// `previous` afterwards.
    fn restore(&mut self, key: &GradeKey, previous: &Grade) -> bool {
        match self.store.lookup(key) {
            Ok(Some(current)) if &current == previous => true,
            _ => matches!(self.store.upsert_if_exists(key, previous), Ok(true)),
        }
    }

    /// Next timestamp for an operation issued on this replica.
    fn next_timestamp(&self) -> Timestamp {
        self.clock.now().after(self.last_timestamp)
    }

    fn observe(&mut self, ts: Timestamp) {
        self.last_timestamp = Some(self.last_timestamp.map_or(ts, |last| last.max(ts)));
    }
}
