//! In-memory replica store.

use std::collections::BTreeMap;
use std::time::Duration;

use gradesync_types::{BackendKind, Deadline, Grade, GradeKey, GradeRecord, LogFilter, OplogEntry};

use crate::{ReplicaStore, StoreError, check_deadline, order_by_timestamp};

/// In-memory store for testing and development.
///
/// Not suitable for production - data is lost on restart. Carries switches
/// that make record updates, log appends or scans fail, which exercise the engine's failure
/// paths without a real outage.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: BTreeMap<GradeKey, Grade>,
    oplog: Vec<OplogEntry>,
    upsert_budget: Option<usize>,
    fail_appends: bool,
    fail_scans: bool,
    scan_delay: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with `records` and an empty oplog.
    pub fn with_records(records: impl IntoIterator<Item = GradeRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.key, r.grade)).collect(),
            ..Self::default()
        }
    }

    /// Lets `budget` more `upsert_if_exists` calls through, then fails every
    /// one after. `None` lifts the limit.
    pub fn set_upsert_budget(&mut self, budget: Option<usize>) {
        self.upsert_budget = budget;
    }

    /// Makes every subsequent `append_log` fail.
    pub fn set_fail_appends(&mut self, fail: bool) {
        self.fail_appends = fail;
    }

    /// Makes every subsequent `scan_log` fail.
    pub fn set_fail_scans(&mut self, fail: bool) {
        self.fail_scans = fail;
    }

    /// Delays every scan by `delay` before reading, to simulate a slow peer.
    pub fn set_scan_delay(&mut self, delay: Option<Duration>) {
        self.scan_delay = delay;
    }

    /// Number of oplog entries, including GETs.
    pub fn oplog_len(&self) -> usize {
        self.oplog.len()
    }
}

impl ReplicaStore for MemoryStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn lookup(&self, key: &GradeKey) -> Result<Option<Grade>, StoreError> {
        Ok(self.records.get(key).cloned())
    }

    fn upsert_if_exists(&mut self, key: &GradeKey, grade: &Grade) -> Result<bool, StoreError> {
        if let Some(remaining) = self.upsert_budget.as_mut() {
            if *remaining == 0 {
                return Err(StoreError::Unavailable("record updates disabled".to_string()));
            }
            *remaining -= 1;
        }
        match self.records.get_mut(key) {
            Some(current) => {
                *current = grade.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn append_log(&mut self, entry: &OplogEntry) -> Result<(), StoreError> {
        if self.fail_appends {
            return Err(StoreError::Unavailable("oplog appends disabled".to_string()));
        }
        self.oplog.push(entry.clone());
        Ok(())
    }

    fn scan_log(
        &self,
        filter: LogFilter,
        deadline: Deadline,
    ) -> Result<Vec<OplogEntry>, StoreError> {
        if let Some(delay) = self.scan_delay {
            std::thread::sleep(delay);
        }
        if self.fail_scans {
            return Err(StoreError::Unavailable("oplog scans disabled".to_string()));
        }
        check_deadline(&deadline)?;

        let entries = self
            .oplog
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        Ok(order_by_timestamp(entries))
    }

    fn load_snapshot(&mut self, records: &[GradeRecord]) -> Result<(), StoreError> {
        self.records = records
            .iter()
            .map(|r| (r.key.clone(), r.grade.clone()))
            .collect();
        self.oplog.clear();
        Ok(())
    }

    fn records(&self) -> Result<Vec<GradeRecord>, StoreError> {
        Ok(self
            .records
            .iter()
            .map(|(key, grade)| GradeRecord::new(key.clone(), grade.clone()))
            .collect())
    }
}
