//! Table storage: the grade table and the oplog table live in one file.
//!
//! Every mutation writes the complete file through a temp file and a rename,
//! so each commit is all-or-nothing on disk. Timestamps are stored as integer
//! nanoseconds.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use gradesync_types::{BackendKind, Deadline, Grade, GradeKey, GradeRecord, LogFilter, OplogEntry};
use serde::{Deserialize, Serialize};

use crate::{CommitError, ReplicaStore, StoreError, check_deadline, order_by_timestamp, replace_file};

const TABLES_FILENAME: &str = "tables.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Tables {
    grades: Vec<GradeRecord>,
    oplogs: Vec<OplogEntry>,
}

/// SQL-style store keeping both tables in a single committed file.
#[derive(Debug)]
pub struct TableStore {
    path: PathBuf,
    grades: BTreeMap<GradeKey, Grade>,
    oplogs: Vec<OplogEntry>,
}

impl TableStore {
    /// Opens the store in `dir`, creating an empty table file if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(TABLES_FILENAME);

        let tables = if path.exists() {
            let json = fs::read_to_string(&path)?;
            serde_json::from_str::<Tables>(&json).map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                line: e.line(),
                reason: e.to_string(),
            })?
        } else {
            Tables::default()
        };

        let store = Self {
            path,
            grades: tables
                .grades
                .into_iter()
                .map(|r| (r.key, r.grade))
                .collect(),
            oplogs: tables.oplogs,
        };
        if !store.path.exists() {
            store.commit(&store.grades, &store.oplogs)?;
        }

        tracing::debug!(
            path = %store.path.display(),
            records = store.grades.len(),
            oplog_entries = store.oplogs.len(),
            "opened table store"
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes both tables as one unit.
    fn commit(
        &self,
        grades: &BTreeMap<GradeKey, Grade>,
        oplogs: &[OplogEntry],
    ) -> Result<(), StoreError> {
        let tables = Tables {
            grades: grades
                .iter()
                .map(|(key, grade)| GradeRecord::new(key.clone(), grade.clone()))
                .collect(),
            oplogs: oplogs.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&tables)?;
        replace_file(&self.path, &json)
    }
}

impl ReplicaStore for TableStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Table
    }

    fn lookup(&self, key: &GradeKey) -> Result<Option<Grade>, StoreError> {
        Ok(self.grades.get(key).cloned())
    }

    fn upsert_if_exists(&mut self, key: &GradeKey, grade: &Grade) -> Result<bool, StoreError> {
        if !self.grades.contains_key(key) {
            return Ok(false);
        }
        let mut grades = self.grades.clone();
        grades.insert(key.clone(), grade.clone());
        self.commit(&grades, &self.oplogs)?;
        self.grades = grades;
        Ok(true)
    }

    fn append_log(&mut self, entry: &OplogEntry) -> Result<(), StoreError> {
        let mut oplogs = self.oplogs.clone();
        oplogs.push(entry.clone());
        self.commit(&self.grades, &oplogs)?;
        self.oplogs = oplogs;
        Ok(())
    }

    /// Writes the new grade and the log row in a single file commit. On
    /// failure neither change reaches disk or the in-memory tables.
    fn commit_set(
        &mut self,
        key: &GradeKey,
        grade: &Grade,
        entry: &OplogEntry,
    ) -> Result<bool, CommitError> {
        if !self.grades.contains_key(key) {
            return Ok(false);
        }
        let mut grades = self.grades.clone();
        grades.insert(key.clone(), grade.clone());
        let mut oplogs = self.oplogs.clone();
        oplogs.push(entry.clone());
        self.commit(&grades, &oplogs).map_err(CommitError::Log)?;
        self.grades = grades;
        self.oplogs = oplogs;
        Ok(true)
    }

    fn scan_log(
        &self,
        filter: LogFilter,
        deadline: Deadline,
    ) -> Result<Vec<OplogEntry>, StoreError> {
        let mut entries = Vec::new();
        for entry in &self.oplogs {
            check_deadline(&deadline)?;
            if filter.matches(entry) {
                entries.push(entry.clone());
            }
        }
        check_deadline(&deadline)?;
        Ok(order_by_timestamp(entries))
    }

    fn load_snapshot(&mut self, records: &[GradeRecord]) -> Result<(), StoreError> {
        let grades: BTreeMap<GradeKey, Grade> = records
            .iter()
            .map(|r| (r.key.clone(), r.grade.clone()))
            .collect();
        self.commit(&grades, &[])?;
        self.grades = grades;
        self.oplogs.clear();
        Ok(())
    }

    fn records(&self) -> Result<Vec<GradeRecord>, StoreError> {
        Ok(self
            .grades
            .iter()
            .map(|(key, grade)| GradeRecord::new(key.clone(), grade.clone()))
            .collect())
    }
}
