//! JSON document storage.
//!
//! # File Layout
//!
//! ```text
//! {dir}/
//! ├── grades.jsonl   <- {"student-ID": .., "course-id": .., "grade": ..} per line
//! └── oplogs.jsonl   <- {"timestamp": RFC 3339, "operation": .., ...} per line
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use gradesync_types::{
    BackendKind, CourseId, Deadline, Grade, GradeKey, GradeRecord, LogFilter, Operation,
    OperationKind, OplogEntry, Origin, StudentId,
};
use serde::{Deserialize, Serialize};

use crate::timefmt::{from_datetime, to_datetime};
use crate::{
    ReplicaStore, StoreError, append_line, check_deadline, order_by_timestamp, repair_tail,
    replace_file,
};

const GRADES_FILENAME: &str = "grades.jsonl";
const OPLOG_FILENAME: &str = "oplogs.jsonl";

#[derive(Debug, Serialize, Deserialize)]
struct GradeDocument {
    #[serde(rename = "student-ID")]
    student_id: StudentId,
    #[serde(rename = "course-id")]
    course_id: CourseId,
    grade: Grade,
}

#[derive(Debug, Serialize, Deserialize)]
struct OplogDocument {
    timestamp: DateTime<Utc>,
    operation: OperationKind,
    #[serde(rename = "student-id")]
    student_id: StudentId,
    #[serde(rename = "course-id")]
    course_id: CourseId,
    #[serde(rename = "new-grade")]
    new_grade: String,
    #[serde(default)]
    origin: Origin,
}

impl From<&OplogEntry> for OplogDocument {
    fn from(entry: &OplogEntry) -> Self {
        Self {
            timestamp: to_datetime(entry.timestamp),
            operation: entry.kind(),
            student_id: entry.key.student_id.clone(),
            course_id: entry.key.course_id.clone(),
            new_grade: entry.grade_column().to_string(),
            origin: entry.origin.clone(),
        }
    }
}

impl TryFrom<OplogDocument> for OplogEntry {
    type Error = StoreError;

    fn try_from(doc: OplogDocument) -> Result<Self, Self::Error> {
        let operation = match doc.operation {
            OperationKind::Get => Operation::Get,
            OperationKind::Set => Operation::Set {
                grade: Grade::new(&doc.new_grade)?,
            },
        };
        Ok(OplogEntry {
            timestamp: from_datetime(doc.timestamp)?,
            key: GradeKey::new(doc.student_id, doc.course_id),
            operation,
            origin: doc.origin,
        })
    }
}

/// Mongo-style store over JSON-lines files.
///
/// Timestamps are RFC 3339 strings with nanosecond precision inside each
/// document, normalized on read.
#[derive(Debug)]
pub struct DocumentStore {
    dir: PathBuf,
    records: BTreeMap<GradeKey, Grade>,
}

impl DocumentStore {
    /// Opens the store in `dir`, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let grades_path = dir.join(GRADES_FILENAME);
        if !grades_path.exists() {
            replace_file(&grades_path, b"")?;
        }
        let oplog_path = dir.join(OPLOG_FILENAME);
        if !oplog_path.exists() {
            replace_file(&oplog_path, b"")?;
        }
        repair_tail(&oplog_path, |line| {
            serde_json::from_str::<OplogDocument>(line).is_ok()
        })?;

        let mut records = BTreeMap::new();
        for_each_document(&grades_path, &Deadline::none(), |doc: GradeDocument| {
            records.insert(GradeKey::new(doc.student_id, doc.course_id), doc.grade);
            Ok(())
        })?;

        tracing::debug!(
            dir = %dir.display(),
            records = records.len(),
            "opened document store"
        );
        Ok(Self { dir, records })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn grades_path(&self) -> PathBuf {
        self.dir.join(GRADES_FILENAME)
    }

    fn oplog_path(&self) -> PathBuf {
        self.dir.join(OPLOG_FILENAME)
    }

    fn write_grades(&self, records: &BTreeMap<GradeKey, Grade>) -> Result<(), StoreError> {
        let mut out = Vec::new();
        for (key, grade) in records {
            let doc = GradeDocument {
                student_id: key.student_id.clone(),
                course_id: key.course_id.clone(),
                grade: grade.clone(),
            };
            serde_json::to_writer(&mut out, &doc)?;
            out.push(b'\n');
        }
        replace_file(&self.grades_path(), &out)
    }
}

/// Decodes every non-blank line of `path` as a `T` and hands it to `visit`.
fn for_each_document<T, F>(path: &Path, deadline: &Deadline, mut visit: F) -> Result<(), StoreError>
where
    T: for<'de> Deserialize<'de>,
    F: FnMut(T) -> Result<(), StoreError>,
{
    let reader = BufReader::new(fs::File::open(path)?);
    for (idx, line) in reader.lines().enumerate() {
        check_deadline(deadline)?;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc = serde_json::from_str(&line).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            line: idx + 1,
            reason: e.to_string(),
        })?;
        visit(doc)?;
    }
    Ok(())
}

impl ReplicaStore for DocumentStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    fn lookup(&self, key: &GradeKey) -> Result<Option<Grade>, StoreError> {
        Ok(self.records.get(key).cloned())
    }

    fn upsert_if_exists(&mut self, key: &GradeKey, grade: &Grade) -> Result<bool, StoreError> {
        if !self.records.contains_key(key) {
            return Ok(false);
        }
        let mut updated = self.records.clone();
        updated.insert(key.clone(), grade.clone());
        self.write_grades(&updated)?;
        self.records = updated;
        Ok(true)
    }

    fn append_log(&mut self, entry: &OplogEntry) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(&OplogDocument::from(entry))?;
        line.push(b'\n');
        append_line(&self.oplog_path(), &line)
    }

    fn scan_log(
        &self,
        filter: LogFilter,
        deadline: Deadline,
    ) -> Result<Vec<OplogEntry>, StoreError> {
        let mut entries = Vec::new();
        for_each_document(&self.oplog_path(), &deadline, |doc: OplogDocument| {
            let entry = OplogEntry::try_from(doc)?;
            if filter.matches(&entry) {
                entries.push(entry);
            }
            Ok(())
        })?;

        check_deadline(&deadline)?;
        Ok(order_by_timestamp(entries))
    }

    fn load_snapshot(&mut self, records: &[GradeRecord]) -> Result<(), StoreError> {
        let snapshot: BTreeMap<GradeKey, Grade> = records
            .iter()
            .map(|r| (r.key.clone(), r.grade.clone()))
            .collect();
        self.write_grades(&snapshot)?;
        replace_file(&self.oplog_path(), b"")?;
        self.records = snapshot;
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
