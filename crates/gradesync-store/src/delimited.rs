//! Comma-delimited text storage.
//!
//! # File Layout
//!
//! ```text
//! {dir}/
//! ├── grades.csv   <- student-ID,course-id,grade (rewritten on update)
//! └── oplogs.csv   <- log_timestamp,operation,student-ID,course-id,new_grade,origin (append-only)
//! ```
//!
//! Timestamps are written as `YYYY-MM-DD HH:MM:SS.fffffffff` UTC text and
//! parsed back on every scan. GET rows carry the `X` sentinel grade.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use gradesync_types::{
    BackendKind, Deadline, Grade, GradeKey, GradeRecord, LogFilter, Operation, OperationKind,
    OplogEntry, Origin,
};

use crate::timefmt::{format_text_timestamp, parse_text_timestamp};
use crate::{
    ReplicaStore, StoreError, append_line, check_deadline, order_by_timestamp, repair_tail,
    replace_file,
};

const GRADES_FILENAME: &str = "grades.csv";
const OPLOG_FILENAME: &str = "oplogs.csv";
const GRADES_HEADER: &str = "student-ID,course-id,grade";
const OPLOG_HEADER: &str = "log_timestamp,operation,student-ID,course-id,new_grade,origin";

/// Hive-style store over delimited text files.
///
/// Records are cached in memory and the grades file is rewritten whenever a
/// grade changes. The oplog is only ever appended to, and read back from disk
/// on each scan.
#[derive(Debug)]
pub struct DelimitedStore {
    dir: PathBuf,
    records: BTreeMap<GradeKey, Grade>,
}

impl DelimitedStore {
    /// Opens the store in `dir`, creating the directory and empty files if
    /// needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let grades_path = dir.join(GRADES_FILENAME);
        if !grades_path.exists() {
            replace_file(&grades_path, format!("{GRADES_HEADER}\n").as_bytes())?;
        }
        let oplog_path = dir.join(OPLOG_FILENAME);
        if !oplog_path.exists() {
            replace_file(&oplog_path, format!("{OPLOG_HEADER}\n").as_bytes())?;
        }
        repair_tail(&oplog_path, |line| {
            is_header(line, OPLOG_HEADER) || parse_oplog_line(&oplog_path, 0, line).is_ok()
        })?;

        let records = read_grades(&grades_path)?;
        tracing::debug!(
            dir = %dir.display(),
            records = records.len(),
            "opened delimited store"
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
        let mut out = String::with_capacity(32 * (records.len() + 1));
        out.push_str(GRADES_HEADER);
        out.push('\n');
        for (key, grade) in records {
            out.push_str(&format!("{},{},{}\n", key.student_id, key.course_id, grade));
        }
        replace_file(&self.grades_path(), out.as_bytes())
    }
}

fn is_header(line: &str, header: &str) -> bool {
    let first = header.split(',').next().unwrap_or(header);
    line.split(',')
        .next()
        .is_some_and(|field| field.trim().eq_ignore_ascii_case(first))
}

fn corrupt(path: &Path, line: usize, reason: impl ToString) -> StoreError {
    StoreError::Corrupt {
        path: path.to_path_buf(),
        line,
        reason: reason.to_string(),
    }
}

fn read_grades(path: &Path) -> Result<BTreeMap<GradeKey, Grade>, StoreError> {
    let reader = BufReader::new(fs::File::open(path)?);
    let mut records = BTreeMap::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        if line.trim().is_empty() || (line_no == 1 && is_header(&line, GRADES_HEADER)) {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        let [student, course, grade] = fields.as_slice() else {
            return Err(corrupt(path, line_no, "expected 3 fields"));
        };
        let key = GradeKey::parse(student, course).map_err(|e| corrupt(path, line_no, e))?;
        let grade = Grade::new(grade).map_err(|e| corrupt(path, line_no, e))?;
        records.insert(key, grade);
    }

    Ok(records)
}

fn parse_oplog_line(path: &Path, line_no: usize, line: &str) -> Result<OplogEntry, StoreError> {
    let fields: Vec<&str> = line.split(',').collect();
    let (ts, op, student, course, grade, origin) = match fields.as_slice() {
        [ts, op, student, course, grade] => (ts, op, student, course, grade, ""),
        [ts, op, student, course, grade, origin] => (ts, op, student, course, grade, *origin),
        _ => return Err(corrupt(path, line_no, "expected 5 or 6 fields")),
    };

    let timestamp = parse_text_timestamp(ts)?;
    let key = GradeKey::parse(student, course).map_err(|e| corrupt(path, line_no, e))?;
    let operation = match op.parse::<OperationKind>().map_err(|e| corrupt(path, line_no, e))? {
        OperationKind::Get => Operation::Get,
        OperationKind::Set => Operation::Set {
            grade: Grade::new(grade).map_err(|e| corrupt(path, line_no, e))?,
        },
    };
    let origin = Origin::from_tag(origin).map_err(|e| corrupt(path, line_no, e))?;

    Ok(OplogEntry {
        timestamp,
        key,
        operation,
        origin,
    })
}

fn format_oplog_line(entry: &OplogEntry) -> String {
    format!(
        "{},{},{},{},{},{}\n",
        format_text_timestamp(entry.timestamp),
        entry.kind(),
        entry.key.student_id,
        entry.key.course_id,
        entry.grade_column(),
        entry.origin.to_tag(),
    )
}

impl ReplicaStore for DelimitedStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Delimited
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
        append_line(&self.oplog_path(), format_oplog_line(entry).as_bytes())
    }

    fn scan_log(
        &self,
        filter: LogFilter,
        deadline: Deadline,
    ) -> Result<Vec<OplogEntry>, StoreError> {
        let path = self.oplog_path();
        let reader = BufReader::new(fs::File::open(&path)?);
        let mut entries = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            check_deadline(&deadline)?;
            let line = line?;
            let line_no = idx + 1;
            if line.trim().is_empty() || (line_no == 1 && is_header(&line, OPLOG_HEADER)) {
                continue;
            }
            let entry = parse_oplog_line(&path, line_no, &line)?;
            if filter.matches(&entry) {
                entries.push(entry);
            }
        }

        check_deadline(&deadline)?;
        Ok(order_by_timestamp(entries))
    }

    fn load_snapshot(&mut self, records: &[GradeRecord]) -> Result<(), StoreError> {
        let snapshot: BTreeMap<GradeKey, Grade> = records
            .iter()
            .map(|r| (r.key.clone(), r.grade.clone()))
            .collect();
        self.write_grades(&snapshot)?;
        replace_file(&self.oplog_path(), format!("{OPLOG_HEADER}\n").as_bytes())?;
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
