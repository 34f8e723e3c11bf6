//! CSV snapshot loading.
//!
//! The snapshot is a header-indexed CSV. Only the `student-ID`, `course-id`
//! and `grade` columns are read; header names match case-insensitively and
//! any other column (`roll no`, `email ID`, ...) is ignored.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use gradesync_types::{Grade, GradeKey, GradeRecord, TypesError};

const STUDENT_COLUMN: &str = "student-ID";
const COURSE_COLUMN: &str = "course-id";
const GRADE_COLUMN: &str = "grade";

/// Errors from reading a CSV snapshot.
#[derive(thiserror::Error, Debug)]
pub enum BootstrapError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{origin}: {source}")]
    Malformed { origin: String, source: csv::Error },

    #[error("{origin}: snapshot is empty")]
    MissingHeader { origin: String },

    #[error("{origin}: header has no {column:?} column")]
    MissingColumn {
        origin: String,
        column: &'static str,
    },

    #[error("{origin}:{line}: expected at least {expected} fields, found {found}")]
    ShortRow {
        origin: String,
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("{origin}:{line}: {source}")]
    InvalidValue {
        origin: String,
        line: u64,
        source: TypesError,
    },
}

struct Columns {
    student: usize,
    course: usize,
    grade: usize,
}

impl Columns {
    fn locate(header: &StringRecord, origin: &str) -> Result<Self, BootstrapError> {
        let find = |column: &'static str| {
            header
                .iter()
                // A byte-order mark would hide the first column name.
                .position(|h| h.trim_start_matches('\u{feff}').eq_ignore_ascii_case(column))
                .ok_or_else(|| BootstrapError::MissingColumn {
                    origin: origin.to_string(),
                    column,
                })
        };
        Ok(Self {
            student: find(STUDENT_COLUMN)?,
            course: find(COURSE_COLUMN)?,
            grade: find(GRADE_COLUMN)?,
        })
    }

    fn width(&self) -> usize {
        self.student.max(self.course).max(self.grade) + 1
    }
}

fn is_blank(row: &StringRecord) -> bool {
    row.iter().all(str::is_empty)
}

/// Reads a snapshot from `reader`. `origin` names the input in errors.
///
/// Fields follow RFC 4180 quoting and are trimmed. Blank lines are skipped.
/// When a key appears more than once the last row wins. Records come back
/// ordered by key.
pub fn parse_csv(reader: impl Read, origin: &str) -> Result<Vec<GradeRecord>, BootstrapError> {
    let malformed = |source| BootstrapError::Malformed {
        origin: origin.to_string(),
        source,
    };
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);
    let mut rows = reader.records();

    let columns = loop {
        let Some(row) = rows.next() else {
            return Err(BootstrapError::MissingHeader {
                origin: origin.to_string(),
            });
        };
        let row = row.map_err(malformed)?;
        if !is_blank(&row) {
            break Columns::locate(&row, origin)?;
        }
    };

    let mut records = BTreeMap::new();
    for row in rows {
        let row = row.map_err(malformed)?;
        if is_blank(&row) {
            continue;
        }
        let line = row.position().map_or(0, csv::Position::line);
        if row.len() < columns.width() {
            return Err(BootstrapError::ShortRow {
                origin: origin.to_string(),
                line,
                expected: columns.width(),
                found: row.len(),
            });
        }

        let invalid = |source| BootstrapError::InvalidValue {
            origin: origin.to_string(),
            line,
            source,
        };
        let key = GradeKey::parse(&row[columns.student], &row[columns.course]).map_err(invalid)?;
        let grade = Grade::new(&row[columns.grade]).map_err(invalid)?;
        records.insert(key, grade);
    }

    Ok(records
        .into_iter()
        .map(|(key, grade)| GradeRecord::new(key, grade))
        .collect())
}

/// Reads a snapshot file.
pub fn read_csv(path: impl AsRef<Path>) -> Result<Vec<GradeRecord>, BootstrapError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| BootstrapError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = parse_csv(BufReader::new(file), &path.display().to_string())?;
    tracing::info!(path = %path.display(), records = records.len(), "read CSV snapshot");
    Ok(records)
}
