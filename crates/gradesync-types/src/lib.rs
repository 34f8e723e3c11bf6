//! # gradesync-types: Core types for `gradesync`
//!
//! This crate contains shared types used across the `gradesync` system:
//! - Identifiers ([`StudentId`], [`CourseId`], [`ReplicaName`])
//! - Record types ([`GradeKey`], [`Grade`], [`GradeRecord`])
//! - Temporal types ([`Timestamp`], [`Deadline`])
//! - Operation log types ([`OplogEntry`], [`Operation`], [`OperationKind`], [`Origin`], [`LogFilter`])
//! - Deployment ([`BackendKind`])

use std::{
    fmt::{Debug, Display},
    str::FromStr,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

/// Grade recorded on GET entries at persistence boundaries.
///
/// GET entries carry no grade; stores that need a value in that column
/// write this sentinel and ignore it on read.
pub const GET_SENTINEL: &str = "X";

/// Characters that cannot appear in any identifier or grade.
///
/// Commas and line breaks would corrupt delimited storage; parentheses would
/// make command scripts ambiguous.
const FORBIDDEN_CHARS: [char; 5] = [',', '(', ')', '\n', '\r'];

/// Errors produced when constructing validated types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypesError {
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },

    #[error("{kind} {value:?} contains forbidden character {ch:?}")]
    ForbiddenCharacter {
        kind: &'static str,
        value: String,
        ch: char,
    },

    #[error("unknown operation {0:?}")]
    UnknownOperation(String),

    #[error("invalid origin tag {0:?}")]
    InvalidOrigin(String),
}

fn validate(kind: &'static str, raw: &str) -> Result<String, TypesError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TypesError::Empty { kind });
    }
    if let Some(ch) = trimmed.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(TypesError::ForbiddenCharacter {
            kind,
            value: trimmed.to_string(),
            ch,
        });
    }
    Ok(trimmed.to_string())
}

/// Declares a validated, trimmed string newtype.
macro_rules! text_type {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validates and trims `raw`.
            pub fn new(raw: impl AsRef<str>) -> Result<Self, TypesError> {
                validate($kind, raw.as_ref()).map(Self)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = TypesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = TypesError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// ============================================================================
// Identifiers
// ============================================================================

text_type!(
    /// Student half of the composite record key.
    StudentId,
    "student id"
);

text_type!(
    /// Course half of the composite record key.
    CourseId,
    "course id"
);

text_type!(
    /// A grade value. Opaque to the system; compared only for equality.
    Grade,
    "grade"
);

/// Name of a replica, normalized to upper case (`hive` and `HIVE` are the
/// same replica).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReplicaName(String);

impl ReplicaName {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, TypesError> {
        let name = validate("replica name", raw.as_ref())?;
        if let Some(ch) = name.chars().find(|c| c.is_whitespace() || *c == '.') {
            return Err(TypesError::ForbiddenCharacter {
                kind: "replica name",
                value: name,
                ch,
            });
        }
        Ok(Self(name.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ReplicaName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ReplicaName {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ReplicaName {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ReplicaName> for String {
    fn from(value: ReplicaName) -> Self {
        value.0
    }
}

// ============================================================================
// Records
// ============================================================================

/// Composite key of a grade record. Immutable once the record exists.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GradeKey {
    pub student_id: StudentId,
    pub course_id: CourseId,
}

impl GradeKey {
    pub fn new(student_id: StudentId, course_id: CourseId) -> Self {
        Self {
            student_id,
            course_id,
        }
    }

    /// Validates both halves of the key.
    pub fn parse(student_id: &str, course_id: &str) -> Result<Self, TypesError> {
        Ok(Self::new(
            StudentId::new(student_id)?,
            CourseId::new(course_id)?,
        ))
    }
}

impl Display for GradeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.student_id, self.course_id)
    }
}

/// A grade record: composite key plus current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeRecord {
    pub key: GradeKey,
    pub grade: Grade,
}

impl GradeRecord {
    pub fn new(key: GradeKey, grade: Grade) -> Self {
        Self { key, grade }
    }
}

// ============================================================================
// Temporal Types
// ============================================================================

/// Wall-clock timestamp in nanoseconds since Unix epoch.
///
/// Every store normalizes its native timestamp representation to this type
/// on read, so ordering comparisons never touch raw strings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The Unix epoch (1970-01-01 00:00:00 UTC).
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Creates a timestamp from nanoseconds since Unix epoch.
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Returns the timestamp as nanoseconds since Unix epoch.
    pub fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Returns the timestamp as seconds since Unix epoch (truncates nanoseconds).
    pub fn as_secs(&self) -> u64 {
        self.0 / 1_000_000_000
    }

    /// Returns the sub-second part in nanoseconds.
    pub fn subsec_nanos(&self) -> u32 {
        (self.0 % 1_000_000_000) as u32
    }

    /// Creates a timestamp for the current time.
    ///
    /// A system clock set before the Unix epoch yields [`Timestamp::EPOCH`].
    pub fn now() -> Self {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| Self(d.as_nanos() as u64))
            .unwrap_or(Self::EPOCH)
    }

    /// Returns `max(self, last + 1ns)`.
    ///
    /// Guarantees a replica's own timestamps are strictly increasing even if
    /// the wall clock stalls or moves backwards.
    pub fn after(self, last: Option<Timestamp>) -> Self {
        match last {
            Some(prev) if self.0 <= prev.0 => Timestamp(prev.0.saturating_add(1)),
            _ => self,
        }
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:09}", self.as_secs(), self.subsec_nanos())
    }
}

impl From<u64> for Timestamp {
    fn from(nanos: u64) -> Self {
        Self(nanos)
    }
}

impl From<Timestamp> for u64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

/// Time budget for an operation that depends on a collaborator.
///
/// A deadline of `None` never expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deadline {
    expires_at: Option<Instant>,
}

impl Deadline {
    /// A deadline that never expires.
    pub fn none() -> Self {
        Self { expires_at: None }
    }

    /// A deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now().checked_add(budget),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }

    /// Time left before expiry, `None` for an unbounded deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }
}

// ============================================================================
// Operation Log
// ============================================================================

/// Kind of operation recorded in the oplog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    Get,
    Set,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Get => "GET",
            OperationKind::Set => "SET",
        }
    }
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(OperationKind::Get),
            "SET" => Ok(OperationKind::Set),
            other => Err(TypesError::UnknownOperation(other.to_string())),
        }
    }
}

/// A logged operation. Only SET carries a grade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Get,
    Set { grade: Grade },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Get => OperationKind::Get,
            Operation::Set { .. } => OperationKind::Set,
        }
    }
}

/// Where an oplog entry came from.
///
/// Merge-applied entries keep the remote timestamp, so a later merge in the
/// opposite direction sees an equal timestamp and leaves the key alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Origin {
    /// Issued by a GET or SET against this replica.
    #[default]
    Local,
    /// Applied by a merge pulling from `source`.
    Merged { source: ReplicaName },
}

impl Origin {
    /// Compact textual form used by delimited storage (`local`, `merge:HIVE`).
    pub fn to_tag(&self) -> String {
        match self {
            Origin::Local => "local".to_string(),
            Origin::Merged { source } => format!("merge:{source}"),
        }
    }

    /// Parses the form produced by [`Origin::to_tag`]. A missing tag reads as
    /// [`Origin::Local`].
    pub fn from_tag(tag: &str) -> Result<Self, TypesError> {
        let tag = tag.trim();
        if tag.is_empty() || tag.eq_ignore_ascii_case("local") {
            return Ok(Origin::Local);
        }
        match tag.split_once(':') {
            Some((prefix, source)) if prefix.eq_ignore_ascii_case("merge") => {
                Ok(Origin::Merged {
                    source: ReplicaName::new(source)?,
                })
            }
            _ => Err(TypesError::InvalidOrigin(tag.to_string())),
        }
    }
}

impl Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_tag())
    }
}

/// One immutable entry of a replica's operation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OplogEntry {
    pub timestamp: Timestamp,
    pub key: GradeKey,
    pub operation: Operation,
    pub origin: Origin,
}

impl OplogEntry {
    /// Audit entry for a successful local GET.
    pub fn get(timestamp: Timestamp, key: GradeKey) -> Self {
        Self {
            timestamp,
            key,
            operation: Operation::Get,
            origin: Origin::Local,
        }
    }

    /// Entry for a successful local SET.
    pub fn set(timestamp: Timestamp, key: GradeKey, grade: Grade) -> Self {
        Self {
            timestamp,
            key,
            operation: Operation::Set { grade },
            origin: Origin::Local,
        }
    }

    /// Entry for a SET applied by a merge, stamped with the remote timestamp.
    pub fn merged(
        timestamp: Timestamp,
        key: GradeKey,
        grade: Grade,
        source: ReplicaName,
    ) -> Self {
        Self {
            timestamp,
            key,
            operation: Operation::Set { grade },
            origin: Origin::Merged { source },
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }

    /// The grade written by a SET entry; `None` for GET.
    pub fn new_grade(&self) -> Option<&Grade> {
        match &self.operation {
            Operation::Set { grade } => Some(grade),
            Operation::Get => None,
        }
    }

    /// The grade column as stores persist it (GET entries carry the sentinel).
    pub fn grade_column(&self) -> &str {
        self.new_grade().map_or(GET_SENTINEL, Grade::as_str)
    }
}

// ============================================================================
// Deployment
// ============================================================================

/// Storage engine behind a replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Ephemeral in-process tables.
    Memory,
    /// Comma-delimited text files (Hive-style).
    Delimited,
    /// One JSON document per line (Mongo-style).
    Document,
    /// Grade and oplog tables committed together in one file (SQL-style).
    Table,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::Delimited => "delimited",
            BackendKind::Document => "document",
            BackendKind::Table => "table",
        }
    }
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicate for scanning an oplog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFilter {
    #[default]
    All,
    /// Only SET entries: the input of every merge.
    Sets,
}

impl LogFilter {
    pub fn matches(&self, entry: &OplogEntry) -> bool {
        match self {
            LogFilter::All => true,
            LogFilter::Sets => entry.kind() == OperationKind::Set,
        }
    }
}

#[cfg(test)]
mod tests;
