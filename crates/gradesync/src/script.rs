//! Command scripts.
//!
//! One command per line, addressed to a replica by name:
//!
//! ```text
//! # comments and blank lines are skipped
//! HIVE.SET (( SID1033 , CSE016 ) , A )
//! SQL.GET ( SID1033 , CSE016 )
//! SQL.MERGE ( HIVE )
//! ```
//!
//! Whitespace around tokens is ignored and replica names are
//! case-insensitive. A script is parsed completely before anything runs, so
//! a syntax error on line 40 does not leave lines 1 to 39 applied.

use std::fmt::{self, Display};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gradesync_kernel::{MergeReport, SetOutcome};
use gradesync_types::{Grade, GradeKey, OperationKind, ReplicaName, TypesError};

use crate::cluster::Cluster;
use crate::error::ClusterError;

/// Errors from loading a script.
#[derive(thiserror::Error, Debug)]
pub enum ScriptError {
    #[error("failed to read script {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("line {line}: {kind}")]
    Parse { line: usize, kind: ParseErrorKind },
}

/// What was wrong with a script line.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("expected <REPLICA>.<OPERATION>")]
    MissingReplica,

    #[error("unknown operation {0:?}")]
    UnknownOperation(String),

    #[error("malformed {operation}, expected {expected}")]
    Malformed {
        operation: &'static str,
        expected: &'static str,
    },

    #[error(transparent)]
    Invalid(#[from] TypesError),
}

const GET_SHAPE: &str = "GET ( student , course )";
const SET_SHAPE: &str = "SET (( student , course ) , grade )";
const MERGE_SHAPE: &str = "MERGE ( source )";

/// A parsed script command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get {
        replica: ReplicaName,
        key: GradeKey,
    },
    Set {
        replica: ReplicaName,
        key: GradeKey,
        grade: Grade,
    },
    Merge {
        target: ReplicaName,
        source: ReplicaName,
    },
}

impl Command {
    /// Parses one line. Blank and comment lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseErrorKind> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (replica, rest) = line.split_once('.').ok_or(ParseErrorKind::MissingReplica)?;
        if replica.trim().is_empty() {
            return Err(ParseErrorKind::MissingReplica);
        }
        let replica = ReplicaName::new(replica)?;

        let rest = rest.trim_start();
        let op_len = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        let (op, args) = rest.split_at(op_len);

        let command = if op.eq_ignore_ascii_case("MERGE") {
            let source = parenthesized(args).ok_or(malformed("MERGE", MERGE_SHAPE))?;
            Command::Merge {
                target: replica,
                source: ReplicaName::new(source)?,
            }
        } else {
            match op.parse::<OperationKind>() {
                Ok(OperationKind::Get) => {
                    let inner = parenthesized(args).ok_or(malformed("GET", GET_SHAPE))?;
                    let key = parse_key(inner).ok_or(malformed("GET", GET_SHAPE))??;
                    Command::Get { replica, key }
                }
                Ok(OperationKind::Set) => {
                    let (key, grade) = parse_set_args(args)?;
                    Command::Set {
                        replica,
                        key,
                        grade,
                    }
                }
                Err(_) => return Err(ParseErrorKind::UnknownOperation(op.to_string())),
            }
        };
        Ok(Some(command))
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Get { replica, key } => write!(f, "{replica}: GET {key}"),
            Command::Set { replica, key, .. } => write!(f, "{replica}: SET {key}"),
            Command::Merge { target, source } => write!(f, "{target}: MERGE ({source})"),
        }
    }
}

fn malformed(operation: &'static str, expected: &'static str) -> ParseErrorKind {
    ParseErrorKind::Malformed {
        operation,
        expected,
    }
}

/// Returns the text between an opening and a closing parenthesis that wrap
/// all of `text`.
fn parenthesized(text: &str) -> Option<&str> {
    text.trim()
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
}

/// Parses `student , course`. `None` if the shape is wrong.
fn parse_key(text: &str) -> Option<Result<GradeKey, ParseErrorKind>> {
    let (student, course) = text.split_once(',')?;
    Some(GradeKey::parse(student, course).map_err(ParseErrorKind::from))
}

fn parse_set_args(args: &str) -> Result<(GradeKey, Grade), ParseErrorKind> {
    let shape = || malformed("SET", SET_SHAPE);

    let inner = parenthesized(args).ok_or_else(shape)?.trim();
    let inner = inner.strip_prefix('(').ok_or_else(shape)?;
    let (ids, after) = inner.split_once(')').ok_or_else(shape)?;
    let grade = after.trim().strip_prefix(',').ok_or_else(shape)?;

    let key = parse_key(ids).ok_or_else(shape)??;
    Ok((key, Grade::new(grade)?))
}

/// A command and the line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    pub line: usize,
    pub command: Command,
}

/// Parses a whole script. Line numbers start at 1.
pub fn parse_script(text: &str) -> Result<Vec<ScriptLine>, ScriptError> {
    let mut commands = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        if let Some(command) =
            Command::parse(raw).map_err(|kind| ScriptError::Parse { line, kind })?
        {
            commands.push(ScriptLine { line, command });
        }
    }
    Ok(commands)
}

/// Reads and parses a script file.
pub fn load_script(path: impl AsRef<Path>) -> Result<Vec<ScriptLine>, ScriptError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ScriptError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_script(&text)
}

/// Result of a command that ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Get(Option<Grade>),
    Set { grade: Grade, outcome: SetOutcome },
    Merge(MergeReport),
}

impl Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Get(Some(grade)) => write!(f, "{grade}"),
            Outcome::Get(None)
            | Outcome::Set {
                outcome: SetOutcome::NotFound,
                ..
            } => f.write_str("not found"),
            Outcome::Set { grade, .. } => write!(f, "{grade}"),
            Outcome::Merge(report) => {
                write!(f, "{} merged", report.merged)?;
                if !report.failures.is_empty() {
                    write!(f, ", {} failed", report.failures.len())?;
                }
                let unrestored = report
                    .failures
                    .iter()
                    .filter(|fail| fail.reason.is_unrestored())
                    .count();
                if unrestored > 0 {
                    write!(f, " ({unrestored} left unrestored)")?;
                }
                Ok(())
            }
        }
    }
}

/// Executes one command against `cluster`.
pub fn execute(cluster: &Cluster, command: &Command) -> Result<Outcome, ClusterError> {
    match command {
        Command::Get { replica, key } => cluster.get(replica, key).map(Outcome::Get),
        Command::Set {
            replica,
            key,
            grade,
        } => cluster.set(replica, key, grade).map(|outcome| Outcome::Set {
            grade: grade.clone(),
            outcome,
        }),
        Command::Merge { target, source } => cluster.merge(target, source).map(Outcome::Merge),
    }
}

/// One executed script line.
#[derive(Debug)]
pub struct Step<'a> {
    pub line: &'a ScriptLine,
    pub result: Result<Outcome, ClusterError>,
}

impl Display for Step<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Ok(outcome) => write!(f, "{} -> {outcome}", self.line.command),
            Err(err) => write!(f, "{} -> error: {err}", self.line.command),
        }
    }
}

/// Counts for a finished script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptSummary {
    pub executed: usize,
    pub failed: usize,
}

/// Runs parsed scripts against a cluster.
pub struct ScriptRunner<'a> {
    cluster: &'a Cluster,
    pacing: Duration,
}

impl<'a> ScriptRunner<'a> {
    pub fn new(cluster: &'a Cluster) -> Self {
        Self {
            cluster,
            pacing: Duration::ZERO,
        }
    }

    /// Pause between consecutive commands, so each gets a distinct wall-clock
    /// timestamp when replicas run on separate hosts.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Executes `script` in order, handing each step to `on_step`.
    ///
    /// A failing command is reported and the script continues.
    pub fn run(&self, script: &[ScriptLine], mut on_step: impl FnMut(&Step<'_>)) -> ScriptSummary {
        let mut summary = ScriptSummary::default();
        for (i, line) in script.iter().enumerate() {
            if i > 0 && !self.pacing.is_zero() {
                std::thread::sleep(self.pacing);
            }

            let step = Step {
                line,
                result: execute(self.cluster, &line.command),
            };
            summary.executed += 1;
            if let Err(err) = &step.result {
                summary.failed += 1;
                tracing::warn!(line = line.line, command = %line.command, error = %err, "script command failed");
            }
            on_step(&step);
        }

        tracing::info!(
            executed = summary.executed,
            failed = summary.failed,
            "script finished"
        );
        summary
    }
}
