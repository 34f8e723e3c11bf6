//! # gradesync-store: Replica stores for gradesync
//!
//! A replica is a record store (current grade per key) paired with an
//! append-only operation log. This crate defines the [`ReplicaStore`]
//! contract the reconciliation engine consumes, and the concrete engines
//! behind it:
//!
//! - **[`MemoryStore`]**: in-process tables with fault injection for tests
//! - **[`DelimitedStore`]**: comma-delimited text files, Hive-style
//! - **[`DocumentStore`]**: JSON documents, one per line, Mongo-style
//! - **[`TableStore`]**: both tables in one atomically replaced file, SQL-style
//!
//! [`Backend`] wraps all four in a tagged union so a deployment can mix
//! engines while the engine stays generic over one type.
//!
//! # Timestamps
//!
//! Each engine persists timestamps in its own native form (text, RFC 3339,
//! integer nanoseconds). All of them normalize to
//! [`gradesync_types::Timestamp`] on read; callers never see raw strings.
//!
//! # Concurrency
//!
//! Stores are not internally synchronized. Mutating methods take `&mut self`,
//! so a single owner serializes every mutate-then-log unit of work.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use gradesync_types::{BackendKind, Deadline, Grade, GradeKey, GradeRecord, LogFilter, OplogEntry};

mod backend;
mod delimited;
mod document;
mod error;
mod memory;
mod table;
mod timefmt;

pub use backend::Backend;
pub use delimited::DelimitedStore;
pub use document::DocumentStore;
pub use error::{CommitError, StoreError};
pub use memory::MemoryStore;
pub use table::TableStore;
pub use timefmt::{format_text_timestamp, parse_text_timestamp};

#[cfg(test)]
mod tests;

/// Contract between the reconciliation engine and a backing store.
///
/// Implementations must return oplog scans ordered by timestamp ascending,
/// preserving append order among equal timestamps.
pub trait ReplicaStore: Send {
    /// Engine kind, for logging and inspection.
    fn kind(&self) -> BackendKind;

    /// Reads the current grade for `key`.
    fn lookup(&self, key: &GradeKey) -> Result<Option<Grade>, StoreError>;

    /// Overwrites the grade for `key` if a record exists.
    ///
    /// Returns `false`, leaving the store untouched, when the key is absent.
    /// Never inserts.
    fn upsert_if_exists(&mut self, key: &GradeKey, grade: &Grade) -> Result<bool, StoreError>;

    /// Appends one entry to the operation log.
    fn append_log(&mut self, entry: &OplogEntry) -> Result<(), StoreError>;

    /// Overwrites the grade for `key` and logs `entry` as one unit of work.
    ///
    /// Returns `Ok(false)` without logging when the key is absent. The
    /// default body updates the record and then appends; on
    /// [`CommitError::Log`] the record already holds the new grade and the
    /// caller must restore it. Engines that can persist both in one write
    /// override this and leave nothing behind on failure.
    fn commit_set(
        &mut self,
        key: &GradeKey,
        grade: &Grade,
        entry: &OplogEntry,
    ) -> Result<bool, CommitError> {
        if !self.upsert_if_exists(key, grade).map_err(CommitError::Update)? {
            return Ok(false);
        }
        self.append_log(entry).map_err(CommitError::Log)?;
        Ok(true)
    }

    /// Returns every logged entry matching `filter`, timestamp ascending.
    ///
    /// Fails with [`StoreError::DeadlineExceeded`] if `deadline` expires
    /// before the scan completes. Partial results are never returned.
    fn scan_log(&self, filter: LogFilter, deadline: Deadline)
    -> Result<Vec<OplogEntry>, StoreError>;

    /// Replaces all records with `records` and clears the operation log.
    fn load_snapshot(&mut self, records: &[GradeRecord]) -> Result<(), StoreError>;

    /// Returns every record, ordered by key.
    fn records(&self) -> Result<Vec<GradeRecord>, StoreError>;
}

/// Fails if the scan's time budget is spent.
pub(crate) fn check_deadline(deadline: &Deadline) -> Result<(), StoreError> {
    if deadline.is_expired() {
        return Err(StoreError::DeadlineExceeded);
    }
    Ok(())
}

/// Orders scan output by timestamp. The sort is stable, so entries with equal
/// timestamps stay in append order.
pub(crate) fn order_by_timestamp(mut entries: Vec<OplogEntry>) -> Vec<OplogEntry> {
    entries.sort_by_key(|e| e.timestamp);
    entries
}

/// Replaces `path` with `contents` via a sibling temp file and a rename, so
/// readers see either the old file or the new one.
pub(crate) fn replace_file(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_data()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Appends `line` to `path`. A failed write is truncated back off, so the file
/// never ends in a partial line.
pub(crate) fn append_line(path: &Path, line: &[u8]) -> Result<(), StoreError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let len = file.metadata()?.len();
    if let Err(err) = file.write_all(line).and_then(|()| file.sync_data()) {
        if let Err(truncate) = file.set_len(len) {
            tracing::error!(
                path = %path.display(),
                error = %truncate,
                "failed to truncate partial oplog line"
            );
        }
        return Err(err.into());
    }
    Ok(())
}

/// Repairs a log file whose last line has no terminating newline.
///
/// A tail that `is_complete` accepts gets its newline; anything else is a
/// torn write and is cut off. Returns true if the file was changed.
pub(crate) fn repair_tail(
    path: &Path,
    is_complete: impl Fn(&str) -> bool,
) -> Result<bool, StoreError> {
    let bytes = fs::read(path)?;
    if bytes.is_empty() || bytes.ends_with(b"\n") {
        return Ok(false);
    }
    let keep = bytes.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
    let tail = String::from_utf8_lossy(&bytes[keep..]);

    let mut file = OpenOptions::new().append(true).open(path)?;
    if is_complete(tail.trim_end_matches('\r')) {
        file.write_all(b"\n")?;
        tracing::info!(path = %path.display(), "terminated unterminated oplog line");
    } else {
        file.set_len(keep as u64)?;
        tracing::warn!(
            path = %path.display(),
            bytes = bytes.len() - keep,
            "discarded torn oplog line"
        );
    }
    file.sync_data()?;
    Ok(true)
}
