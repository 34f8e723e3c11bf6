//! Tagged union over every store engine.

use std::path::Path;

use gradesync_types::{BackendKind, Deadline, Grade, GradeKey, GradeRecord, LogFilter, OplogEntry};

use crate::{
    CommitError, DelimitedStore, DocumentStore, MemoryStore, ReplicaStore, StoreError,
    TableStore,
};

/// A store of any supported kind.
///
/// Lets a single deployment mix engines while the replica adapter and the
/// reconciliation engine stay generic over one concrete type.
#[derive(Debug)]
pub enum Backend {
    Memory(MemoryStore),
    Delimited(DelimitedStore),
    Document(DocumentStore),
    Table(TableStore),
}

impl Backend {
    /// Opens a store of `kind` rooted at `dir`. `dir` is ignored for
    /// [`BackendKind::Memory`].
    pub fn open(kind: BackendKind, dir: &Path) -> Result<Self, StoreError> {
        Ok(match kind {
            BackendKind::Memory => Backend::Memory(MemoryStore::new()),
            BackendKind::Delimited => Backend::Delimited(DelimitedStore::open(dir)?),
            BackendKind::Document => Backend::Document(DocumentStore::open(dir)?),
            BackendKind::Table => Backend::Table(TableStore::open(dir)?),
        })
    }
}

macro_rules! dispatch {
    ($self:expr, $store:ident => $body:expr) => {
        match $self {
            Backend::Memory($store) => $body,
            Backend::Delimited($store) => $body,
            Backend::Document($store) => $body,
            Backend::Table($store) => $body,
        }
    };
}

impl ReplicaStore for Backend {
    fn kind(&self) -> BackendKind {
        dispatch!(self, s => s.kind())
    }

    fn lookup(&self, key: &GradeKey) -> Result<Option<Grade>, StoreError> {
        dispatch!(self, s => s.lookup(key))
    }

    fn upsert_if_exists(&mut self, key: &GradeKey, grade: &Grade) -> Result<bool, StoreError> {
        dispatch!(self, s => s.upsert_if_exists(key, grade))
    }

    fn append_log(&mut self, entry: &OplogEntry) -> Result<(), StoreError> {
        dispatch!(self, s => s.append_log(entry))
    }

    fn commit_set(
        &mut self,
        key: &GradeKey,
        grade: &Grade,
        entry: &OplogEntry,
    ) -> Result<bool, CommitError> {
        dispatch!(self, s => s.commit_set(key, grade, entry))
    }

    fn scan_log(
        &self,
        filter: LogFilter,
        deadline: Deadline,
    ) -> Result<Vec<OplogEntry>, StoreError> {
        dispatch!(self, s => s.scan_log(filter, deadline))
    }

    fn load_snapshot(&mut self, records: &[GradeRecord]) -> Result<(), StoreError> {
        dispatch!(self, s => s.load_snapshot(records))
    }

    fn records(&self) -> Result<Vec<GradeRecord>, StoreError> {
        dispatch!(self, s => s.records())
    }
}
