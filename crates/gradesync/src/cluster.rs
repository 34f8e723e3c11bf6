//! The command dispatcher: replica names to replicas.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use gradesync_config::GradesyncConfig;
use gradesync_kernel::merge::{fetch_source, reconcile};
use gradesync_kernel::{MergeError, MergeReport, Replica, ReplicaError, SetOutcome, SystemClock};
use gradesync_store::{Backend, ReplicaStore};
use gradesync_types::{
    BackendKind, Deadline, Grade, GradeKey, GradeRecord, LogFilter, OplogEntry, ReplicaName,
};

use crate::error::{ClusterError, Result};

/// Default budget for fetching a merge source's oplog.
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

struct Slot {
    name: ReplicaName,
    kind: BackendKind,
    replica: Mutex<Replica<Backend, SystemClock>>,
}

/// A set of named replicas and the operations routed to them.
///
/// Each replica sits behind its own lock. A merge holds the source lock only
/// while fetching and the target lock only while applying, never both.
///
/// # Example
///
/// ```ignore
/// use gradesync::{Cluster, GradesyncConfig};
///
/// let cluster = Cluster::open(&GradesyncConfig::load()?)?;
/// let hive = "HIVE".parse()?;
/// let key = GradeKey::parse("SID1033", "CSE016")?;
///
/// cluster.set(&hive, &key, &"A".parse()?)?;
/// let report = cluster.merge(&"SQL".parse()?, &hive)?;
/// ```
pub struct Cluster {
    slots: Vec<Slot>,
    fetch_timeout: Duration,
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field(
                "replicas",
                &self
                    .slots
                    .iter()
                    .map(|s| (s.name.as_str(), s.kind))
                    .collect::<Vec<_>>(),
            )
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

impl Cluster {
    /// Opens every replica named in `config`.
    pub fn open(config: &GradesyncConfig) -> Result<Self> {
        let mut replicas = Vec::with_capacity(config.replicas.len());
        for replica_config in &config.replicas {
            let name = replica_config.name.clone();
            let path = config.replica_path(replica_config);
            let backend = Backend::open(replica_config.backend, &path)?;
            let replica = Replica::new(name.clone(), backend, SystemClock)
                .map_err(|source| ClusterError::Open {
                    replica: name,
                    source,
                })?;
            replicas.push(replica);
        }

        let cluster = Self::from_replicas(replicas)?.with_fetch_timeout(config.fetch_timeout());
        tracing::info!(
            project = %config.project.name,
            replicas = cluster.slots.len(),
            "cluster opened"
        );
        Ok(cluster)
    }

    /// Builds a cluster from already opened replicas.
    pub fn from_replicas(
        replicas: impl IntoIterator<Item = Replica<Backend, SystemClock>>,
    ) -> Result<Self> {
        let mut slots: Vec<Slot> = Vec::new();
        for replica in replicas {
            let name = replica.name().clone();
            if slots.iter().any(|s| s.name == name) {
                return Err(ClusterError::DuplicateReplica(name));
            }
            slots.push(Slot {
                name,
                kind: replica.store().kind(),
                replica: Mutex::new(replica),
            });
        }
        if slots.is_empty() {
            return Err(ClusterError::Empty);
        }

        Ok(Self {
            slots,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        })
    }

    /// Sets the budget for fetching a merge source's oplog.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn backend_kind(&self, replica: &ReplicaName) -> Result<BackendKind> {
        Ok(self.slot(replica)?.kind)
    }

    /// Reads a grade. `Ok(None)` means the record does not exist.
    pub fn get(&self, replica: &ReplicaName, key: &GradeKey) -> Result<Option<Grade>> {
        let mut guard = self.lock(replica)?;
        guard.get(key).map_err(|source| replica_error(replica, source))
    }

    /// Updates an existing grade.
    pub fn set(&self, replica: &ReplicaName, key: &GradeKey, grade: &Grade) -> Result<SetOutcome> {
        let mut guard = self.lock(replica)?;
        guard
            .set(key, grade)
            .map_err(|source| replica_error(replica, source))
    }

    /// Pulls `source` into `target`.
    pub fn merge(&self, target: &ReplicaName, source: &ReplicaName) -> Result<MergeReport> {
        if target == source {
            return Err(MergeError::SelfMerge(target.clone()).into());
        }
        // Resolve both names before locking anything.
        self.slot(target)?;
        self.slot(source)?;

        let remote = {
            let guard = self.lock(source)?;
            fetch_source(&*guard, Deadline::after(self.fetch_timeout))?
        };

        let mut guard = self.lock(target)?;
        Ok(reconcile(&mut *guard, source, remote)?)
    }

    /// Loads the same records into every replica, clearing their oplogs.
    pub fn bootstrap(&self, records: &[GradeRecord]) -> Result<()> {
        for slot in &self.slots {
            let mut guard = self.lock(&slot.name)?;
            guard
                .bootstrap(records)
                .map_err(|source| replica_error(&slot.name, source))?;
        }
        Ok(())
    }

    /// Scans a replica's oplog.
    pub fn oplog(&self, replica: &ReplicaName, filter: LogFilter) -> Result<Vec<OplogEntry>> {
        let guard = self.lock(replica)?;
        guard
            .oplog(filter, Deadline::none())
            .map_err(|source| replica_error(replica, source))
    }

    /// Every record of a replica, ordered by key.
    pub fn records(&self, replica: &ReplicaName) -> Result<Vec<GradeRecord>> {
        let guard = self.lock(replica)?;
        guard
            .records()
            .map_err(|source| replica_error(replica, source))
    }

    /// Runs `f` with exclusive access to one replica.
    pub fn with_replica<T>(
        &self,
        replica: &ReplicaName,
        f: impl FnOnce(&mut Replica<Backend, SystemClock>) -> T,
    ) -> Result<T> {
        let mut guard = self.lock(replica)?;
        Ok(f(&mut guard))
    }

    fn slot(&self, replica: &ReplicaName) -> Result<&Slot> {
        self.slots
            .iter()
            .find(|s| &s.name == replica)
            .ok_or_else(|| ClusterError::UnknownReplica(replica.clone()))
    }

    fn lock(&self, replica: &ReplicaName) -> Result<MutexGuard<'_, Replica<Backend, SystemClock>>> {
        self.slot(replica)?
            .replica
            .lock()
            .map_err(|_| ClusterError::LockPoisoned(replica.clone()))
    }
}

fn replica_error(replica: &ReplicaName, source: ReplicaError) -> ClusterError {
    ClusterError::Replica {
        replica: replica.clone(),
        source,
    }
}
