//! # gradesync-kernel: Reconciliation core of `gradesync`
//!
//! The kernel owns the two pieces of logic every deployment shares: the
//! replica adapter that turns GET/SET into a store mutation plus an oplog
//! entry, and the last-writer-wins merge that pulls another replica's oplog
//! and applies the newer writes.
//!
//! ## Key Principles
//!
//! - **Mutate, then log**: a write's oplog entry is appended only after the
//!   store accepted the new grade. If the append fails, the old grade is put
//!   back and the failure is reported.
//! - **Pull only**: a merge reads the source and writes the target, never the
//!   reverse.
//! - **Local wins ties**: a remote write replaces a local one only if its
//!   timestamp is strictly newer.
//! - **Injected time**: replicas read time through [`Clock`], so tests control
//!   every timestamp.
//!
//! ## Architecture
//!
//! - [`clock`]: time sources ([`SystemClock`], [`ManualClock`])
//! - [`replica`]: the [`Replica`] adapter
//! - [`lww`]: per-key latest-write reduction of an oplog
//! - [`merge`]: fetch and reconcile steps, and [`MergeReport`]
//!
//! ## Example
//!
//! ```ignore
//! use gradesync_kernel::{Replica, SystemClock, merge};
//! use gradesync_store::MemoryStore;
//!
//! let mut hive = Replica::new("HIVE".parse()?, MemoryStore::new(), SystemClock)?;
//! let sql = Replica::new("SQL".parse()?, MemoryStore::new(), SystemClock)?;
//!
//! let report = merge::merge(&mut hive, &sql, Deadline::none())?;
//! println!("{} merged", report.merged);
//! ```

pub mod clock;
pub mod error;
pub mod lww;
pub mod merge;
pub mod replica;


pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{MergeError, ReplicaError};
pub use lww::{LatestWrite, LatestWrites};
pub use merge::{ApplyFailure, ApplyFailureReason, MergeReport};
pub use replica::{Replica, SetOutcome};
