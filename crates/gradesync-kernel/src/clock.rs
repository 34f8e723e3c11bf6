//! Time sources for replicas.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use gradesync_types::Timestamp;

/// Source of wall-clock time for oplog timestamps.
///
/// The clock may stall or step backwards; [`crate::Replica`] enforces strict
/// monotonicity on top of it.
pub trait Clock: Send {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same time, so a test can keep a handle after moving the
/// clock into a replica.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ns: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now_ns: Arc::new(AtomicU64::new(start.as_nanos())),
        }
    }

    pub fn set(&self, ts: Timestamp) {
        self.now_ns.store(ts.as_nanos(), Ordering::SeqCst);
    }

    pub fn advance(&self, nanos: u64) {
        self.now_ns.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_nanos(self.now_ns.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(Timestamp::from_nanos(10));
        let handle = clock.clone();
        handle.advance(5);
        assert_eq!(clock.now(), Timestamp::from_nanos(15));
        handle.set(Timestamp::from_nanos(3));
        assert_eq!(clock.now(), Timestamp::from_nanos(3));
    }

    #[test]
    fn system_clock_is_after_epoch() {
        assert!(SystemClock.now() > Timestamp::EPOCH);
    }
}
