//! Latest-write tables.
//!
//! A latest-write table reduces an oplog to the newest SET per key. Both
//! sides of a merge are reduced the same way before they are compared.

use std::collections::BTreeMap;

use gradesync_types::{Grade, GradeKey, OplogEntry, Timestamp};

/// The newest SET seen for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestWrite {
    pub timestamp: Timestamp,
    pub grade: Grade,
}

/// Newest SET per key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatestWrites {
    table: BTreeMap<GradeKey, LatestWrite>,
}

impl LatestWrites {
    /// Reduces `entries` to the newest SET per key. GET entries are skipped.
    ///
    /// An entry replaces the current winner only if strictly newer, so among
    /// equal timestamps the first one seen stays.
    pub fn from_entries(entries: impl IntoIterator<Item = OplogEntry>) -> Self {
        let mut table: BTreeMap<GradeKey, LatestWrite> = BTreeMap::new();
        for entry in entries {
            let Some(grade) = entry.new_grade().cloned() else {
                continue;
            };
            match table.get(&entry.key) {
                Some(current) if entry.timestamp <= current.timestamp => {}
                _ => {
                    table.insert(
                        entry.key,
                        LatestWrite {
                            timestamp: entry.timestamp,
                            grade,
                        },
                    );
                }
            }
        }
        Self { table }
    }

    pub fn get(&self, key: &GradeKey) -> Option<&LatestWrite> {
        self.table.get(key)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Iterates keys in order.
    pub fn iter(&self) -> impl Iterator<Item = (&GradeKey, &LatestWrite)> {
        self.table.iter()
    }

    /// Whether a remote write at `remote` beats this table's entry for `key`.
    ///
    /// A key with no entry here always loses to the remote write.
    pub fn loses_to(&self, key: &GradeKey, remote: Timestamp) -> bool {
        self.table
            .get(key)
            .is_none_or(|local| remote > local.timestamp)
    }
}
