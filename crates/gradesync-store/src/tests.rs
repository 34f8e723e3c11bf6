use std::time::Duration;

use gradesync_types::{
    BackendKind, Deadline, Grade, GradeKey, GradeRecord, LogFilter, OplogEntry, Origin,
    ReplicaName, Timestamp,
};
use proptest::prelude::*;
use tempfile::TempDir;
use test_case::test_case;

use super::*;

fn key(student: &str, course: &str) -> GradeKey {
    GradeKey::parse(student, course).unwrap()
}

fn grade(value: &str) -> Grade {
    Grade::new(value).unwrap()
}

fn seed() -> Vec<GradeRecord> {
    vec![
        GradeRecord::new(key("SID1", "CSE016"), grade("A")),
        GradeRecord::new(key("SID2", "CSE016"), grade("B")),
    ]
}

fn open(kind: BackendKind, dir: &TempDir) -> Backend {
    Backend::open(kind, &dir.path().join(kind.as_str())).unwrap()
}

// ============================================================================
// Contract tests, run against every engine
// ============================================================================

#[test_case(BackendKind::Memory; "memory")]
#[test_case(BackendKind::Delimited; "delimited")]
#[test_case(BackendKind::Document; "document")]
#[test_case(BackendKind::Table; "table")]
fn upsert_never_inserts(kind: BackendKind) {
    let dir = TempDir::new().unwrap();
    let mut store = open(kind, &dir);
    store.load_snapshot(&seed()).unwrap();

    assert!(!store.upsert_if_exists(&key("SID9", "CSE016"), &grade("C")).unwrap());
    assert_eq!(store.lookup(&key("SID9", "CSE016")).unwrap(), None);
    assert_eq!(store.records().unwrap().len(), 2);

    assert!(store.upsert_if_exists(&key("SID1", "CSE016"), &grade("C")).unwrap());
    assert_eq!(store.lookup(&key("SID1", "CSE016")).unwrap(), Some(grade("C")));
}

#[test_case(BackendKind::Memory; "memory")]
#[test_case(BackendKind::Delimited; "delimited")]
#[test_case(BackendKind::Document; "document")]
#[test_case(BackendKind::Table; "table")]
fn scans_are_ordered_and_ties_keep_append_order(kind: BackendKind) {
    let dir = TempDir::new().unwrap();
    let mut store = open(kind, &dir);
    store.load_snapshot(&seed()).unwrap();

    let k = key("SID1", "CSE016");
    let late = OplogEntry::set(Timestamp::from_nanos(3_000), k.clone(), grade("C"));
    let tie_first = OplogEntry::set(Timestamp::from_nanos(1_000), k.clone(), grade("D"));
    let tie_second = OplogEntry::set(Timestamp::from_nanos(1_000), k.clone(), grade("E"));
    for entry in [&late, &tie_first, &tie_second] {
        store.append_log(entry).unwrap();
    }

    let scanned = store.scan_log(LogFilter::All, Deadline::none()).unwrap();
    assert_eq!(scanned, vec![tie_first, tie_second, late]);
}

#[test_case(BackendKind::Memory; "memory")]
#[test_case(BackendKind::Delimited; "delimited")]
#[test_case(BackendKind::Document; "document")]
#[test_case(BackendKind::Table; "table")]
fn sets_filter_drops_gets(kind: BackendKind) {
    let dir = TempDir::new().unwrap();
    let mut store = open(kind, &dir);
    store.load_snapshot(&seed()).unwrap();

    let k = key("SID2", "CSE016");
    store
        .append_log(&OplogEntry::get(Timestamp::from_nanos(1), k.clone()))
        .unwrap();
    let set = OplogEntry::merged(
        Timestamp::from_nanos(2),
        k.clone(),
        grade("A"),
        ReplicaName::new("sql").unwrap(),
    );
    store.append_log(&set).unwrap();

    assert_eq!(store.scan_log(LogFilter::All, Deadline::none()).unwrap().len(), 2);
    let sets = store.scan_log(LogFilter::Sets, Deadline::none()).unwrap();
    assert_eq!(sets, vec![set]);
    assert!(matches!(sets[0].origin, Origin::Merged { .. }));
}

#[test_case(BackendKind::Memory; "memory")]
#[test_case(BackendKind::Delimited; "delimited")]
#[test_case(BackendKind::Document; "document")]
#[test_case(BackendKind::Table; "table")]
fn snapshot_replaces_records_and_clears_log(kind: BackendKind) {
    let dir = TempDir::new().unwrap();
    let mut store = open(kind, &dir);
    store.load_snapshot(&seed()).unwrap();
    store
        .append_log(&OplogEntry::get(Timestamp::from_nanos(1), key("SID1", "CSE016")))
        .unwrap();

    let replacement = vec![GradeRecord::new(key("SID7", "MTH001"), grade("F"))];
    store.load_snapshot(&replacement).unwrap();

    assert_eq!(store.records().unwrap(), replacement);
    assert!(store.scan_log(LogFilter::All, Deadline::none()).unwrap().is_empty());
}

#[test_case(BackendKind::Delimited; "delimited")]
#[test_case(BackendKind::Document; "document")]
#[test_case(BackendKind::Table; "table")]
fn persistent_engines_survive_reopen(kind: BackendKind) {
    let dir = TempDir::new().unwrap();
    let entry = OplogEntry::set(
        Timestamp::from_nanos(1_714_000_000_123_456_789),
        key("SID1", "CSE016"),
        grade("C"),
    );
    {
        let mut store = open(kind, &dir);
        store.load_snapshot(&seed()).unwrap();
        store.upsert_if_exists(&entry.key, &grade("C")).unwrap();
        store.append_log(&entry).unwrap();
    }

    let store = open(kind, &dir);
    assert_eq!(store.kind(), kind);
    assert_eq!(store.lookup(&entry.key).unwrap(), Some(grade("C")));
    assert_eq!(store.lookup(&key("SID2", "CSE016")).unwrap(), Some(grade("B")));
    // Nanosecond precision must survive the round trip through storage.
    assert_eq!(
        store.scan_log(LogFilter::Sets, Deadline::none()).unwrap(),
        vec![entry]
    );
}

#[test_case(BackendKind::Memory; "memory")]
#[test_case(BackendKind::Delimited; "delimited")]
#[test_case(BackendKind::Document; "document")]
#[test_case(BackendKind::Table; "table")]
fn commit_set_updates_and_logs_together(kind: BackendKind) {
    let dir = TempDir::new().unwrap();
    let mut store = open(kind, &dir);
    store.load_snapshot(&seed()).unwrap();

    let absent = OplogEntry::set(Timestamp::from_nanos(1), key("SID9", "CSE016"), grade("C"));
    assert!(!store.commit_set(&absent.key, &grade("C"), &absent).unwrap());
    assert!(store.scan_log(LogFilter::All, Deadline::none()).unwrap().is_empty());

    let entry = OplogEntry::set(Timestamp::from_nanos(2), key("SID1", "CSE016"), grade("C"));
    assert!(store.commit_set(&entry.key, &grade("C"), &entry).unwrap());
    assert_eq!(store.lookup(&entry.key).unwrap(), Some(grade("C")));
    assert_eq!(
        store.scan_log(LogFilter::All, Deadline::none()).unwrap(),
        vec![entry]
    );
}

#[test_case(BackendKind::Memory; "memory")]
#[test_case(BackendKind::Delimited; "delimited")]
#[test_case(BackendKind::Document; "document")]
#[test_case(BackendKind::Table; "table")]
fn expired_deadline_fails_the_scan(kind: BackendKind) {
    let dir = TempDir::new().unwrap();
    let mut store = open(kind, &dir);
    store.load_snapshot(&seed()).unwrap();
    store
        .append_log(&OplogEntry::get(Timestamp::from_nanos(1), key("SID1", "CSE016")))
        .unwrap();

    let result = store.scan_log(LogFilter::All, Deadline::after(Duration::ZERO));
    assert!(matches!(result, Err(StoreError::DeadlineExceeded)));
}

// ============================================================================
// Memory fault injection
// ============================================================================

#[test]
fn memory_append_failure_is_reported() {
    let mut store = MemoryStore::with_records(seed());
    store.set_fail_appends(true);
    let result = store.append_log(&OplogEntry::get(Timestamp::EPOCH, key("SID1", "CSE016")));
    assert!(matches!(result, Err(StoreError::Unavailable(_))));
    assert_eq!(store.oplog_len(), 0);
}

#[test]
fn memory_slow_scan_misses_short_deadline() {
    let mut store = MemoryStore::with_records(seed());
    store.set_scan_delay(Some(Duration::from_millis(30)));
    let result = store.scan_log(LogFilter::All, Deadline::after(Duration::from_millis(5)));
    assert!(matches!(result, Err(StoreError::DeadlineExceeded)));
}

#[test]
fn memory_upsert_budget_runs_out() {
    let mut store = MemoryStore::with_records(seed());
    store.set_upsert_budget(Some(1));
    assert!(store.upsert_if_exists(&key("SID1", "CSE016"), &grade("C")).unwrap());
    let result = store.upsert_if_exists(&key("SID1", "CSE016"), &grade("D"));
    assert!(matches!(result, Err(StoreError::Unavailable(_))));
    assert_eq!(store.lookup(&key("SID1", "CSE016")).unwrap(), Some(grade("C")));

    store.set_upsert_budget(None);
    assert!(store.upsert_if_exists(&key("SID1", "CSE016"), &grade("D")).unwrap());
}

#[test]
fn memory_commit_set_keeps_new_grade_when_log_fails() {
    let mut store = MemoryStore::with_records(seed());
    store.set_fail_appends(true);
    let entry = OplogEntry::set(Timestamp::from_nanos(1), key("SID1", "CSE016"), grade("C"));

    let result = store.commit_set(&entry.key, &grade("C"), &entry);
    assert!(matches!(result, Err(CommitError::Log(StoreError::Unavailable(_)))));
    // The default commit updates first, so restoring is the caller's job.
    assert_eq!(store.lookup(&entry.key).unwrap(), Some(grade("C")));
    assert_eq!(store.oplog_len(), 0);
}

// ============================================================================
// Table commits
// ============================================================================

#[test]
fn table_commit_set_persists_grade_and_log_in_one_write() {
    let dir = TempDir::new().unwrap();
    let entry = OplogEntry::set(Timestamp::from_nanos(5), key("SID2", "CSE016"), grade("A"));
    {
        let mut store = open(BackendKind::Table, &dir);
        store.load_snapshot(&seed()).unwrap();
        assert!(store.commit_set(&entry.key, &grade("A"), &entry).unwrap());
    }

    let store = open(BackendKind::Table, &dir);
    assert_eq!(store.lookup(&entry.key).unwrap(), Some(grade("A")));
    assert_eq!(
        store.scan_log(LogFilter::All, Deadline::none()).unwrap(),
        vec![entry]
    );
}

#[test]
fn table_commit_set_failure_leaves_nothing_behind() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sql");
    let entry = OplogEntry::set(Timestamp::from_nanos(5), key("SID2", "CSE016"), grade("A"));
    {
        let mut store = TableStore::open(&path).unwrap();
        store.load_snapshot(&seed()).unwrap();
        // A directory squatting on the temp file name makes the commit fail.
        std::fs::create_dir(path.join("tables.tmp")).unwrap();

        let result = store.commit_set(&entry.key, &grade("A"), &entry);
        assert!(matches!(result, Err(CommitError::Log(StoreError::Io { .. }))));
        assert_eq!(store.lookup(&entry.key).unwrap(), Some(grade("B")));
        assert!(store.scan_log(LogFilter::All, Deadline::none()).unwrap().is_empty());
    }

    let store = TableStore::open(&path).unwrap();
    assert_eq!(store.lookup(&entry.key).unwrap(), Some(grade("B")));
    assert!(store.scan_log(LogFilter::All, Deadline::none()).unwrap().is_empty());
}

#[test]
fn table_store_rejects_corrupt_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sql");
    std::fs::create_dir_all(&path).unwrap();
    std::fs::write(path.join("tables.json"), "{ not json").unwrap();
    assert!(matches!(
        TableStore::open(&path),
        Err(StoreError::Corrupt { .. })
    ));
}

// ============================================================================
// Torn log tails
// ============================================================================

#[test]
fn delimited_open_discards_torn_oplog_line() {
    let dir = TempDir::new().unwrap();
    let entry = OplogEntry::set(Timestamp::from_nanos(7), key("SID1", "CSE016"), grade("C"));
    {
        let mut store = open(BackendKind::Delimited, &dir);
        store.load_snapshot(&seed()).unwrap();
        store.append_log(&entry).unwrap();
    }
    let oplog = dir.path().join("delimited").join("oplogs.csv");
    let mut text = std::fs::read_to_string(&oplog).unwrap();
    text.push_str("2024-04-24 23:06:40.12,SET,SI");
    std::fs::write(&oplog, text).unwrap();

    let mut store = open(BackendKind::Delimited, &dir);
    assert_eq!(
        store.scan_log(LogFilter::All, Deadline::none()).unwrap(),
        vec![entry.clone()]
    );

    let next = OplogEntry::get(Timestamp::from_nanos(8), key("SID2", "CSE016"));
    store.append_log(&next).unwrap();
    assert_eq!(
        store.scan_log(LogFilter::All, Deadline::none()).unwrap(),
        vec![entry, next]
    );
}

#[test]
fn delimited_open_keeps_complete_unterminated_line() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("delimited");
    std::fs::create_dir_all(&path).unwrap();
    std::fs::write(
        path.join("oplogs.csv"),
        "log_timestamp,operation,student-ID,course-id,new_grade\n\
         2024-04-24 23:06:40.123,SET,SID1,CSE016,B",
    )
    .unwrap();

    let mut store = DelimitedStore::open(&path).unwrap();
    store
        .append_log(&OplogEntry::get(Timestamp::from_nanos(1), key("SID2", "CSE016")))
        .unwrap();
    assert_eq!(store.scan_log(LogFilter::All, Deadline::none()).unwrap().len(), 2);
}

#[test]
fn document_open_discards_torn_oplog_line() {
    let dir = TempDir::new().unwrap();
    let entry = OplogEntry::set(Timestamp::from_nanos(7), key("SID1", "CSE016"), grade("C"));
    {
        let mut store = open(BackendKind::Document, &dir);
        store.load_snapshot(&seed()).unwrap();
        store.append_log(&entry).unwrap();
    }
    let oplog = dir.path().join("document").join("oplogs.jsonl");
    let mut text = std::fs::read_to_string(&oplog).unwrap();
    text.push_str(r#"{"timestamp":"2024-04-24T23:06"#);
    std::fs::write(&oplog, text).unwrap();

    let store = open(BackendKind::Document, &dir);
    assert_eq!(
        store.scan_log(LogFilter::All, Deadline::none()).unwrap(),
        vec![entry]
    );
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    #[test]
    fn scan_output_is_sorted(stamps in prop::collection::vec(0u64..50, 0..40)) {
        let mut store = MemoryStore::with_records(seed());
        for (i, nanos) in stamps.iter().enumerate() {
            let value = grade(&format!("G{i}"));
            store
                .append_log(&OplogEntry::set(Timestamp::from_nanos(*nanos), key("SID1", "CSE016"), value))
                .unwrap();
        }
        let scanned = store.scan_log(LogFilter::Sets, Deadline::none()).unwrap();
        prop_assert_eq!(scanned.len(), stamps.len());
        for pair in scanned.windows(2) {
            prop_assert!(pair[0].timestamp <= pair[1].timestamp);
            if pair[0].timestamp == pair[1].timestamp {
                // Grades are numbered in append order.
                let a: usize = pair[0].grade_column()[1..].parse().unwrap();
                let b: usize = pair[1].grade_column()[1..].parse().unwrap();
                prop_assert!(a < b);
            }
        }
    }

    #[test]
    fn text_timestamps_keep_nanoseconds(nanos in 0u64..4_000_000_000_000_000_000) {
        let ts = Timestamp::from_nanos(nanos);
        prop_assert_eq!(parse_text_timestamp(&format_text_timestamp(ts)).unwrap(), ts);
    }
}
