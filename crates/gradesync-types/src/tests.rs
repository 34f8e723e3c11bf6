use std::time::Duration;

use proptest::prelude::*;
use test_case::test_case;

use super::*;

fn key(student: &str, course: &str) -> GradeKey {
    GradeKey::parse(student, course).unwrap()
}

#[test]
fn identifiers_are_trimmed() {
    let student = StudentId::new("  SID103 ").unwrap();
    assert_eq!(student.as_str(), "SID103");
}

#[test_case("" ; "empty")]
#[test_case("   " ; "whitespace only")]
fn empty_identifiers_are_rejected(raw: &str) {
    assert_eq!(
        CourseId::new(raw),
        Err(TypesError::Empty { kind: "course id" })
    );
}

#[test_case("A,B", ',' ; "comma")]
#[test_case("A(", '(' ; "open paren")]
#[test_case("B)", ')' ; "close paren")]
#[test_case("A\nB", '\n' ; "newline")]
fn forbidden_characters_are_rejected(raw: &str, ch: char) {
    match Grade::new(raw) {
        Err(TypesError::ForbiddenCharacter { ch: found, .. }) => assert_eq!(found, ch),
        other => panic!("expected forbidden character error, got {other:?}"),
    }
}

#[test]
fn replica_names_normalize_to_upper_case() {
    let name = ReplicaName::new("mongo").unwrap();
    assert_eq!(name.as_str(), "MONGO");
    assert_eq!(name, ReplicaName::new("MONGO").unwrap());
}

#[test]
fn replica_names_reject_dots_and_spaces() {
    assert!(ReplicaName::new("HI VE").is_err());
    assert!(ReplicaName::new("HIVE.SET").is_err());
}

#[test]
fn grade_key_display() {
    assert_eq!(key("SID1", "CSE016").to_string(), "(SID1, CSE016)");
}

#[test]
fn validated_types_reject_bad_json() {
    let bad: Result<Grade, _> = serde_json::from_str("\"A,B\"");
    assert!(bad.is_err());

    let good: Grade = serde_json::from_str("\" B+ \"").unwrap();
    assert_eq!(good.as_str(), "B+");
}

#[test]
fn timestamp_display_pads_nanoseconds() {
    let ts = Timestamp::from_nanos(1_500_000_042);
    assert_eq!(ts.to_string(), "1.500000042");
    assert_eq!(ts.as_secs(), 1);
    assert_eq!(ts.subsec_nanos(), 500_000_042);
}

#[test]
fn timestamp_after_is_strictly_increasing() {
    let last = Timestamp::from_nanos(100);
    assert_eq!(Timestamp::from_nanos(50).after(Some(last)), Timestamp::from_nanos(101));
    assert_eq!(Timestamp::from_nanos(100).after(Some(last)), Timestamp::from_nanos(101));
    assert_eq!(Timestamp::from_nanos(200).after(Some(last)), Timestamp::from_nanos(200));
    assert_eq!(Timestamp::from_nanos(7).after(None), Timestamp::from_nanos(7));
}

#[test]
fn deadline_none_never_expires() {
    let deadline = Deadline::none();
    assert!(!deadline.is_expired());
    assert_eq!(deadline.remaining(), None);
}

#[test]
fn zero_budget_deadline_is_expired() {
    let deadline = Deadline::after(Duration::ZERO);
    assert!(deadline.is_expired());
    assert_eq!(deadline.remaining(), Some(Duration::ZERO));
}

#[test]
fn generous_deadline_is_not_expired() {
    assert!(!Deadline::after(Duration::from_secs(3600)).is_expired());
}

#[test_case("GET", OperationKind::Get ; "upper get")]
#[test_case("set", OperationKind::Set ; "lower set")]
#[test_case(" Set ", OperationKind::Set ; "padded")]
fn operation_kind_parses(raw: &str, expected: OperationKind) {
    assert_eq!(raw.parse::<OperationKind>().unwrap(), expected);
}

#[test]
fn unknown_operation_is_rejected() {
    assert_eq!(
        "DELETE".parse::<OperationKind>(),
        Err(TypesError::UnknownOperation("DELETE".to_string()))
    );
}

#[test]
fn origin_tags_parse_back() {
    let merged = Origin::Merged {
        source: ReplicaName::new("sql").unwrap(),
    };
    assert_eq!(merged.to_tag(), "merge:SQL");
    assert_eq!(Origin::from_tag("merge:SQL").unwrap(), merged);
    assert_eq!(Origin::from_tag("local").unwrap(), Origin::Local);
    assert_eq!(Origin::from_tag("").unwrap(), Origin::Local);
    assert!(Origin::from_tag("elsewhere").is_err());
}

#[test]
fn get_entries_carry_the_sentinel() {
    let entry = OplogEntry::get(Timestamp::from_nanos(1), key("S", "C"));
    assert_eq!(entry.kind(), OperationKind::Get);
    assert_eq!(entry.new_grade(), None);
    assert_eq!(entry.grade_column(), GET_SENTINEL);
}

#[test]
fn set_filter_drops_get_entries() {
    let get = OplogEntry::get(Timestamp::from_nanos(1), key("S", "C"));
    let set = OplogEntry::set(Timestamp::from_nanos(2), key("S", "C"), Grade::new("A").unwrap());
    let merged = OplogEntry::merged(
        Timestamp::from_nanos(3),
        key("S", "C"),
        Grade::new("B").unwrap(),
        ReplicaName::new("HIVE").unwrap(),
    );

    assert!(LogFilter::All.matches(&get));
    assert!(!LogFilter::Sets.matches(&get));
    assert!(LogFilter::Sets.matches(&set));
    assert!(LogFilter::Sets.matches(&merged));
}

proptest! {
    #[test]
    fn after_never_returns_a_value_at_or_below_last(now in any::<u64>(), last in 0u64..u64::MAX) {
        let ts = Timestamp::from_nanos(now).after(Some(Timestamp::from_nanos(last)));
        prop_assert!(ts > Timestamp::from_nanos(last));
        prop_assert!(ts >= Timestamp::from_nanos(now));
    }

    #[test]
    fn valid_identifiers_survive_json(raw in "[A-Za-z0-9+-]{1,12}") {
        let student = StudentId::new(&raw).unwrap();
        let json = serde_json::to_string(&student).unwrap();
        let back: StudentId = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, student);
    }
}
