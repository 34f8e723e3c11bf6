//! Integration tests for CLI commands.
//!
//! Each test works in its own project directory; replicas persist on disk
//! between invocations, so a flow of commands behaves like a real session.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const SNAPSHOT: &str = "student-ID,course-id,roll no,email ID,grade
SID1033,CSE016,1,sid1033@example.org,A
SID1034,CSE016,2,sid1034@example.org,B
SID1035,MTH001,3,sid1035@example.org,C
";

fn gradesync(project: &Path) -> Command {
    let mut cmd = Command::cargo_bin("gradesync").unwrap();
    cmd.env("NO_COLOR", "1")
        .arg("--project")
        .arg(project);
    cmd
}

/// Creates a project with every default replica bootstrapped from
/// [`SNAPSHOT`].
fn initialized_project() -> TempDir {
    let temp = TempDir::new().unwrap();
    let csv = temp.path().join("grades.csv");
    fs::write(&csv, SNAPSHOT).unwrap();

    gradesync(temp.path())
        .arg("init")
        .arg("--csv")
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded 3 records"));
    temp
}

fn get(project: &Path, replica: &str, student: &str, course: &str) -> String {
    let output = gradesync(project)
        .args(["get", replica, student, course])
        .output()
        .unwrap();
    assert!(output.status.success());
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

fn json(project: &Path, args: &[&str]) -> serde_json::Value {
    let output = gradesync(project).args(args).output().unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

// ============================================================================
// Init
// ============================================================================

#[test]
fn commands_require_an_initialized_project() {
    let temp = TempDir::new().unwrap();
    gradesync(temp.path())
        .args(["get", "HIVE", "SID1033", "CSE016"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn init_writes_config_and_replica_directories() {
    let temp = TempDir::new().unwrap();
    gradesync(temp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote gradesync.toml"));

    assert!(temp.path().join("gradesync.toml").exists());
    assert!(temp.path().join(".gitignore").exists());
    for replica in ["hive", "mongo", "sql"] {
        assert!(temp.path().join(".gradesync/data").join(replica).is_dir());
    }
}

#[test]
fn init_keeps_an_existing_config() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("gradesync.toml"),
        "[project]\nname = \"registrar\"\n",
    )
    .unwrap();

    gradesync(temp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));

    let config = fs::read_to_string(temp.path().join("gradesync.toml")).unwrap();
    assert!(config.contains("registrar"));
}

#[test]
fn init_fails_on_missing_snapshot() {
    let temp = TempDir::new().unwrap();
    gradesync(temp.path())
        .args(["init", "--csv", "does-not-exist.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist.csv"));
}

// ============================================================================
// Get / Set / Merge
// ============================================================================

#[test]
fn get_reads_the_bootstrapped_grade() {
    let project = initialized_project();
    assert_eq!(get(project.path(), "hive", "SID1033", "CSE016"), "A");
    assert_eq!(get(project.path(), "SQL", "SID1035", "MTH001"), "C");
}

#[test]
fn get_on_missing_record_prints_not_found() {
    let project = initialized_project();
    assert_eq!(get(project.path(), "MONGO", "SID9999", "CSE016"), "not found");
}

#[test]
fn get_on_unknown_replica_fails() {
    let project = initialized_project();
    gradesync(project.path())
        .args(["get", "ORACLE", "SID1033", "CSE016"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ORACLE"));
}

#[test]
fn set_on_missing_record_fails() {
    let project = initialized_project();
    gradesync(project.path())
        .args(["set", "HIVE", "SID9999", "CSE016", "A"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no record"));

    let log = json(project.path(), &["oplog", "HIVE", "--format", "json"]);
    assert_eq!(log.as_array().unwrap().len(), 0);
}

#[test]
fn set_then_merge_propagates_the_write() {
    let project = initialized_project();
    let path = project.path();

    gradesync(path)
        .args(["set", "HIVE", "SID1033", "CSE016", "A+"])
        .assert()
        .success();
    assert_eq!(get(path, "HIVE", "SID1033", "CSE016"), "A+");
    assert_eq!(get(path, "SQL", "SID1033", "CSE016"), "A");

    gradesync(path)
        .args(["merge", "SQL", "HIVE"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SQL <- HIVE: 1 merged"));
    assert_eq!(get(path, "SQL", "SID1033", "CSE016"), "A+");

    // SQL learned the write through HIVE; MONGO learns it through SQL.
    gradesync(path)
        .args(["merge", "MONGO", "SQL"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 merged"));
    assert_eq!(get(path, "MONGO", "SID1033", "CSE016"), "A+");

    // Nothing new the second time.
    gradesync(path)
        .args(["merge", "SQL", "HIVE"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 merged"));
}

#[test]
fn merge_into_itself_fails() {
    let project = initialized_project();
    gradesync(project.path())
        .args(["merge", "SQL", "sql"])
        .assert()
        .failure();
}

// ============================================================================
// Oplog / Records
// ============================================================================

#[test]
fn oplog_records_gets_and_sets() {
    let project = initialized_project();
    let path = project.path();

    get(path, "MONGO", "SID1034", "CSE016");
    gradesync(path)
        .args(["set", "MONGO", "SID1034", "CSE016", "B+"])
        .assert()
        .success();

    let all = json(path, &["oplog", "MONGO", "--format", "json"]);
    assert_eq!(all.as_array().unwrap().len(), 2);

    let sets = json(path, &["oplog", "MONGO", "--sets-only", "--format", "json"]);
    let sets = sets.as_array().unwrap();
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0]["key"]["student_id"], "SID1034");

    gradesync(path)
        .args(["oplog", "MONGO"])
        .assert()
        .success()
        .stdout(predicate::str::contains("B+"))
        .stdout(predicate::str::contains("(2 rows)"));
}

#[test]
fn records_lists_every_grade() {
    let project = initialized_project();
    let records = json(project.path(), &["records", "SQL", "--format", "json"]);
    assert_eq!(records.as_array().unwrap().len(), 3);

    gradesync(project.path())
        .args(["records", "SQL"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SID1035"))
        .stdout(predicate::str::contains("(3 rows)"));
}

// ============================================================================
// Run
// ============================================================================

#[test]
fn run_executes_a_script() {
    let project = initialized_project();
    let script = project.path().join("testcase.in");
    fs::write(
        &script,
        "# move one grade from SQL to HIVE\n\
         SQL.SET (( SID1033 , CSE016 ) , C )\n\
         HIVE.MERGE ( SQL )\n\
         HIVE.GET ( SID1033 , CSE016 )\n",
    )
    .unwrap();

    gradesync(project.path())
        .arg("run")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("SQL: SET (SID1033, CSE016) -> C"))
        .stdout(predicate::str::contains("HIVE: MERGE (SQL) -> 1 merged"))
        .stdout(predicate::str::contains("HIVE: GET (SID1033, CSE016) -> C"))
        .stdout(predicate::str::contains("3 commands executed"));
}

#[test]
fn run_reports_syntax_errors_before_executing() {
    let project = initialized_project();
    let script = project.path().join("broken.in");
    fs::write(
        &script,
        "SQL.SET (( SID1033 , CSE016 ) , C )\nSQL.DROP ( SID1033 )\n",
    )
    .unwrap();

    gradesync(project.path())
        .arg("run")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"));

    assert_eq!(get(project.path(), "SQL", "SID1033", "CSE016"), "A");
}

#[test]
fn run_fails_when_a_command_fails() {
    let project = initialized_project();
    let script = project.path().join("unknown.in");
    fs::write(&script, "ORACLE.GET ( SID1033 , CSE016 )\n").unwrap();

    gradesync(project.path())
        .arg("run")
        .arg(&script)
        .assert()
        .failure()
        .stdout(predicate::str::contains("1 failed"));
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn config_show_works_in_initialized_project() {
    let project = initialized_project();
    gradesync(project.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Replicas"))
        .stdout(predicate::str::contains("HIVE"));
}

#[test]
fn config_show_toml_and_json() {
    let project = initialized_project();
    gradesync(project.path())
        .args(["config", "show", "--format", "toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[merge]"));

    let config = json(project.path(), &["config", "show", "--format", "json"]);
    assert_eq!(config["merge"]["fetch_timeout_ms"], 5000);
    assert_eq!(config["replicas"].as_array().unwrap().len(), 3);
}

#[test]
fn environment_overrides_config_file() {
    let project = initialized_project();
    let output = gradesync(project.path())
        .env("GRADESYNC_MERGE__FETCH_TIMEOUT_MS", "250")
        .args(["config", "show", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let config: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config["merge"]["fetch_timeout_ms"], 250);
}

#[test]
fn merge_report_as_json() {
    let project = initialized_project();
    let path = project.path();
    gradesync(path)
        .args(["set", "SQL", "SID1035", "MTH001", "B"])
        .assert()
        .success();

    let report = json(path, &["merge", "HIVE", "SQL", "--format", "json"]);
    assert_eq!(report["source"], "SQL");
    assert_eq!(report["merged"], 1);
    assert_eq!(report["considered"], 1);
    assert_eq!(report["failures"].as_array().unwrap().len(), 0);
}
