//! CLI contract tests: exit codes and output shape of the `vscrub` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use rusqlite::{Connection, params};
use std::fs;
use tempfile::TempDir;

fn seed_fixtures(tmp: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
    let db = tmp.path().join("state.vscdb");
    let conn = Connection::open(&db).unwrap();
    conn.execute_batch("CREATE TABLE ItemTable (key TEXT PRIMARY KEY, value BLOB)")
        .unwrap();
    for key in ["augment.one", "augment.two", "keep.me"] {
        conn.execute(
            "INSERT INTO ItemTable (key, value) VALUES (?1, ?2)",
            params![key, b"v".as_slice()],
        )
        .unwrap();
    }
    drop(conn);

    let storage = tmp.path().join("storage.json");
    fs::write(
        &storage,
        r#"{"machineId": "old", "telemetry": {"devDeviceId": "old"}}"#,
    )
    .unwrap();
    (db, storage)
}

fn vscrub() -> Command {
    Command::cargo_bin("vscrub").unwrap()
}

#[test]
fn clean_db_reports_removed_rows() {
    let tmp = TempDir::new().unwrap();
    let (db, storage) = seed_fixtures(&tmp);

    vscrub()
        .args(["clean-db", "--no-guard"])
        .arg("--db-path")
        .arg(&db)
        .arg("--storage-path")
        .arg(&storage)
        .assert()
        .success()
        .stdout(predicate::str::contains("clean-db: ok"))
        .stdout(predicate::str::contains("removed 2 row(s)"));
}

#[test]
fn modify_ids_prints_new_identifiers() {
    let tmp = TempDir::new().unwrap();
    let (db, storage) = seed_fixtures(&tmp);

    vscrub()
        .args(["modify-ids", "--no-guard"])
        .arg("--db-path")
        .arg(&db)
        .arg("--storage-path")
        .arg(&storage)
        .assert()
        .success()
        .stdout(predicate::str::contains("machineId:"))
        .stdout(predicate::str::contains("devDeviceId:"));
}

#[test]
fn run_all_json_reports_both_operations() {
    let tmp = TempDir::new().unwrap();
    let (db, storage) = seed_fixtures(&tmp);

    let output = vscrub()
        .args(["run-all", "--no-guard", "--json"])
        .arg("--db-path")
        .arg(&db)
        .arg("--storage-path")
        .arg(&storage)
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let reports = summary["reports"].as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["status"], "succeeded");
    assert_eq!(reports[1]["status"], "succeeded");
    assert_eq!(reports[0]["rows_removed"], 2);
    assert!(reports[1]["identity"]["machineId"].is_string());
}

#[test]
fn missing_database_exits_nonzero_with_abort_message() {
    let tmp = TempDir::new().unwrap();
    let (_, storage) = seed_fixtures(&tmp);
    let absent = tmp.path().join("absent.vscdb");

    vscrub()
        .args(["clean-db", "--no-guard"])
        .arg("--db-path")
        .arg(&absent)
        .arg("--storage-path")
        .arg(&storage)
        .assert()
        .failure()
        .stdout(predicate::str::contains("aborted"));
}

#[test]
fn custom_keyword_is_honored() {
    let tmp = TempDir::new().unwrap();
    let (db, storage) = seed_fixtures(&tmp);

    vscrub()
        .args(["clean-db", "--no-guard", "--keyword", "keep"])
        .arg("--db-path")
        .arg(&db)
        .arg("--storage-path")
        .arg(&storage)
        .assert()
        .success()
        .stdout(predicate::str::contains("removed 1 row(s)"));
}
