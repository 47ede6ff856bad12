//! Integration tests for the edgelab binary surface.
//!
//! Only paths that finish without a bundler or runtime installed are exercised
//! here: help output, fatal configuration errors, and the sessions listing.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::net::TcpListener;
use tempfile::TempDir;

fn edgelab() -> Command {
    let mut cmd = Command::cargo_bin("edgelab").unwrap();
    cmd.env_remove("RUST_LOG").env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_help_lists_commands() {
    edgelab()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("dev"))
        .stdout(predicate::str::contains("sessions"));
}

#[test]
fn test_dev_help_lists_flags() {
    edgelab()
        .args(["dev", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--local-upstream"))
        .stdout(predicate::str::contains("--refresh-command"))
        .stdout(predicate::str::contains("--minify"));
}

#[test]
fn test_invalid_local_upstream_exits_with_error() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("src")).unwrap();
    fs::write(temp.path().join("src/index.js"), "export default {};").unwrap();

    edgelab()
        .arg("dev")
        .arg("src/index.js")
        .args(["--local-upstream", "ftp://example.com"])
        .arg("--cwd")
        .arg(temp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("dev.localUpstream"));

    // Nothing was allocated
    assert!(!temp.path().join(".dev/sessions.json").exists());
}

#[test]
fn test_missing_entry_exits_with_error() {
    let temp = TempDir::new().unwrap();

    edgelab()
        .arg("dev")
        .arg("--cwd")
        .arg(temp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("entry"));
}

#[test]
fn test_nonexistent_entry_exits_with_error() {
    let temp = TempDir::new().unwrap();

    edgelab()
        .args(["dev", "src/missing.js"])
        .arg("--cwd")
        .arg(temp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Entry point does not exist"));
}

#[test]
fn test_sessions_in_empty_project() {
    let temp = TempDir::new().unwrap();

    edgelab()
        .arg("sessions")
        .arg("--cwd")
        .arg(temp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("No dev sessions"));
}

#[test]
fn test_sessions_json_marks_live_and_stale_rows() {
    let temp = TempDir::new().unwrap();
    let work_dir = temp.path().join(".dev");
    fs::create_dir_all(&work_dir).unwrap();

    let bound = TcpListener::bind("127.0.0.1:0").unwrap();
    let live_port = bound.local_addr().unwrap().port();
    let stale_port = {
        let l = TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };

    let registry = serde_json::json!({
        "1700000000000": {
            "id": 1700000000000u64,
            "entry": temp.path().join("src/index.js"),
            "port": live_port,
            "minify": false,
            "startedAt": "2026-01-01T00:00:00Z"
        },
        "1700000000001": {
            "id": 1700000000001u64,
            "entry": temp.path().join("src/index.js"),
            "port": stale_port,
            "minify": true,
            "startedAt": "2026-01-01T00:00:01Z"
        }
    });
    fs::write(
        work_dir.join("sessions.json"),
        serde_json::to_string(&registry).unwrap(),
    )
    .unwrap();

    let output = edgelab()
        .args(["sessions", "--json"])
        .arg("--cwd")
        .arg(temp.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["port"], live_port);
    assert_eq!(rows[0]["live"], true);
    assert_eq!(rows[1]["port"], stale_port);
    assert_eq!(rows[1]["live"], false);

    // Listing never reaps
    let content = fs::read_to_string(work_dir.join("sessions.json")).unwrap();
    assert!(content.contains("1700000000001"));

    drop(bound);
}

#[test]
fn test_explicit_missing_config_file_fails() {
    let temp = TempDir::new().unwrap();

    edgelab()
        .args(["dev", "src/index.js", "--config", "nope.json"])
        .arg("--cwd")
        .arg(temp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("nope.json"));
}
