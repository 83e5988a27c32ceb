//! End-to-end CLI tests for the sds-finder binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command running inside `dir` with its store and database there too.
fn sds_finder(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("sds-finder").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("RUST_LOG")
        .arg("--sds-dir")
        .arg(dir.path().join("sds_files"))
        .arg("--database")
        .arg(dir.path().join("sds.db"));
    cmd
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let mut cmd = Command::cargo_bin("sds-finder").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("safety data sheets"));
}

/// Test that a missing subcommand is a usage error.
#[test]
fn test_binary_without_command_fails() {
    let mut cmd = Command::cargo_bin("sds-finder").unwrap();
    cmd.assert().failure().stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_classify_inclusive_boundary() {
    let dir = TempDir::new().unwrap();
    sds_finder(&dir)
        .args(["classify", "Category 3", "--flash-point", "140"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"nfpa_class\": \"Class II\""));

    sds_finder(&dir)
        .args(["classify", "Category 3", "--flash-point", "141"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Not classified"));
}

#[test]
fn test_sources_lists_default_priority_order() {
    let dir = TempDir::new().unwrap();
    sds_finder(&dir)
        .env_remove("SDS_SOURCE_ORDER")
        .arg("sources")
        .assert()
        .success()
        .stdout(predicate::str::contains("chemblink").and(predicate::str::contains("fluorochem")));
}

#[test]
fn test_status_of_unknown_identifier_exits_non_zero() {
    let dir = TempDir::new().unwrap();
    sds_finder(&dir)
        .args(["status", "67-64-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no stored document for 67-64-1"));
}

#[test]
fn test_stats_on_empty_store() {
    let dir = TempDir::new().unwrap();
    sds_finder(&dir)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"documents\": 0"));
}

#[test]
fn test_invalid_config_file_exits_non_zero() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("sds-finder.toml"), "pool_size = 0\n").unwrap();
    sds_finder(&dir)
        .env_remove("SDS_POOL_SIZE")
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("pool_size"));
}

#[test]
fn test_hazards_without_extraction_exits_non_zero() {
    let dir = TempDir::new().unwrap();
    sds_finder(&dir)
        .args(["hazards", "67-64-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no hazard record for 67-64-1"));
}

#[test]
fn test_classify_celsius_input() {
    let dir = TempDir::new().unwrap();
    sds_finder(&dir)
        .args(["classify", "Category 3", "--flash-point", "60", "--celsius"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"nfpa_class\": \"Class II\""));
}
