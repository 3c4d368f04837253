//! CLI integration tests using assert_cmd.
//!
//! These tests invoke the actual `bmn-docgen` binary and verify its output.

use assert_cmd::Command;
use predicates::prelude::*;

#[allow(deprecated)]
fn relay_cmd() -> Command {
    Command::cargo_bin("bmn-docgen").expect("binary should exist")
}

#[test]
fn test_version_flag() {
    relay_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_help_flag() {
    relay_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("BMN document relay"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("submit"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("ping"))
        .stdout(predicate::str::contains("test-callback"));
}

#[test]
fn test_submit_help_shows_options() {
    relay_cmd()
        .args(["submit", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--category"))
        .stdout(predicate::str::contains("--job-id"))
        .stdout(predicate::str::contains("--field"))
        .stdout(predicate::str::contains("--form-json"))
        .stdout(predicate::str::contains("--wait"));
}

#[test]
fn test_serve_help() {
    relay_cmd()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--pipeline-url"))
        .stdout(predicate::str::contains("--public-base-url"));
}

#[test]
fn test_no_subcommand_shows_help() {
    relay_cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("BMN document relay"));
}

#[test]
fn test_status_without_relay_reports_connection_error() {
    // Port 9 (discard) is essentially never serving HTTP.
    relay_cmd()
        .args(["status", "psp_482913", "--port", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}
