// crates/outbox-cli/tests/cli_commands.rs
// ============================================================================
// Module: CLI Command Tests
// Description: Integration tests for the `outbox` binary.
// Purpose: Verify exit codes and the stdout/stderr split.
// Dependencies: outbox-cli binary, serde_json, serde_yaml, tempfile
// ============================================================================

//! ## Overview
//! Runs the compiled binary against temporary directories and checks the
//! process status together with what it printed.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use serde_json::Value;
use tempfile::TempDir;

use crate::common::CliWorkspace;
use crate::common::SCHEMA;
use crate::common::duplicate_id_bundle;
use crate::common::feature_story_bundle;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Path of the compiled binary under test.
fn outbox_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_outbox"))
}

/// Runs the binary in `dir` with a clean token and log environment.
fn run_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(outbox_bin())
        .current_dir(dir)
        .env_remove("ADO_PAT")
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("run outbox")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn version_flag_prints_the_package_version() {
    let dir = TempDir::new().unwrap();
    let output = run_in(dir.path(), &["--version"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("outbox {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn lint_of_missing_contract_reports_and_exits_not_ready() {
    let dir = TempDir::new().unwrap();
    let output = run_in(dir.path(), &["contract", "lint"]);

    assert_eq!(output.status.code(), Some(2));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["strict_ready"], serde_json::Value::Bool(false));
    assert!(report["summary"]["errors"].as_u64().unwrap() > 0);
}

#[test]
fn lint_report_can_be_persisted() {
    let dir = TempDir::new().unwrap();
    let output = run_in(dir.path(), &["contract", "lint", "--out", "reports/lint.yaml", "--format", "yaml"]);

    assert_eq!(output.status.code(), Some(2));
    let persisted = std::fs::read_to_string(dir.path().join("reports/lint.yaml")).unwrap();
    let report: serde_yaml::Value = serde_yaml::from_str(&persisted).unwrap();
    assert_eq!(report["strict_ready"], serde_yaml::Value::Bool(false));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Lint report written to"), "unexpected stderr: {stderr}");
}

#[test]
fn validate_requires_a_bundle_or_all() {
    let dir = TempDir::new().unwrap();
    let output = run_in(dir.path(), &["validate"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Validation run failed"), "unexpected stderr: {stderr}");
}

#[test]
fn validate_with_missing_contract_fails_before_processing() {
    let dir = TempDir::new().unwrap();
    let output = run_in(dir.path(), &["validate", "--all"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
}

#[test]
fn live_write_without_token_is_rejected() {
    let dir = TempDir::new().unwrap();
    let output = run_in(
        dir.path(),
        &["write", "--all", "--org-url", "https://dev.azure.com/example-org", "--project", "P"],
    );

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ADO_PAT"), "unexpected stderr: {stderr}");
    assert!(!dir.path().join("outbox").exists());
}

// ============================================================================
// SECTION: Seeded Contract
// ============================================================================

#[test]
fn validate_of_passing_queue_exits_ready() {
    let workspace = CliWorkspace::new().unwrap();
    workspace.bundle("outbox/ready/plan.json", &feature_story_bundle("bundle-1")).unwrap();

    let output = run_in(workspace.path(), &["validate", "--all", "--schema", SCHEMA]);

    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["strict_ready"], Value::Bool(true));
    assert_eq!(report["passed_count"], Value::from(1));
    assert_eq!(workspace.names("outbox/validated"), vec!["plan.json"]);
}

#[test]
fn validate_of_failing_bundle_exits_not_ready() {
    let workspace = CliWorkspace::new().unwrap();
    let path = workspace.bundle("drafts/plan.json", &duplicate_id_bundle("bundle-1")).unwrap();

    let output = run_in(
        workspace.path(),
        &["validate", path.to_str().unwrap(), "--schema", SCHEMA],
    );

    assert_eq!(output.status.code(), Some(2), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["strict_ready"], Value::Bool(false));
    assert_eq!(report["failed_count"], Value::from(1));
    assert_eq!(report["results"][0]["result"], Value::from("failed"));
    assert_eq!(report["results"][0]["managed_by_outbox"], Value::Bool(false));
    assert!(path.exists());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("1 failed"), "unexpected stderr: {stderr}");
}

#[test]
fn dry_run_write_of_validated_bundle_exits_ready() {
    let workspace = CliWorkspace::new().unwrap();
    let path =
        workspace.bundle("outbox/validated/plan.json", &feature_story_bundle("bundle-1")).unwrap();

    let output = run_in(
        workspace.path(),
        &[
            "write",
            "--all",
            "--dry-run",
            "--org-url",
            "https://dev.azure.com/example-org",
            "--project",
            "Black Lagoon",
        ],
    );

    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["dry_run"], Value::Bool(true));
    assert_eq!(report["strict_ready"], Value::Bool(true));
    assert_eq!(report["summary"]["processed_count"], Value::from(1));
    assert_eq!(report["summary"]["succeeded_count"], Value::from(1));
    let methods: Vec<&str> = report["results"][0]["operations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|operation| operation["method"].as_str().unwrap())
        .collect();
    assert_eq!(methods, vec!["POST", "PATCH", "POST", "PATCH"]);
    assert!(path.exists());
    assert_eq!(workspace.names("outbox/audit").len(), 1);
    assert!(!workspace.path().join("outbox/_written_work_items.yaml").exists());
}
