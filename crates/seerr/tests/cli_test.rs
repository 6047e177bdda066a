//! Integration tests for the `seerr` CLI binary.
//!
//! Argument parsing, help output, shell completions and configuration
//! errors, all without a live instance.
#![allow(clippy::unwrap_used)]

use std::io::Write;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a command for the `seerr` binary with env isolation.
fn seerr_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("seerr");
    cmd.env("HOME", "/tmp/seerr-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/seerr-cli-test-nonexistent")
        .env_remove("SEERR_CONFIG")
        .env_remove("SEERR_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = seerr_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "Expected 'Usage' in output:\n{stderr}");
}

#[test]
fn test_help_lists_commands() {
    seerr_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("apply")
            .and(predicate::str::contains("dump-config"))
            .and(predicate::str::contains("completions")),
    );
}

#[test]
fn test_version_flag() {
    seerr_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("seerr"));
}

#[test]
fn test_apply_help_lists_flags() {
    seerr_cmd().args(["apply", "--help"]).assert().success().stdout(
        predicate::str::contains("--dry-run")
            .and(predicate::str::contains("--check-unmanaged"))
            .and(predicate::str::contains("--config")),
    );
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    seerr_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("seerr"));
}

#[test]
fn test_completions_invalid_shell() {
    seerr_cmd()
        .args(["completions", "cmd"])
        .assert()
        .failure()
        .code(2);
}

// ── Configuration errors ────────────────────────────────────────────

#[test]
fn test_apply_missing_config_file() {
    seerr_cmd()
        .args(["apply", "--config", "/tmp/seerr-cli-test-nonexistent/config.yaml"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
fn test_apply_invalid_settings() {
    let file = write_config("settings:\n  users:\n    default_permissions: [auto_request]\n");
    seerr_cmd()
        .args(["apply", "--config"])
        .arg(file.path())
        .assert()
        .code(4)
        .stderr(predicate::str::contains("AUTO_REQUEST"));
}

#[test]
fn test_apply_reports_missing_api_key() {
    let file = write_config("hostname: seerr-cli-test.invalid\n");
    seerr_cmd()
        .args(["apply", "--config"])
        .arg(file.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No API key configured"));
}

#[test]
fn test_apply_unreachable_instance() {
    let file = write_config("hostname: 127.0.0.1\nport: 9\napi_key: test-key\n");
    seerr_cmd()
        .args(["apply", "--timeout", "2", "--config"])
        .arg(file.path())
        .assert()
        .code(7);
}

#[test]
fn test_dump_config_rejects_bad_url() {
    seerr_cmd()
        .args(["dump-config", "not a url", "--api-key", "test-key"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid value for url"));
}
