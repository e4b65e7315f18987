// crates/human-relay-cli/tests/config_commands.rs
// ============================================================================
// Module: CLI Config Command Tests
// Description: Integration tests for CLI config and version commands.
// Purpose: Ensure config validation reports success and fails closed on errors.
// Dependencies: human-relay-cli binary, human-relay-config
// ============================================================================

//! ## Overview
//! Runs the CLI binary for config validation, example output, and version
//! reporting. Invalid configuration must fail with a non-zero exit code.

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

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use human_relay_config::RelayConfig;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn human_relay_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_human-relay"))
}

fn run(args: &[&str], cwd: &Path) -> Output {
    Command::new(human_relay_bin())
        .args(args)
        .current_dir(cwd)
        .env_remove("HUMAN_RELAY_CONFIG")
        .env_remove("HUMAN_RELAY_ALLOW_NON_LOOPBACK")
        .output()
        .expect("run human-relay")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Verifies config validation succeeds for a loopback HTTP bind.
#[test]
fn cli_config_validate_accepts_valid_config() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config_path = dir.path().join("relay.toml");
    fs::write(&config_path, "[server]\ntransport = \"http\"\nbind = \"127.0.0.1:0\"\n")
        .expect("write config");

    let output =
        run(&["config", "validate", "--config", config_path.to_str().unwrap()], dir.path());
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("config ok"));
}

/// Verifies validation without a config file falls back to defaults.
#[test]
fn cli_config_validate_without_file_uses_defaults() {
    let dir = tempfile::tempdir().expect("temp dir");
    let output = run(&["config", "validate"], dir.path());
    assert!(output.status.success());
}

/// Verifies invalid configuration fails closed.
#[test]
fn cli_config_validate_rejects_invalid_config() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config_path = dir.path().join("relay.toml");
    fs::write(&config_path, "[broker]\ndeadline_secs = 0\n").expect("write config");

    let output =
        run(&["config", "validate", "--config", config_path.to_str().unwrap()], dir.path());
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("deadline"));
}

/// Verifies a missing explicit config file is an error.
#[test]
fn cli_config_validate_rejects_missing_explicit_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let output = run(&["config", "validate", "--config", "absent.toml"], dir.path());
    assert!(!output.status.success());
}

/// Verifies the example config parses back into the defaults.
#[test]
fn cli_config_example_round_trips_to_defaults() {
    let dir = tempfile::tempdir().expect("temp dir");
    let output = run(&["config", "example"], dir.path());
    assert!(output.status.success());
    let config = RelayConfig::from_bytes(&output.stdout).expect("example parses");
    assert_eq!(config, RelayConfig::default());
}

/// Verifies `--version` prints the package version.
#[test]
fn cli_version_reports_package_version() {
    let dir = tempfile::tempdir().expect("temp dir");
    let output = run(&["--version"], dir.path());
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

/// Verifies serve refuses an exposed operator bind without opt-in.
#[test]
fn cli_serve_refuses_exposed_operator_without_opt_in() {
    let dir = tempfile::tempdir().expect("temp dir");
    let output = run(&["serve", "--operator-bind", "0.0.0.0:0"], dir.path());
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--allow-non-loopback"));
}
