//! File loading tests for human-relay-config.
// crates/human-relay-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Exercise file loading limits and parse failures.
// Purpose: Ensure config files fail closed on malformed or oversized input.
// =============================================================================

use std::fs;
use std::path::PathBuf;

use human_relay_config::ConfigError;
use human_relay_config::RelayConfig;
use human_relay_config::ServerTransport;
use tempfile::TempDir;

mod common;

use common::TestResult;
use common::assert_invalid;

/// Writes `contents` into a fresh temp dir and returns both.
fn write_config(contents: &[u8]) -> Result<(TempDir, PathBuf), String> {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("human-relay.toml");
    fs::write(&path, contents).map_err(|err| err.to_string())?;
    Ok((dir, path))
}

#[test]
fn load_reads_explicit_file() -> TestResult {
    let (_dir, path) = write_config(
        br#"
[server]
transport = "http"
bind = "127.0.0.1:9000"

[broker]
deadline_secs = 30
"#,
    )?;
    let config = RelayConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    if config.server.transport != ServerTransport::Http {
        return Err("transport should be http".to_string());
    }
    if config.broker.deadline_secs != 30 {
        return Err("deadline should be 30".to_string());
    }
    if config.operator.bind != "127.0.0.1:5000" {
        return Err("operator section should fall back to defaults".to_string());
    }
    Ok(())
}

#[test]
fn load_missing_explicit_file_fails() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("missing.toml");
    match RelayConfig::load(Some(&path)) {
        Err(ConfigError::Io(_)) => Ok(()),
        other => Err(format!("expected io error, got {other:?}")),
    }
}

#[test]
fn unknown_keys_are_rejected() -> TestResult {
    let (_dir, path) = write_config(b"[broker]\ndeadline_seconds = 10\n")?;
    match RelayConfig::load(Some(&path)) {
        Err(ConfigError::Parse(message)) if message.contains("deadline_seconds") => Ok(()),
        other => Err(format!("expected parse error naming the key, got {other:?}")),
    }
}

#[test]
fn unknown_transport_is_rejected() -> TestResult {
    let (_dir, path) = write_config(b"[server]\ntransport = \"sse\"\n")?;
    match RelayConfig::load(Some(&path)) {
        Err(ConfigError::Parse(_)) => Ok(()),
        other => Err(format!("expected parse error, got {other:?}")),
    }
}

#[test]
fn non_utf8_file_is_rejected() -> TestResult {
    let (_dir, path) = write_config(&[0xff, 0xfe, 0x00])?;
    assert_invalid(RelayConfig::load(Some(&path)), "config file must be utf-8")
}

#[test]
fn oversized_file_is_rejected() -> TestResult {
    let mut contents = b"# padding\n".to_vec();
    contents.resize(1024 * 1024 + 1, b' ');
    let (_dir, path) = write_config(&contents)?;
    assert_invalid(RelayConfig::load(Some(&path)), "config file exceeds size limit")
}

#[test]
fn validation_runs_after_parse() -> TestResult {
    let (_dir, path) = write_config(b"[operator]\npoll_interval_ms = 5\n")?;
    assert_invalid(RelayConfig::load(Some(&path)), "operator.poll_interval_ms")
}
