// crates/human-relay-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing and serve overrides.
// Purpose: Ensure overrides are applied and revalidated before serving.
// Dependencies: clap, human-relay-config
// ============================================================================

//! ## Overview
//! Validates clap parsing of the `serve` and `config` commands and the
//! override path applied before the server starts.

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

use clap::Parser;
use human_relay_config::RelayConfig;

use super::Cli;
use super::Commands;
use super::ConfigCommand;
use super::ServeCommand;
use super::apply_overrides;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn parse_serve(args: &[&str]) -> ServeCommand {
    let cli = Cli::try_parse_from(args).expect("parse args");
    match cli.command {
        Some(Commands::Serve(command)) => command,
        other => panic!("expected serve command, got {other:?}"),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn serve_flags_parse() {
    let command = parse_serve(&[
        "human-relay",
        "serve",
        "--config",
        "relay.toml",
        "--allow-non-loopback",
        "--deadline-secs",
        "60",
        "--operator-bind",
        "127.0.0.1:5050",
    ]);
    assert_eq!(command.config.as_deref(), Some(std::path::Path::new("relay.toml")));
    assert!(command.allow_non_loopback);
    assert_eq!(command.deadline_secs, Some(60));
    assert_eq!(command.operator_bind.as_deref(), Some("127.0.0.1:5050"));
}

#[test]
fn config_subcommands_parse() {
    let cli = Cli::try_parse_from(["human-relay", "config", "example"]).expect("parse args");
    assert!(matches!(
        cli.command,
        Some(Commands::Config {
            command: ConfigCommand::Example
        })
    ));
    let cli = Cli::try_parse_from(["human-relay", "--version"]).expect("parse args");
    assert!(cli.show_version);
    assert!(cli.command.is_none());
}

#[test]
fn overrides_replace_config_values() {
    let command = parse_serve(&[
        "human-relay",
        "serve",
        "--deadline-secs",
        "45",
        "--operator-bind",
        "127.0.0.1:6000",
    ]);
    let mut config = RelayConfig::default();
    apply_overrides(&mut config, &command).expect("valid overrides");
    assert_eq!(config.broker.deadline_secs, 45);
    assert_eq!(config.operator.bind, "127.0.0.1:6000");
}

#[test]
fn overrides_are_revalidated() {
    let command = parse_serve(&["human-relay", "serve", "--deadline-secs", "0"]);
    let mut config = RelayConfig::default();
    assert!(apply_overrides(&mut config, &command).is_err());

    let command = parse_serve(&["human-relay", "serve", "--operator-bind", "not-an-address"]);
    let mut config = RelayConfig::default();
    assert!(apply_overrides(&mut config, &command).is_err());
}
