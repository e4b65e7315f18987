// crates/human-relay-config/src/lib.rs
// ============================================================================
// Module: Human Relay Config Library
// Description: Canonical config model, validation, and example generation.
// Purpose: Single source of truth for human-relay.toml semantics.
// Dependencies: human-relay-core, serde, toml
// ============================================================================

//! ## Overview
//! `human-relay-config` defines the canonical configuration model for the
//! human relay: MCP transport, operator surface, broker deadline, and audit
//! logging. Validation is strict and fail-closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
