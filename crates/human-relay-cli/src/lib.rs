// crates/human-relay-cli/src/lib.rs
// ============================================================================
// Module: Human Relay CLI Library
// Description: Shared helpers for the human-relay command-line interface.
// Purpose: Provide the bind policy used by the CLI binary and its tests.
// Dependencies: human-relay-config, thiserror
// ============================================================================

//! ## Overview
//! This library houses CLI helpers that are worth testing on their own.
//! The binary entry point (`src/main.rs`) imports them.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Network exposure policy for the operator surface and HTTP transport.
pub mod serve_policy;
