// crates/human-relay-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic example for `human-relay config example`.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example for `human-relay.toml`. Every value shown is the
//! built-in default, so the example doubles as a reference.

/// Returns a canonical example `human-relay.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[server]
transport = "stdio"
max_body_bytes = 1048576
# For the HTTP transport:
# transport = "http"
# bind = "127.0.0.1:8080"

[operator]
bind = "127.0.0.1:5000"
poll_interval_ms = 1000
max_body_bytes = 262144

[broker]
deadline_secs = 300

[audit]
enabled = true
# path = "human-relay-audit.jsonl"
"#,
    )
}
