// crates/human-relay-cli/src/serve_policy.rs
// ============================================================================
// Module: Serve Policy
// Description: Network exposure policy checks for the CLI server launcher.
// Purpose: Keep unauthenticated listeners on loopback unless explicitly allowed.
// Dependencies: human-relay-config, thiserror
// ============================================================================

//! ## Overview
//! The operator surface has no authentication, and neither does the HTTP
//! transport. Both therefore bind to loopback unless the operator opts in
//! with `--allow-non-loopback` or the environment variable named by
//! [`ALLOW_NON_LOOPBACK_ENV`]. The policy fails closed.

use std::env;
use std::net::SocketAddr;

use human_relay_config::RelayConfig;
use human_relay_config::ServerTransport;
use thiserror::Error;

/// Environment variable enabling non-loopback binds.
pub const ALLOW_NON_LOOPBACK_ENV: &str = "HUMAN_RELAY_ALLOW_NON_LOOPBACK";

/// Listener a bind address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// Operator HTTP interface.
    Operator,
    /// MCP HTTP transport.
    Rpc,
}

impl Surface {
    /// Returns the label used in messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Operator => "operator",
            Self::Rpc => "mcp http",
        }
    }
}

/// Bind outcome metadata for startup warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindOutcome {
    /// Selected MCP transport.
    pub transport: ServerTransport,
    /// Bound address of the MCP HTTP transport, if used.
    pub rpc_addr: Option<SocketAddr>,
    /// Bound address of the operator surface.
    pub operator_addr: SocketAddr,
    /// Listeners bound to non-loopback addresses.
    pub exposed: Vec<Surface>,
}

impl BindOutcome {
    /// Returns true when any listener is reachable beyond loopback.
    #[must_use]
    pub fn network_exposed(&self) -> bool {
        !self.exposed.is_empty()
    }
}

/// Serve policy failures for bind safety.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServePolicyError {
    /// Environment variable was set to an invalid value.
    #[error("invalid {ALLOW_NON_LOOPBACK_ENV} value: {value}")]
    InvalidEnv {
        /// Raw environment value.
        value: String,
    },
    /// Bind string failed to parse.
    #[error("invalid {} bind address {bind}: {error}", surface.as_str())]
    InvalidBind {
        /// Listener the bind belongs to.
        surface: Surface,
        /// Raw bind value.
        bind: String,
        /// Parse error message.
        error: String,
    },
    /// Non-loopback binding requires explicit opt-in.
    #[error(
        "refusing to bind {} listener to non-loopback address {bind}; pass \
         --allow-non-loopback or set {ALLOW_NON_LOOPBACK_ENV}=1",
        surface.as_str()
    )]
    NonLoopbackOptInRequired {
        /// Listener the bind belongs to.
        surface: Surface,
        /// Bind address.
        bind: String,
    },
}

/// Resolves the non-loopback opt-in flag from CLI and environment.
///
/// # Errors
/// Returns [`ServePolicyError::InvalidEnv`] when the environment value is invalid.
pub fn resolve_allow_non_loopback(flag: bool) -> Result<bool, ServePolicyError> {
    if flag {
        return Ok(true);
    }
    let Some(value) = env::var_os(ALLOW_NON_LOOPBACK_ENV) else {
        return Ok(false);
    };
    parse_allow_non_loopback_value(&value.to_string_lossy())
}

/// Enforces loopback-only binds unless `allow_non_loopback` is set.
///
/// # Errors
/// Returns [`ServePolicyError`] when a bind is invalid or exposed without opt-in.
pub fn enforce_local_only(
    config: &RelayConfig,
    allow_non_loopback: bool,
) -> Result<BindOutcome, ServePolicyError> {
    let mut exposed = Vec::new();
    let operator_addr =
        check_bind(Surface::Operator, &config.operator.bind, allow_non_loopback, &mut exposed)?;
    let rpc_addr = match config.server.transport {
        ServerTransport::Stdio => None,
        ServerTransport::Http => {
            let bind = config.server.bind.as_deref().unwrap_or_default();
            Some(check_bind(Surface::Rpc, bind, allow_non_loopback, &mut exposed)?)
        }
    };
    Ok(BindOutcome {
        transport: config.server.transport,
        rpc_addr,
        operator_addr,
        exposed,
    })
}

/// Parses one bind and applies the loopback rule.
fn check_bind(
    surface: Surface,
    bind: &str,
    allow_non_loopback: bool,
    exposed: &mut Vec<Surface>,
) -> Result<SocketAddr, ServePolicyError> {
    let addr: SocketAddr =
        bind.trim().parse().map_err(|err: std::net::AddrParseError| ServePolicyError::InvalidBind {
            surface,
            bind: bind.to_string(),
            error: err.to_string(),
        })?;
    if addr.ip().is_loopback() {
        return Ok(addr);
    }
    if !allow_non_loopback {
        return Err(ServePolicyError::NonLoopbackOptInRequired {
            surface,
            bind: bind.to_string(),
        });
    }
    exposed.push(surface);
    Ok(addr)
}

/// Parses a bool-ish string (true/false/1/0/yes/no/on/off).
fn parse_boolish(value: &str) -> Option<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Parses an env value for allow-non-loopback.
pub(crate) fn parse_allow_non_loopback_value(value: &str) -> Result<bool, ServePolicyError> {
    parse_boolish(value).ok_or_else(|| ServePolicyError::InvalidEnv {
        value: value.to_string(),
    })
}
