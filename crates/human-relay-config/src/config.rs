// crates/human-relay-config/src/config.rs
// ============================================================================
// Module: Human Relay Configuration
// Description: Configuration loading and validation for the human relay.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: human-relay-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The file is optional: when no path is given and the default file is absent,
//! built-in defaults apply. An explicitly named file that cannot be read is an
//! error. Unknown keys are rejected so typos never silently fall back to
//! defaults.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use human_relay_core::BrokerSettings;
use human_relay_core::DEFAULT_DEADLINE;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "human-relay.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "HUMAN_RELAY_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Upper bound for any request body limit.
pub(crate) const MAX_BODY_BYTES_LIMIT: usize = 16 * 1024 * 1024;
/// Default operator surface bind address.
pub(crate) const DEFAULT_OPERATOR_BIND: &str = "127.0.0.1:5000";
/// Default operator page poll interval in milliseconds.
pub(crate) const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
/// Minimum operator page poll interval in milliseconds.
pub(crate) const MIN_POLL_INTERVAL_MS: u64 = 100;
/// Maximum operator page poll interval in milliseconds.
pub(crate) const MAX_POLL_INTERVAL_MS: u64 = 60_000;
/// Default operator request body limit in bytes.
pub(crate) const DEFAULT_OPERATOR_MAX_BODY_BYTES: usize = 256 * 1024;
/// Minimum broker deadline in seconds.
pub(crate) const MIN_DEADLINE_SECS: u64 = 1;
/// Maximum broker deadline in seconds.
pub(crate) const MAX_DEADLINE_SECS: u64 = 86_400;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Human relay configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Agent-facing MCP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Operator HTTP surface configuration.
    #[serde(default)]
    pub operator: OperatorConfig,
    /// Pending request broker configuration.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl RelayConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: `path`, then `HUMAN_RELAY_CONFIG`, then
    /// `human-relay.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let source = resolve_path(path, env::var(CONFIG_ENV_VAR).ok())?;
        Self::load_source(&source)
    }

    /// Loads configuration from an already resolved source.
    fn load_source(source: &ConfigSource) -> Result<Self, ConfigError> {
        validate_path(&source.path)?;
        if !source.explicit && !source.path.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        let bytes = fs::read(&source.path)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", source.path.display())))?;
        Self::from_bytes(&bytes)
    }

    /// Parses and validates configuration from raw file bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the input exceeds limits, is not UTF-8,
    /// fails to parse, or fails validation.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.operator.validate()?;
        self.broker.validate()?;
        self.audit.validate()?;
        Ok(())
    }

    /// Returns broker settings derived from the `[broker]` section.
    #[must_use]
    pub const fn broker_settings(&self) -> BrokerSettings {
        BrokerSettings {
            deadline: self.broker.deadline(),
        }
    }
}

/// Supported MCP transport types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServerTransport {
    /// Use stdin/stdout transport.
    #[default]
    Stdio,
    /// Use HTTP JSON-RPC transport.
    Http,
}

impl ServerTransport {
    /// Returns a stable label for the transport.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
        }
    }
}

/// Agent-facing MCP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Transport type for MCP.
    #[serde(default)]
    pub transport: ServerTransport,
    /// Bind address for the HTTP transport.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    /// Maximum request message size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: ServerTransport::Stdio,
            bind: None,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Validates server transport configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_body_limit("server.max_body_bytes", self.max_body_bytes)?;
        match self.transport {
            ServerTransport::Http => {
                self.bind_addr()?;
            }
            ServerTransport::Stdio => {
                if self.bind.is_some() {
                    return Err(ConfigError::Invalid(
                        "stdio transport does not use server.bind".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Returns the parsed HTTP bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the bind is missing or malformed.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let bind = self.bind.as_deref().unwrap_or_default().trim();
        if bind.is_empty() {
            return Err(ConfigError::Invalid("http transport requires server.bind".to_string()));
        }
        parse_bind("server.bind", bind)
    }
}

/// Operator HTTP surface configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OperatorConfig {
    /// Bind address for the operator surface.
    #[serde(default = "default_operator_bind")]
    pub bind: String,
    /// Poll interval used by the operator page, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum operator request body size in bytes.
    #[serde(default = "default_operator_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            bind: default_operator_bind(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_body_bytes: DEFAULT_OPERATOR_MAX_BODY_BYTES,
        }
    }
}

impl OperatorConfig {
    /// Validates operator surface configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if !(MIN_POLL_INTERVAL_MS ..= MAX_POLL_INTERVAL_MS).contains(&self.poll_interval_ms) {
            return Err(ConfigError::Invalid(format!(
                "operator.poll_interval_ms must be between {MIN_POLL_INTERVAL_MS} and \
                 {MAX_POLL_INTERVAL_MS}"
            )));
        }
        validate_body_limit("operator.max_body_bytes", self.max_body_bytes)
    }

    /// Returns the parsed operator bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the bind is malformed.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_bind("operator.bind", self.bind.trim())
    }
}

/// Pending request broker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
    /// Seconds each request waits for a human before timing out.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline_secs(),
        }
    }
}

impl BrokerConfig {
    /// Validates broker limits.
    fn validate(self) -> Result<(), ConfigError> {
        if !(MIN_DEADLINE_SECS ..= MAX_DEADLINE_SECS).contains(&self.deadline_secs) {
            return Err(ConfigError::Invalid(format!(
                "broker.deadline_secs must be between {MIN_DEADLINE_SECS} and {MAX_DEADLINE_SECS}"
            )));
        }
        Ok(())
    }

    /// Returns the configured deadline.
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

/// Audit logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Enable structured audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines). Stderr when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl AuditConfig {
    /// Validates the audit log path.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolved configuration location.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ConfigSource {
    /// Path to read.
    path: PathBuf,
    /// True when the path was named by the caller or the environment.
    explicit: bool,
}

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>, env_path: Option<String>) -> Result<ConfigSource, ConfigError> {
    if let Some(path) = path {
        return Ok(ConfigSource {
            path: path.to_path_buf(),
            explicit: true,
        });
    }
    if let Some(env_path) = env_path.filter(|value| !value.trim().is_empty()) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(ConfigSource {
            path: PathBuf::from(env_path),
            explicit: true,
        });
    }
    Ok(ConfigSource {
        path: PathBuf::from(DEFAULT_CONFIG_NAME),
        explicit: false,
    })
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a request body limit.
fn validate_body_limit(field: &str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid(format!("{field} must be greater than zero")));
    }
    if value > MAX_BODY_BYTES_LIMIT {
        return Err(ConfigError::Invalid(format!(
            "{field} must be at most {MAX_BODY_BYTES_LIMIT}"
        )));
    }
    Ok(())
}

/// Parses a socket bind address.
fn parse_bind(field: &str, value: &str) -> Result<SocketAddr, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid(format!("invalid {field} address: {value}")))
}

/// Default MCP request body size in bytes.
pub(crate) const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Default operator bind address.
pub(crate) fn default_operator_bind() -> String {
    DEFAULT_OPERATOR_BIND.to_string()
}

/// Default operator page poll interval.
pub(crate) const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// Default operator request body size in bytes.
pub(crate) const fn default_operator_max_body_bytes() -> usize {
    DEFAULT_OPERATOR_MAX_BODY_BYTES
}

/// Default broker deadline in seconds.
pub(crate) const fn default_deadline_secs() -> u64 {
    DEFAULT_DEADLINE.as_secs()
}

/// Default audit enablement.
pub(crate) const fn default_audit_enabled() -> bool {
    true
}

// ============================================================================
// SECTION: Tests
// ============================================================================
