// crates/human-relay-mcp/src/audit.rs
// ============================================================================
// Module: Relay Audit Logging
// Description: Structured audit events for MCP requests and operator answers.
// Purpose: Emit redacted JSON-line logs without a global logger.
// Dependencies: human-relay-config, human-relay-core, serde
// ============================================================================

//! ## Overview
//! Audit events are JSON lines written to stderr, an append-only file, or
//! nowhere. Three event families exist: `mcp_request` for agent-facing
//! traffic, `operator_answer` for submissions from the operator surface, and
//! `request_lifecycle` for broker transitions. Events carry identifiers,
//! names, and sizes only; tool arguments and answer text are never logged.
//! Stdout is reserved for the stdio transport and is never written here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use human_relay_config::AuditConfig;
use human_relay_config::ServerTransport;
use human_relay_core::RequestEvent;
use human_relay_core::RequestEventKind;
use human_relay_core::RequestEventSink;
use human_relay_core::RequestId;
use serde::Serialize;

use crate::telemetry::McpMethod;
use crate::telemetry::McpOutcome;

// ============================================================================
// SECTION: Types
// ============================================================================

/// MCP request audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct McpAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// JSON-RPC request identifier when provided.
    pub rpc_id: Option<String>,
    /// Transport used for the request.
    pub transport: ServerTransport,
    /// JSON-RPC method classification.
    pub method: McpMethod,
    /// Tool name when available (tools/call).
    pub tool: Option<String>,
    /// Request outcome.
    pub outcome: McpOutcome,
    /// JSON-RPC error code when present.
    pub error_code: Option<i64>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
}

/// Inputs required to construct an MCP audit event.
pub struct McpAuditEventParams {
    /// JSON-RPC request identifier when provided.
    pub rpc_id: Option<String>,
    /// Transport type used for the request.
    pub transport: ServerTransport,
    /// JSON-RPC method classification.
    pub method: McpMethod,
    /// Tool name when available (tools/call).
    pub tool: Option<String>,
    /// Request outcome.
    pub outcome: McpOutcome,
    /// JSON-RPC error code when present.
    pub error_code: Option<i64>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
}

impl McpAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: McpAuditEventParams) -> Self {
        Self {
            event: "mcp_request",
            timestamp_ms: now_ms(),
            rpc_id: params.rpc_id,
            transport: params.transport,
            method: params.method,
            tool: params.tool,
            outcome: params.outcome,
            error_code: params.error_code,
            request_bytes: params.request_bytes,
            response_bytes: params.response_bytes,
        }
    }
}

/// Operator answer audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct OperatorAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Request identifier as submitted by the operator.
    pub request_id: String,
    /// Whether the broker accepted the answer.
    pub accepted: bool,
    /// Whether the operator flagged the answer as an error.
    pub is_error: bool,
    /// Answer text size in bytes.
    pub response_bytes: usize,
}

impl OperatorAuditEvent {
    /// Creates a new operator answer event.
    #[must_use]
    pub fn new(request_id: &str, accepted: bool, is_error: bool, response_bytes: usize) -> Self {
        Self {
            event: "operator_answer",
            timestamp_ms: now_ms(),
            request_id: request_id.to_string(),
            accepted,
            is_error,
            response_bytes,
        }
    }
}

/// Broker lifecycle audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Lifecycle transition.
    pub transition: RequestEventKind,
    /// Request identifier.
    pub request_id: RequestId,
    /// Tool name when known.
    pub tool: Option<String>,
    /// Whether the delivered answer was an operator-signaled error.
    pub is_error: Option<bool>,
}

impl From<&RequestEvent> for LifecycleAuditEvent {
    fn from(event: &RequestEvent) -> Self {
        Self {
            event: "request_lifecycle",
            timestamp_ms: now_ms(),
            transition: event.kind,
            request_id: event.request_id,
            tool: event.tool_name.clone(),
            is_error: event.is_error,
        }
    }
}

/// Returns milliseconds since the unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for relay events.
pub trait AuditSink: Send + Sync {
    /// Records an MCP request event.
    fn record(&self, event: &McpAuditEvent);
    /// Records an operator answer event.
    fn record_operator(&self, event: &OperatorAuditEvent);
    /// Records a broker lifecycle event.
    fn record_lifecycle(&self, event: &LifecycleAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl StderrAuditSink {
    /// Writes one serialized event to stderr.
    fn write_line(event: &impl Serialize) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

impl AuditSink for StderrAuditSink {
    fn record(&self, event: &McpAuditEvent) {
        Self::write_line(event);
    }

    fn record_operator(&self, event: &OperatorAuditEvent) {
        Self::write_line(event);
    }

    fn record_lifecycle(&self, event: &LifecycleAuditEvent) {
        Self::write_line(event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event to the log file.
    fn write_line(&self, event: &impl Serialize) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: &McpAuditEvent) {
        self.write_line(event);
    }

    fn record_operator(&self, event: &OperatorAuditEvent) {
        self.write_line(event);
    }

    fn record_lifecycle(&self, event: &LifecycleAuditEvent) {
        self.write_line(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &McpAuditEvent) {}

    fn record_operator(&self, _event: &OperatorAuditEvent) {}

    fn record_lifecycle(&self, _event: &LifecycleAuditEvent) {}
}

/// Builds the audit sink selected by configuration.
///
/// # Errors
///
/// Returns an error when the configured audit file cannot be opened.
pub fn audit_sink_from_config(config: &AuditConfig) -> io::Result<Arc<dyn AuditSink>> {
    if !config.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match &config.path {
        Some(path) => Ok(Arc::new(FileAuditSink::new(Path::new(path.trim()))?)),
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

// ============================================================================
// SECTION: Broker Bridge
// ============================================================================

/// Forwards broker lifecycle events into an [`AuditSink`].
pub struct LifecycleAuditBridge {
    /// Destination sink.
    sink: Arc<dyn AuditSink>,
}

impl LifecycleAuditBridge {
    /// Wraps an audit sink.
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
        }
    }
}

impl RequestEventSink for LifecycleAuditBridge {
    fn record(&self, event: &RequestEvent) {
        self.sink.record_lifecycle(&LifecycleAuditEvent::from(event));
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "Test-only assertions on audit output."
    )]

    use std::fs;
    use std::sync::Arc;

    use human_relay_config::AuditConfig;
    use human_relay_core::RequestEvent;
    use human_relay_core::RequestEventKind;
    use human_relay_core::RequestEventSink;
    use human_relay_core::RequestId;
    use serde_json::Value;

    use super::FileAuditSink;
    use super::LifecycleAuditBridge;
    use super::OperatorAuditEvent;
    use super::audit_sink_from_config;

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = Arc::new(FileAuditSink::new(&path).unwrap());
        let bridge = LifecycleAuditBridge::new(sink.clone());
        let id = RequestId::generate();
        bridge.record(&RequestEvent {
            kind: RequestEventKind::Queued,
            request_id: id,
            tool_name: Some("ask_human".to_string()),
            is_error: None,
        });
        super::AuditSink::record_operator(
            sink.as_ref(),
            &OperatorAuditEvent::new(&id.to_string(), true, false, 3),
        );

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> =
            contents.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "request_lifecycle");
        assert_eq!(lines[0]["transition"], "queued");
        assert_eq!(lines[0]["request_id"], id.to_string());
        assert_eq!(lines[1]["event"], "operator_answer");
        assert_eq!(lines[1]["response_bytes"], 3);
    }

    #[test]
    fn disabled_audit_builds_without_touching_path() {
        let config = AuditConfig {
            enabled: false,
            path: Some("/nonexistent/dir/audit.jsonl".to_string()),
        };
        assert!(audit_sink_from_config(&config).is_ok());
    }
}
