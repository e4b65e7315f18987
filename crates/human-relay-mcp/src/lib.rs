// crates/human-relay-mcp/src/lib.rs
// ============================================================================
// Module: Human Relay MCP
// Description: MCP server and operator surface for the human relay.
// Purpose: Expose human-backed tools to agents and pending work to a human.
// Dependencies: axum, human-relay-config, human-relay-core, jsonschema, tokio
// ============================================================================

//! ## Overview
//! This crate wires the broker from `human-relay-core` to two surfaces:
//! the agent-facing MCP server (stdio or HTTP JSON-RPC) and the operator
//! HTTP interface a human uses to read and answer pending tool calls.
//! Audit events and metrics hooks are emitted for every request.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod operator;
pub mod server;
pub mod telemetry;
pub mod tools;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::LifecycleAuditBridge;
pub use audit::LifecycleAuditEvent;
pub use audit::McpAuditEvent;
pub use audit::NoopAuditSink;
pub use audit::OperatorAuditEvent;
pub use audit::StderrAuditSink;
pub use audit::audit_sink_from_config;
pub use operator::OperatorError;
pub use operator::OperatorSettings;
pub use operator::PendingRequestsReply;
pub use operator::REQUEST_NOT_FOUND;
pub use operator::SubmitResponseReply;
pub use operator::SubmitResponseRequest;
pub use operator::operator_router;
pub use operator::serve_operator;
pub use server::LATEST_PROTOCOL_VERSION;
pub use server::McpServer;
pub use server::McpServerError;
pub use server::SERVER_NAME;
pub use server::SUPPORTED_PROTOCOL_VERSIONS;
pub use telemetry::McpMethod;
pub use telemetry::McpMetricEvent;
pub use telemetry::McpMetrics;
pub use telemetry::McpOutcome;
pub use telemetry::NoopMetrics;
pub use tools::ToolCallResult;
pub use tools::ToolContent;
pub use tools::ToolDefinition;
pub use tools::ToolError;
pub use tools::ToolRouter;
pub use tools::tool_definitions;
