// crates/human-relay-mcp/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared helpers for human-relay-mcp integration tests.
// Purpose: Build servers and routers, drive HTTP requests, wait on the broker.
// Dependencies: axum, human-relay-config, human-relay-core, human-relay-mcp, tower
// ============================================================================

//! ## Overview
//! Helpers that build in-process servers with no-op sinks and drive their
//! routers with `tower::ServiceExt::oneshot`, so no sockets are bound.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

use std::sync::Arc;
use std::sync::Mutex;

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::http::StatusCode;
use human_relay_config::RelayConfig;
use human_relay_config::ServerTransport;
use human_relay_core::PendingRequestBroker;
use human_relay_core::RequestEntry;
use human_relay_mcp::AuditSink;
use human_relay_mcp::LifecycleAuditEvent;
use human_relay_mcp::McpAuditEvent;
use human_relay_mcp::McpServer;
use human_relay_mcp::NoopAuditSink;
use human_relay_mcp::NoopMetrics;
use human_relay_mcp::OperatorAuditEvent;
use serde_json::Value;
use tower::ServiceExt;

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Builds a relay config for the given transport and deadline.
pub fn relay_config(transport: ServerTransport, deadline_secs: u64) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.server.transport = transport;
    if transport == ServerTransport::Http {
        config.server.bind = Some("127.0.0.1:0".to_string());
    }
    config.broker.deadline_secs = deadline_secs;
    config
}

/// Builds a server with no-op audit and metrics sinks.
pub fn server(config: RelayConfig) -> Arc<McpServer> {
    Arc::new(McpServer::with_sinks(config, Arc::new(NoopAuditSink), Arc::new(NoopMetrics)).unwrap())
}

/// Builds a server that records audit events into `audit`.
pub fn server_with_audit(config: RelayConfig, audit: Arc<RecordingAudit>) -> Arc<McpServer> {
    Arc::new(McpServer::with_sinks(config, audit, Arc::new(NoopMetrics)).unwrap())
}

// ============================================================================
// SECTION: Audit Recording
// ============================================================================

/// Audit sink that keeps every event as a JSON value.
#[derive(Default)]
pub struct RecordingAudit {
    /// Recorded events in emission order.
    events: Mutex<Vec<Value>>,
}

impl RecordingAudit {
    /// Creates a shared recording sink.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns a copy of all recorded events.
    pub fn events(&self) -> Vec<Value> {
        self.events.lock().unwrap().clone()
    }

    /// Returns recorded events with the given `event` label.
    pub fn events_named(&self, name: &str) -> Vec<Value> {
        self.events().into_iter().filter(|event| event["event"] == name).collect()
    }

    /// Stores one event.
    fn push(&self, event: &impl serde::Serialize) {
        self.events.lock().unwrap().push(serde_json::to_value(event).unwrap());
    }
}

impl AuditSink for RecordingAudit {
    fn record(&self, event: &McpAuditEvent) {
        self.push(event);
    }

    fn record_operator(&self, event: &OperatorAuditEvent) {
        self.push(event);
    }

    fn record_lifecycle(&self, event: &LifecycleAuditEvent) {
        self.push(event);
    }
}

// ============================================================================
// SECTION: HTTP Helpers
// ============================================================================

/// Sends one request through `app` and returns the status and raw body.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

/// Sends a GET request and parses the JSON body.
pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

/// Sends a POST with a raw body and returns the status and raw body.
pub async fn post_raw(app: &Router, uri: &str, body: impl Into<Body>) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    send(app, request).await
}

/// Sends a JSON POST and parses the JSON body.
pub async fn post_json(app: &Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let (status, body) = post_raw(app, uri, body.to_string()).await;
    (status, serde_json::from_slice(&body).unwrap())
}

// ============================================================================
// SECTION: Broker Helpers
// ============================================================================

/// Yields until at least `count` requests are pending, then returns them.
pub async fn wait_for_pending(broker: &PendingRequestBroker, count: usize) -> Vec<RequestEntry> {
    for _ in 0..100_000 {
        let pending = broker.list_pending().unwrap();
        if pending.len() >= count {
            return pending;
        }
        tokio::task::yield_now().await;
    }
    panic!("expected {count} pending requests");
}

/// Yields until no requests are pending.
pub async fn wait_for_empty(broker: &PendingRequestBroker) {
    for _ in 0..100_000 {
        if broker.list_pending().unwrap().is_empty() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("expected no pending requests");
}
