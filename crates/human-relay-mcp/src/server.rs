// crates/human-relay-mcp/src/server.rs
// ============================================================================
// Module: MCP Server
// Description: MCP server implementations for stdio and HTTP transports.
// Purpose: Expose the human-backed tools via JSON-RPC 2.0.
// Dependencies: axum, human-relay-config, human-relay-core, serde, tokio
// ============================================================================

//! ## Overview
//! The MCP server speaks JSON-RPC 2.0 over stdio or HTTP and routes every
//! tool call through [`crate::tools::ToolRouter`]. The operator surface runs
//! alongside the agent transport; failure of either stops the server.
//!
//! Each tool call runs on its own task so a long human wait never blocks
//! other requests. Calls are tracked by JSON-RPC id so that
//! `notifications/cancelled` (or a dropped HTTP connection) aborts the wait
//! and releases the pending entry.
//!
//! Stdio input accepts newline-delimited JSON and `Content-Length` framed
//! messages; each response uses the framing of its request. All responses
//! pass through a single writer task.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Instant;

use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::post;
use human_relay_config::RelayConfig;
use human_relay_config::ServerTransport;
use human_relay_core::PendingRequestBroker;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::task::JoinSet;

use crate::audit::AuditSink;
use crate::audit::LifecycleAuditBridge;
use crate::audit::McpAuditEvent;
use crate::audit::McpAuditEventParams;
use crate::audit::audit_sink_from_config;
use crate::operator::OperatorError;
use crate::operator::OperatorSettings;
use crate::operator::operator_router;
use crate::operator::serve_operator;
use crate::telemetry::McpMethod;
use crate::telemetry::McpMetricEvent;
use crate::telemetry::McpMetrics;
use crate::telemetry::McpOutcome;
use crate::telemetry::NoopMetrics;
use crate::tools::ToolDefinition;
use crate::tools::ToolError;
use crate::tools::ToolRouter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Server name reported during `initialize`.
pub const SERVER_NAME: &str = "human-controlled-mcp";
/// Protocol version offered when the client requests an unknown one.
pub const LATEST_PROTOCOL_VERSION: &str = "2025-06-18";
/// Protocol versions accepted from clients.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &[LATEST_PROTOCOL_VERSION, "2025-03-26", "2024-11-05"];
/// Fallback payload when a response cannot be serialized.
const SERIALIZATION_FALLBACK: &str =
    "{\"jsonrpc\":\"2.0\",\"id\":null,\"error\":{\"code\":-32060,\"message\":\"serialization \
     failed\"}}";

// ============================================================================
// SECTION: MCP Server
// ============================================================================

/// MCP server instance.
pub struct McpServer {
    /// Server configuration.
    config: RelayConfig,
    /// Shared request dispatcher.
    dispatcher: Arc<McpDispatcher>,
    /// Audit sink shared with the operator surface.
    audit: Arc<dyn AuditSink>,
}

impl McpServer {
    /// Builds a new MCP server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when initialization fails.
    pub fn from_config(config: RelayConfig) -> Result<Self, McpServerError> {
        config.validate().map_err(|err| McpServerError::Config(err.to_string()))?;
        let audit = audit_sink_from_config(&config.audit)
            .map_err(|err| McpServerError::Init(format!("audit log unavailable: {err}")))?;
        Self::with_sinks(config, audit, Arc::new(NoopMetrics))
    }

    /// Builds a new MCP server with explicit audit and metrics sinks.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when initialization fails.
    pub fn with_sinks(
        config: RelayConfig,
        audit: Arc<dyn AuditSink>,
        metrics: Arc<dyn McpMetrics>,
    ) -> Result<Self, McpServerError> {
        let broker = PendingRequestBroker::with_event_sink(
            config.broker_settings(),
            Arc::new(LifecycleAuditBridge::new(Arc::clone(&audit))),
        );
        let router = ToolRouter::new(broker).map_err(|err| McpServerError::Init(err.to_string()))?;
        let dispatcher = Arc::new(McpDispatcher {
            router,
            transport: config.server.transport,
            max_body_bytes: config.server.max_body_bytes,
            audit: Arc::clone(&audit),
            metrics,
            in_flight: InFlightCalls::default(),
        });
        Ok(Self {
            config,
            dispatcher,
            audit,
        })
    }

    /// Returns the broker shared by the agent and operator sides.
    #[must_use]
    pub fn broker(&self) -> &PendingRequestBroker {
        self.dispatcher.router.broker()
    }

    /// Builds the operator surface router.
    #[must_use]
    pub fn operator_router(&self) -> Router {
        operator_router(
            self.broker().clone(),
            Arc::clone(&self.audit),
            OperatorSettings::from(&self.config.operator),
        )
    }

    /// Builds the HTTP JSON-RPC router (`POST /rpc`).
    #[must_use]
    pub fn rpc_router(&self) -> Router {
        Router::new()
            .route("/rpc", post(handle_http))
            .layer(DefaultBodyLimit::max(self.dispatcher.max_body_bytes))
            .with_state(Arc::clone(&self.dispatcher))
    }

    /// Serves the operator surface and the configured agent transport.
    ///
    /// Returns when the agent transport ends (stdio EOF) or either side fails.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when either side fails.
    pub async fn serve(self) -> Result<(), McpServerError> {
        let operator_addr = self
            .config
            .operator
            .bind_addr()
            .map_err(|err| McpServerError::Config(err.to_string()))?;
        let operator = serve_operator(operator_addr, self.operator_router());
        match self.config.server.transport {
            ServerTransport::Stdio => {
                let transport = self.serve_stream(tokio::io::stdin(), tokio::io::stdout());
                tokio::select! {
                    result = transport => result,
                    result = operator => result.map_err(McpServerError::from),
                }
            }
            ServerTransport::Http => {
                let addr = self
                    .config
                    .server
                    .bind_addr()
                    .map_err(|err| McpServerError::Config(err.to_string()))?;
                let transport = serve_http(addr, self.rpc_router());
                tokio::select! {
                    result = transport => result,
                    result = operator => result.map_err(McpServerError::from),
                }
            }
        }
    }

    /// Serves JSON-RPC messages from `reader`, writing responses to `writer`.
    ///
    /// Returns at end of input. Calls still waiting at that point are
    /// cancelled and their pending entries released.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError::Transport`] when reading or writing fails.
    pub async fn serve_stream<R, W>(&self, reader: R, writer: W) -> Result<(), McpServerError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut reader = BufReader::new(reader);
        let (sender, receiver) = mpsc::unbounded_channel::<OutboundMessage>();
        let writer_task = tokio::spawn(write_loop(writer, receiver));
        let mut tasks = JoinSet::new();
        let max_body_bytes = self.dispatcher.max_body_bytes;

        let result = loop {
            match read_message(&mut reader, max_body_bytes).await {
                Ok(Some(message)) => {
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let sender = sender.clone();
                    tasks.spawn(async move {
                        if let Some((_, payload)) = dispatcher.handle_bytes(&message.body).await {
                            let _ = sender.send(OutboundMessage {
                                framing: message.framing,
                                payload,
                            });
                        }
                    });
                }
                Ok(None) => break Ok(()),
                Err(ReadError::TooLarge(framing)) => {
                    let (_, payload) = self.dispatcher.too_large(0);
                    let _ = sender.send(OutboundMessage {
                        framing,
                        payload,
                    });
                }
                Err(ReadError::Io(message)) => break Err(McpServerError::Transport(message)),
            }
            while tasks.try_join_next().is_some() {}
        };

        tasks.shutdown().await;
        drop(sender);
        let written = writer_task
            .await
            .map_err(|_| McpServerError::Transport("stdio writer failed".to_string()))?;
        result.and(written)
    }
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// Serves JSON-RPC requests over HTTP.
async fn serve_http(addr: SocketAddr, app: Router) -> Result<(), McpServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| McpServerError::Transport(format!("http bind failed: {err}")))?;
    axum::serve(listener, app)
        .await
        .map_err(|err| McpServerError::Transport(format!("http server failed: {err}")))
}

/// Handles HTTP JSON-RPC requests.
async fn handle_http(State(dispatcher): State<Arc<McpDispatcher>>, bytes: Bytes) -> Response {
    match dispatcher.handle_bytes(&bytes).await {
        Some((status, payload)) => {
            (status, [(CONTENT_TYPE, "application/json")], payload).into_response()
        }
        None => StatusCode::ACCEPTED.into_response(),
    }
}

// ============================================================================
// SECTION: Dispatch
// ============================================================================

/// Transport-independent JSON-RPC dispatcher.
struct McpDispatcher {
    /// Tool router for request dispatch.
    router: ToolRouter,
    /// Transport label for audit and metrics.
    transport: ServerTransport,
    /// Maximum accepted message size.
    max_body_bytes: usize,
    /// Audit sink.
    audit: Arc<dyn AuditSink>,
    /// Metrics sink.
    metrics: Arc<dyn McpMetrics>,
    /// Tool calls currently waiting, by JSON-RPC id.
    in_flight: InFlightCalls,
}

/// Result of dispatching one message.
struct Dispatched {
    /// Response to send, if any.
    response: Option<(StatusCode, JsonRpcResponse)>,
    /// Method classification.
    method: McpMethod,
    /// Tool name for tools/call.
    tool: Option<String>,
    /// JSON-RPC id rendered for audit.
    rpc_id: Option<String>,
}

impl McpDispatcher {
    /// Handles one raw message and returns the serialized response, if any.
    async fn handle_bytes(&self, bytes: &[u8]) -> Option<(StatusCode, Vec<u8>)> {
        let started = Instant::now();
        if bytes.len() > self.max_body_bytes {
            return Some(self.too_large(bytes.len()));
        }
        let dispatched = match serde_json::from_slice::<Value>(bytes) {
            Err(_) => Dispatched::invalid(-32700, "parse error"),
            Ok(value) => match serde_json::from_value::<JsonRpcRequest>(value) {
                Err(_) => Dispatched::invalid(-32600, "invalid json-rpc request"),
                Ok(request) => self.dispatch(request).await,
            },
        };
        let Dispatched {
            response,
            method,
            tool,
            rpc_id,
        } = dispatched;
        let (status, payload, outcome, error_code) = match response {
            Some((status, response)) => {
                let error_code = response.error.as_ref().map(|error| error.code);
                let outcome = if error_code.is_some() { McpOutcome::Error } else { McpOutcome::Ok };
                (Some(status), encode(&response), outcome, error_code)
            }
            None if method == McpMethod::ToolsCall => (None, Vec::new(), McpOutcome::Cancelled, None),
            None => (None, Vec::new(), McpOutcome::Ok, None),
        };
        self.observe(
            McpAuditEventParams {
                rpc_id,
                transport: self.transport,
                method,
                tool,
                outcome,
                error_code,
                request_bytes: bytes.len(),
                response_bytes: payload.len(),
            },
            started,
        );
        status.map(|status| (status, payload))
    }

    /// Builds the oversized-message error response.
    fn too_large(&self, request_bytes: usize) -> (StatusCode, Vec<u8>) {
        let response = JsonRpcResponse::error(Value::Null, -32070, "request body too large");
        let payload = encode(&response);
        self.observe(
            McpAuditEventParams {
                rpc_id: None,
                transport: self.transport,
                method: McpMethod::Invalid,
                tool: None,
                outcome: McpOutcome::Error,
                error_code: Some(-32070),
                request_bytes,
                response_bytes: payload.len(),
            },
            Instant::now(),
        );
        (StatusCode::PAYLOAD_TOO_LARGE, payload)
    }

    /// Records audit and metrics for a handled message.
    fn observe(&self, params: McpAuditEventParams, started: Instant) {
        let metric = McpMetricEvent {
            transport: params.transport,
            method: params.method,
            tool: params.tool.clone(),
            outcome: params.outcome,
            error_code: params.error_code,
            request_bytes: params.request_bytes,
            response_bytes: params.response_bytes,
        };
        self.metrics.record_request(metric.clone());
        self.metrics.record_latency(metric, started.elapsed());
        self.audit.record(&McpAuditEvent::new(params));
    }

    /// Dispatches a parsed JSON-RPC message.
    async fn dispatch(&self, request: JsonRpcRequest) -> Dispatched {
        let method = McpMethod::classify(&request.method);
        let rpc_id = request.id.as_ref().map(Value::to_string);
        let mut dispatched = Dispatched {
            response: None,
            method,
            tool: None,
            rpc_id,
        };
        let Some(id) = request.id else {
            self.handle_notification(&request.method, request.params.as_ref());
            dispatched.method = McpMethod::Notification;
            return dispatched;
        };
        if request.jsonrpc != "2.0" {
            dispatched.response =
                Some(JsonRpcResponse::failure(id, -32600, "invalid json-rpc version"));
            return dispatched;
        }
        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, initialize_result(request.params.as_ref())),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => match serde_json::to_value(ToolListResult {
                tools: self.router.list_tools(),
            }) {
                Ok(value) => JsonRpcResponse::success(id, value),
                Err(_) => jsonrpc_error(id, ToolError::Serialization),
            },
            "tools/call" => {
                let params = request.params.unwrap_or(Value::Null);
                let Ok(call) = serde_json::from_value::<ToolCallParams>(params) else {
                    dispatched.response =
                        Some(JsonRpcResponse::failure(id, -32602, "invalid tool params"));
                    return dispatched;
                };
                dispatched.tool = Some(call.name.clone());
                let router = self.router.clone();
                let key = dispatched.rpc_id.clone();
                let result = self
                    .in_flight
                    .run(key, async move { router.handle_tool_call(&call.name, call.arguments).await })
                    .await;
                match result {
                    // Cancelled calls get no response.
                    None => return dispatched,
                    Some(Ok(result)) => match serde_json::to_value(result) {
                        Ok(value) => JsonRpcResponse::success(id, value),
                        Err(_) => jsonrpc_error(id, ToolError::Serialization),
                    },
                    Some(Err(err)) => jsonrpc_error(id, err),
                }
            }
            _ => JsonRpcResponse::failure(id, -32601, "method not found"),
        };
        dispatched.response = Some(response);
        dispatched
    }

    /// Handles a notification; notifications never produce a response.
    fn handle_notification(&self, method: &str, params: Option<&Value>) {
        if method == "notifications/cancelled"
            && let Some(request_id) = params.and_then(|params| params.get("requestId"))
        {
            self.in_flight.cancel(&request_id.to_string());
        }
    }
}

impl Dispatched {
    /// Builds an error dispatch for unparseable input.
    fn invalid(code: i64, message: &str) -> Self {
        Self {
            response: Some(JsonRpcResponse::failure(Value::Null, code, message)),
            method: McpMethod::Invalid,
            tool: None,
            rpc_id: None,
        }
    }
}

/// Builds the `initialize` result, negotiating the protocol version.
fn initialize_result(params: Option<&Value>) -> Value {
    let requested = params
        .and_then(|params| params.get("protocolVersion"))
        .and_then(Value::as_str)
        .filter(|version| SUPPORTED_PROTOCOL_VERSIONS.contains(version));
    json!({
        "protocolVersion": requested.unwrap_or(LATEST_PROTOCOL_VERSION),
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
    })
}

/// Serializes a response, falling back to a fixed error payload.
fn encode(response: &JsonRpcResponse) -> Vec<u8> {
    serde_json::to_vec(response).unwrap_or_else(|_| SERIALIZATION_FALLBACK.as_bytes().to_vec())
}

// ============================================================================
// SECTION: In-Flight Calls
// ============================================================================

/// Registry of running tool calls keyed by JSON-RPC id.
#[derive(Default)]
struct InFlightCalls {
    /// Ticket source distinguishing reused ids.
    next_ticket: AtomicU64,
    /// Abort handles for running calls.
    calls: Mutex<HashMap<String, (u64, AbortHandle)>>,
}

impl InFlightCalls {
    /// Runs `call` on its own task, tracked under `key` while it runs.
    ///
    /// Returns `None` when the call was cancelled. Dropping the returned
    /// future aborts the call.
    async fn run<F>(&self, key: Option<String>, call: F) -> Option<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let handle = {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
            let handle = tokio::spawn(call);
            if let Some(key) = &key {
                calls.insert(key.clone(), (ticket, handle.abort_handle()));
            }
            handle
        };
        let _guard = CallGuard {
            calls: self,
            key,
            ticket,
            abort: handle.abort_handle(),
        };
        handle.await.ok()
    }

    /// Aborts the call tracked under `key`; returns true when one was found.
    fn cancel(&self, key: &str) -> bool {
        let removed = self.calls.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
        let Some((_, abort)) = removed else {
            return false;
        };
        abort.abort();
        true
    }

    /// Returns the number of tracked calls.
    #[cfg(test)]
    fn len(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Aborts and untracks a call when its waiter goes away.
struct CallGuard<'a> {
    /// Owning registry.
    calls: &'a InFlightCalls,
    /// Tracking key, if any.
    key: Option<String>,
    /// Ticket identifying this call under `key`.
    ticket: u64,
    /// Abort handle for the call task.
    abort: AbortHandle,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.abort.abort();
        if let Some(key) = &self.key {
            let mut calls = self.calls.calls.lock().unwrap_or_else(PoisonError::into_inner);
            if calls.get(key).is_some_and(|(ticket, _)| *ticket == self.ticket) {
                calls.remove(key);
            }
        }
    }
}

// ============================================================================
// SECTION: JSON-RPC Types
// ============================================================================

/// Incoming JSON-RPC message payload.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    jsonrpc: String,
    /// Request identifier; absent for notifications.
    #[serde(default)]
    id: Option<Value>,
    /// Method name.
    method: String,
    /// Optional parameters payload.
    #[serde(default)]
    params: Option<Value>,
}

/// JSON-RPC response envelope.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    jsonrpc: &'static str,
    /// Request identifier.
    id: Value,
    /// Successful result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Builds a success response.
    fn success(id: Value, result: Value) -> (StatusCode, Self) {
        (
            StatusCode::OK,
            Self {
                jsonrpc: "2.0",
                id,
                result: Some(result),
                error: None,
            },
        )
    }

    /// Builds a request-level failure response.
    fn failure(id: Value, code: i64, message: &str) -> (StatusCode, Self) {
        (StatusCode::BAD_REQUEST, Self::error(id, code, message))
    }

    /// Builds an error envelope.
    fn error(id: Value, code: i64, message: &str) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.to_string(),
            }),
        }
    }
}

/// JSON-RPC error payload.
#[derive(Debug, Serialize)]
struct JsonRpcError {
    /// Error code.
    code: i64,
    /// Human-readable error message.
    message: String,
}

/// Tool call parameters for JSON-RPC requests.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    /// Tool name.
    name: String,
    /// Raw JSON arguments.
    #[serde(default)]
    arguments: Option<Value>,
}

/// Tool list response payload.
#[derive(Debug, Serialize)]
struct ToolListResult {
    /// Registered tool definitions.
    tools: Vec<ToolDefinition>,
}

/// Builds a JSON-RPC error response for a tool failure.
fn jsonrpc_error(id: Value, error: ToolError) -> (StatusCode, JsonRpcResponse) {
    let (status, code, message) = match error {
        ToolError::UnknownTool(name) => {
            (StatusCode::BAD_REQUEST, -32601, format!("unknown tool: {name}"))
        }
        ToolError::InvalidParams(message) => (StatusCode::BAD_REQUEST, -32602, message),
        ToolError::Internal(message) => (StatusCode::OK, -32050, message),
        ToolError::Serialization => (StatusCode::OK, -32060, "serialization failed".to_string()),
    };
    (status, JsonRpcResponse::error(id, code, &message))
}

// ============================================================================
// SECTION: Stdio Framing
// ============================================================================

/// Message framing observed on input and mirrored on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    /// One JSON document per line.
    Line,
    /// `Content-Length` header block followed by the body.
    ContentLength,
}

/// Message read from the stdio stream.
#[derive(Debug, PartialEq, Eq)]
struct InboundMessage {
    /// Framing used by the sender.
    framing: Framing,
    /// Message body.
    body: Vec<u8>,
}

/// Response queued for the writer task.
struct OutboundMessage {
    /// Framing to write with.
    framing: Framing,
    /// Serialized response.
    payload: Vec<u8>,
}

/// Stdio read failures.
#[derive(Debug, PartialEq, Eq)]
enum ReadError {
    /// Message exceeded the size limit and was discarded.
    TooLarge(Framing),
    /// Stream failure.
    Io(String),
}

/// Reads the next message, skipping blank lines. `Ok(None)` means end of input.
async fn read_message<R>(
    reader: &mut R,
    max_body_bytes: usize,
) -> Result<Option<InboundMessage>, ReadError>
where
    R: AsyncBufRead + Unpin,
{
    let limit = u64::try_from(max_body_bytes).unwrap_or(u64::MAX).saturating_add(1);
    loop {
        let mut line = Vec::new();
        let read = (&mut *reader)
            .take(limit)
            .read_until(b'\n', &mut line)
            .await
            .map_err(|err| ReadError::Io(format!("stdio read failed: {err}")))?;
        if read == 0 {
            return Ok(None);
        }
        if line.len() > max_body_bytes && line.last() != Some(&b'\n') {
            discard_line(reader).await?;
            return Err(ReadError::TooLarge(Framing::Line));
        }
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(length) = content_length(trimmed)? {
            return read_framed_body(reader, length, max_body_bytes).await.map(Some);
        }
        return Ok(Some(InboundMessage {
            framing: Framing::Line,
            body: trimmed.to_vec(),
        }));
    }
}

/// Parses a `Content-Length` header line.
fn content_length(line: &[u8]) -> Result<Option<usize>, ReadError> {
    const HEADER: &[u8] = b"content-length:";
    if line.len() < HEADER.len() || !line[.. HEADER.len()].eq_ignore_ascii_case(HEADER) {
        return Ok(None);
    }
    std::str::from_utf8(&line[HEADER.len() ..])
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .map(Some)
        .ok_or_else(|| ReadError::Io("invalid content length".to_string()))
}

/// Reads the remaining header lines and the body of a framed message.
async fn read_framed_body<R>(
    reader: &mut R,
    length: usize,
    max_body_bytes: usize,
) -> Result<InboundMessage, ReadError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let mut header = Vec::new();
        let read = (&mut *reader)
            .take(1024)
            .read_until(b'\n', &mut header)
            .await
            .map_err(|err| ReadError::Io(format!("stdio read failed: {err}")))?;
        if read == 0 {
            return Err(ReadError::Io("stdio closed inside header".to_string()));
        }
        if header.trim_ascii().is_empty() {
            break;
        }
    }
    if length > max_body_bytes {
        let skip = u64::try_from(length).unwrap_or(u64::MAX);
        tokio::io::copy(&mut (&mut *reader).take(skip), &mut tokio::io::sink())
            .await
            .map_err(|err| ReadError::Io(format!("stdio read failed: {err}")))?;
        return Err(ReadError::TooLarge(Framing::ContentLength));
    }
    let mut body = vec![0_u8; length];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|err| ReadError::Io(format!("stdio read failed: {err}")))?;
    Ok(InboundMessage {
        framing: Framing::ContentLength,
        body,
    })
}

/// Consumes input through the next newline.
async fn discard_line<R>(reader: &mut R) -> Result<(), ReadError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let mut chunk = Vec::new();
        let read = (&mut *reader)
            .take(64 * 1024)
            .read_until(b'\n', &mut chunk)
            .await
            .map_err(|err| ReadError::Io(format!("stdio read failed: {err}")))?;
        if read == 0 || chunk.last() == Some(&b'\n') {
            return Ok(());
        }
    }
}

/// Writes queued responses until every sender is dropped.
async fn write_loop<W>(
    mut writer: W,
    mut receiver: mpsc::UnboundedReceiver<OutboundMessage>,
) -> Result<(), McpServerError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = receiver.recv().await {
        if message.framing == Framing::ContentLength {
            let header = format!("Content-Length: {}\r\n\r\n", message.payload.len());
            writer.write_all(header.as_bytes()).await.map_err(write_failed)?;
            writer.write_all(&message.payload).await.map_err(write_failed)?;
        } else {
            writer.write_all(&message.payload).await.map_err(write_failed)?;
            writer.write_all(b"\n").await.map_err(write_failed)?;
        }
        writer.flush().await.map_err(write_failed)?;
    }
    Ok(())
}

/// Maps a write failure to a transport error.
fn write_failed(err: std::io::Error) -> McpServerError {
    McpServerError::Transport(format!("stdio write failed: {err}"))
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// MCP server errors.
#[derive(Debug, thiserror::Error)]
pub enum McpServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
    /// Operator surface errors.
    #[error(transparent)]
    Operator(#[from] OperatorError),
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        reason = "Test-only framing and dispatch assertions."
    )]

    use std::time::Duration;

    use serde_json::json;
    use tokio::io::BufReader;

    use super::Framing;
    use super::InFlightCalls;
    use super::InboundMessage;
    use super::ReadError;
    use super::initialize_result;
    use super::read_message;

    async fn read_all(input: &[u8], max: usize) -> Vec<Result<Option<InboundMessage>, ReadError>> {
        let mut reader = BufReader::new(input);
        let mut out = Vec::new();
        loop {
            let next = read_message(&mut reader, max).await;
            let done = matches!(next, Ok(None) | Err(ReadError::Io(_)));
            out.push(next);
            if done {
                return out;
            }
        }
    }

    #[tokio::test]
    async fn reads_newline_delimited_messages() {
        let input = b"{\"a\":1}\n\n  {\"b\":2}\r\n";
        let messages = read_all(input, 1024).await;
        assert_eq!(
            messages,
            vec![
                Ok(Some(InboundMessage {
                    framing: Framing::Line,
                    body: b"{\"a\":1}".to_vec(),
                })),
                Ok(Some(InboundMessage {
                    framing: Framing::Line,
                    body: b"{\"b\":2}".to_vec(),
                })),
                Ok(None),
            ]
        );
    }

    #[tokio::test]
    async fn reads_content_length_frames() {
        let payload = br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#;
        let mut input = format!("Content-Length: {}\r\n\r\n", payload.len()).into_bytes();
        input.extend_from_slice(payload);
        input.extend_from_slice(b"\n{\"c\":3}\n");
        let messages = read_all(&input, 1024).await;
        assert_eq!(messages.len(), 3);
        assert_eq!(
            messages[0],
            Ok(Some(InboundMessage {
                framing: Framing::ContentLength,
                body: payload.to_vec(),
            }))
        );
        assert_eq!(
            messages[1],
            Ok(Some(InboundMessage {
                framing: Framing::Line,
                body: b"{\"c\":3}".to_vec(),
            }))
        );
    }

    #[tokio::test]
    async fn oversized_line_is_skipped_and_reading_continues() {
        let mut input = vec![b'x'; 64];
        input.extend_from_slice(b"\n{\"ok\":true}\n");
        let messages = read_all(&input, 16).await;
        assert_eq!(messages[0], Err(ReadError::TooLarge(Framing::Line)));
        assert_eq!(
            messages[1],
            Ok(Some(InboundMessage {
                framing: Framing::Line,
                body: b"{\"ok\":true}".to_vec(),
            }))
        );
    }

    #[tokio::test]
    async fn oversized_frame_is_skipped_and_reading_continues() {
        let mut input = b"Content-Length: 32\r\n\r\n".to_vec();
        input.extend_from_slice(&[b'y'; 32]);
        input.extend_from_slice(b"{\"ok\":true}\n");
        let messages = read_all(&input, 16).await;
        assert_eq!(messages[0], Err(ReadError::TooLarge(Framing::ContentLength)));
        assert_eq!(
            messages[1],
            Ok(Some(InboundMessage {
                framing: Framing::Line,
                body: b"{\"ok\":true}".to_vec(),
            }))
        );
    }

    #[test]
    fn initialize_echoes_supported_version() {
        let result = initialize_result(Some(&json!({ "protocolVersion": "2024-11-05" })));
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "human-controlled-mcp");
        let fallback = initialize_result(Some(&json!({ "protocolVersion": "1999-01-01" })));
        assert_eq!(fallback["protocolVersion"], super::LATEST_PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn cancel_aborts_tracked_call_and_untracks_it() {
        let calls = InFlightCalls::default();
        let run = calls.run(Some("7".to_string()), async {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
        });
        let cancel = async {
            while calls.len() == 0 {
                tokio::task::yield_now().await;
            }
            assert!(calls.cancel("7"));
        };
        let (result, ()) = tokio::join!(run, cancel);
        assert!(result.is_none());
        assert_eq!(calls.len(), 0);
        assert!(!calls.cancel("7"));
    }

    #[tokio::test]
    async fn completed_call_is_untracked() {
        let calls = InFlightCalls::default();
        let result = calls.run(Some("1".to_string()), async { 5 }).await;
        assert_eq!(result, Some(5));
        assert_eq!(calls.len(), 0);
    }
}
