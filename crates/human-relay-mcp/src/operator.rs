// crates/human-relay-mcp/src/operator.rs
// ============================================================================
// Module: Operator Interface
// Description: HTTP surface through which a human inspects and answers calls.
// Purpose: Translate operator HTTP requests into broker list and answer calls.
// Dependencies: axum, human-relay-core, serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! The operator surface is a small axum router:
//! - `GET /` serves a self-contained page that polls for pending requests.
//! - `GET /get_requests` returns pending requests (oldest first) and counters.
//! - `POST /submit_response` answers one request.
//!
//! The surface is unauthenticated; the CLI refuses non-loopback binds unless
//! explicitly allowed. Answer text is never logged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use human_relay_config::OperatorConfig;
use human_relay_core::Answer;
use human_relay_core::BrokerError;
use human_relay_core::BrokerStats;
use human_relay_core::PendingRequestBroker;
use human_relay_core::RequestEntry;
use human_relay_core::RequestId;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::audit::AuditSink;
use crate::audit::OperatorAuditEvent;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Operator page template.
const OPERATOR_PAGE_TEMPLATE: &str = include_str!("operator_page.html");
/// Placeholder replaced with the configured poll interval.
const POLL_INTERVAL_PLACEHOLDER: &str = "{{POLL_INTERVAL_MS}}";
/// Error text returned for unknown or already resolved requests.
pub const REQUEST_NOT_FOUND: &str = "Request not found";

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Runtime settings for the operator surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorSettings {
    /// Page poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl From<&OperatorConfig> for OperatorSettings {
    fn from(config: &OperatorConfig) -> Self {
        Self {
            poll_interval_ms: config.poll_interval_ms,
            max_body_bytes: config.max_body_bytes,
        }
    }
}

impl Default for OperatorSettings {
    fn default() -> Self {
        Self::from(&OperatorConfig::default())
    }
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// `GET /get_requests` response body.
#[derive(Debug, Clone, Serialize)]
pub struct PendingRequestsReply {
    /// Pending requests, oldest first.
    pub requests: Vec<RequestEntry>,
    /// Broker counters.
    pub stats: BrokerStats,
}

/// `POST /submit_response` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponseRequest {
    /// Identifier of the request being answered.
    pub request_id: String,
    /// Answer text.
    pub response: String,
    /// Marks the answer as an error.
    #[serde(default)]
    pub is_error: bool,
}

/// `POST /submit_response` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitResponseReply {
    /// Whether the answer was accepted.
    pub success: bool,
    /// Failure description when not accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmitResponseReply {
    /// Builds an acceptance reply.
    const fn accepted() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// Builds a failure reply.
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Shared state for operator handlers.
#[derive(Clone)]
struct OperatorState {
    /// Broker being operated.
    broker: PendingRequestBroker,
    /// Audit sink for answer submissions.
    audit: Arc<dyn AuditSink>,
    /// Rendered control page.
    page: Arc<str>,
}

/// Builds the operator router.
#[must_use]
pub fn operator_router(
    broker: PendingRequestBroker,
    audit: Arc<dyn AuditSink>,
    settings: OperatorSettings,
) -> Router {
    let page = OPERATOR_PAGE_TEMPLATE
        .replace(POLL_INTERVAL_PLACEHOLDER, &settings.poll_interval_ms.to_string());
    let state = OperatorState {
        broker,
        audit,
        page: page.into(),
    };
    Router::new()
        .route("/", get(handle_index))
        .route("/get_requests", get(handle_get_requests))
        .route("/submit_response", post(handle_submit_response))
        .layer(DefaultBodyLimit::max(settings.max_body_bytes))
        .with_state(state)
}

/// Binds `addr` and serves the operator router until failure.
///
/// # Errors
///
/// Returns [`OperatorError`] when binding or serving fails.
pub async fn serve_operator(addr: SocketAddr, router: Router) -> Result<(), OperatorError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| OperatorError::Bind(format!("{addr}: {err}")))?;
    let local = listener.local_addr().unwrap_or(addr);
    let _ = writeln!(
        std::io::stderr(),
        "human-relay: operator interface available at http://{local}"
    );
    axum::serve(listener, router).await.map_err(|err| OperatorError::Serve(err.to_string()))
}

/// Serves the control page.
async fn handle_index(State(state): State<OperatorState>) -> Html<String> {
    Html(state.page.to_string())
}

/// Lists pending requests and counters.
async fn handle_get_requests(State(state): State<OperatorState>) -> Response {
    match state.broker.list_pending() {
        Ok(requests) => Json(PendingRequestsReply {
            requests,
            stats: state.broker.stats(),
        })
        .into_response(),
        Err(err) => {
            reply(StatusCode::INTERNAL_SERVER_ERROR, SubmitResponseReply::failure(err.to_string()))
        }
    }
}

/// Accepts an operator answer.
async fn handle_submit_response(State(state): State<OperatorState>, body: Bytes) -> Response {
    let Ok(request) = serde_json::from_slice::<SubmitResponseRequest>(&body) else {
        return reply(StatusCode::BAD_REQUEST, SubmitResponseReply::failure("invalid request body"));
    };
    if request.response.trim().is_empty() {
        return reply(
            StatusCode::BAD_REQUEST,
            SubmitResponseReply::failure("response must be non-empty"),
        );
    }
    let response_bytes = request.response.len();
    let is_error = request.is_error;
    let submission = match request.request_id.trim().parse::<RequestId>() {
        Ok(id) => match state.broker.answer(
            &id,
            Answer {
                payload: request.response,
                is_error,
            },
        ) {
            Ok(()) => Submission::Accepted,
            Err(BrokerError::NotFound(_)) => Submission::NotFound,
            Err(BrokerError::Internal(message)) => Submission::Failed(message),
        },
        // An unparseable id can never name a pending request.
        Err(_) => Submission::NotFound,
    };
    state.audit.record_operator(&OperatorAuditEvent::new(
        &request.request_id,
        matches!(submission, Submission::Accepted),
        is_error,
        response_bytes,
    ));
    match submission {
        Submission::Accepted => reply(StatusCode::OK, SubmitResponseReply::accepted()),
        Submission::NotFound => {
            reply(StatusCode::NOT_FOUND, SubmitResponseReply::failure(REQUEST_NOT_FOUND))
        }
        Submission::Failed(message) => {
            reply(StatusCode::INTERNAL_SERVER_ERROR, SubmitResponseReply::failure(message))
        }
    }
}

/// Result of an answer submission.
enum Submission {
    /// Answer delivered.
    Accepted,
    /// Request not pending.
    NotFound,
    /// Broker failure.
    Failed(String),
}

/// Builds a JSON reply with status.
fn reply(status: StatusCode, body: SubmitResponseReply) -> Response {
    (status, Json(body)).into_response()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Operator surface errors.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// Listener could not be bound.
    #[error("operator bind failed: {0}")]
    Bind(String),
    /// Server loop failed.
    #[error("operator server failed: {0}")]
    Serve(String),
}
