// crates/human-relay-core/src/broker.rs
// ============================================================================
// Module: Pending Request Broker
// Description: Blocks tool calls until a human answers or a deadline expires.
// Purpose: Hand back exactly one terminal outcome per submitted request.
// Dependencies: serde, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! [`PendingRequestBroker`] registers each tool invocation in the
//! [`RequestRegistry`], then suspends the caller on a one-shot handoff until
//! the operator answers or the deadline elapses. The answer path and the
//! deadline path both resolve by removing the id from the registry; the first
//! to remove it wins and the other observes "not found".
//!
//! Invariants:
//! - Every `submit` yields exactly one of success, operator error, or timeout.
//! - An answer is accepted only while its request is pending; a late answer
//!   is rejected with [`BrokerError::NotFound`], never silently applied.
//! - Dropping a `submit` future releases its registry entry.
//! - Unrelated requests never contend on anything but the brief registry lock.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::events::NoopRequestEventSink;
use crate::events::RequestEvent;
use crate::events::RequestEventKind;
use crate::events::RequestEventSink;
use crate::identifiers::RequestId;
use crate::registry::RequestEntry;
use crate::registry::RequestRegistry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default time a request waits for a human before timing out.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(300);
/// Failure message returned when the deadline elapses.
pub const TIMEOUT_MESSAGE: &str = "timed out waiting for human response";
/// Failure message returned when a request is withdrawn without an answer.
pub const WITHDRAWN_MESSAGE: &str = "request withdrawn before a human response";

// ============================================================================
// SECTION: Answers and Outcomes
// ============================================================================

/// Terminal answer supplied by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// Free-form response text.
    pub payload: String,
    /// When true the payload is a failure message rather than a result.
    pub is_error: bool,
}

impl Answer {
    /// Builds a successful answer.
    #[must_use]
    pub fn text(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            is_error: false,
        }
    }

    /// Builds an operator-signaled error answer.
    #[must_use]
    pub fn error(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            is_error: true,
        }
    }
}

/// Why a request resolved as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The operator explicitly marked the answer as an error.
    HumanSignaled,
    /// No answer arrived within the deadline.
    TimedOut,
    /// The entry was removed from the registry without an answer.
    Withdrawn,
}

/// Terminal outcome of a submitted request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The operator answered with a result.
    Success {
        /// Response text.
        text: String,
    },
    /// The request failed.
    Failure {
        /// Failure classification.
        reason: FailureReason,
        /// Failure message surfaced to the caller.
        message: String,
    },
}

impl Outcome {
    /// Returns the timeout failure outcome.
    #[must_use]
    pub fn timed_out() -> Self {
        Self::Failure {
            reason: FailureReason::TimedOut,
            message: TIMEOUT_MESSAGE.to_string(),
        }
    }

    /// Returns true for [`Outcome::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the response text or failure message.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Success {
                text,
            } => text,
            Self::Failure {
                message, ..
            } => message,
        }
    }

    /// Returns the failure reason, if any.
    #[must_use]
    pub const fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::Success { .. } => None,
            Self::Failure {
                reason, ..
            } => Some(*reason),
        }
    }
}

impl From<Answer> for Outcome {
    fn from(answer: Answer) -> Self {
        if answer.is_error {
            Self::Failure {
                reason: FailureReason::HumanSignaled,
                message: answer.payload,
            }
        } else {
            Self::Success {
                text: answer.payload,
            }
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors returned by broker operations.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// The request is not pending (answered, timed out, or never existed).
    #[error("request not found: {0}")]
    NotFound(RequestId),
    /// Shared broker state could not be accessed.
    #[error("broker internal error: {0}")]
    Internal(String),
}

// ============================================================================
// SECTION: Settings and Stats
// ============================================================================

/// Broker-wide settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerSettings {
    /// Time each request waits for an answer.
    pub deadline: Duration,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
        }
    }
}

/// Point-in-time broker counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BrokerStats {
    /// Requests currently waiting.
    pub pending: usize,
    /// Answers delivered to a waiting caller.
    pub answered: u64,
    /// Answers refused as not found.
    pub rejected: u64,
    /// Requests that reached their deadline.
    pub timed_out: u64,
    /// Requests released because the caller went away.
    pub cancelled: u64,
}

/// Monotonic counters backing [`BrokerStats`].
#[derive(Default)]
struct Counters {
    /// Delivered answers.
    answered: AtomicU64,
    /// Rejected answers.
    rejected: AtomicU64,
    /// Deadline expirations.
    timed_out: AtomicU64,
    /// Cancelled waits.
    cancelled: AtomicU64,
}

// ============================================================================
// SECTION: Broker
// ============================================================================

/// Shared broker state.
struct BrokerInner {
    /// Pending requests and their handoffs.
    registry: RequestRegistry,
    /// Broker-wide settings.
    settings: BrokerSettings,
    /// Lifecycle observer.
    events: Arc<dyn RequestEventSink>,
    /// Resolution counters.
    counters: Counters,
}

impl BrokerInner {
    /// Emits a lifecycle event to the configured sink.
    fn emit(
        &self,
        kind: RequestEventKind,
        request_id: RequestId,
        tool_name: Option<&str>,
        is_error: Option<bool>,
    ) {
        self.events.record(&RequestEvent {
            kind,
            request_id,
            tool_name: tool_name.map(str::to_string),
            is_error,
        });
    }
}

/// Broker bridging tool calls to human answers.
///
/// Cloning is cheap; clones share the same registry.
#[derive(Clone)]
pub struct PendingRequestBroker {
    /// Shared state.
    inner: Arc<BrokerInner>,
}

impl PendingRequestBroker {
    /// Creates a broker that discards lifecycle events.
    #[must_use]
    pub fn new(settings: BrokerSettings) -> Self {
        Self::with_event_sink(settings, Arc::new(NoopRequestEventSink))
    }

    /// Creates a broker reporting lifecycle events to `events`.
    #[must_use]
    pub fn with_event_sink(settings: BrokerSettings, events: Arc<dyn RequestEventSink>) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                registry: RequestRegistry::new(),
                settings,
                events,
                counters: Counters::default(),
            }),
        }
    }

    /// Returns the broker-wide deadline.
    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.inner.settings.deadline
    }

    /// Submits a tool call and waits for its outcome using the broker deadline.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Internal`] when the request cannot be registered.
    pub async fn submit(
        &self,
        tool_name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Result<Outcome, BrokerError> {
        self.submit_with_deadline(tool_name, arguments, self.inner.settings.deadline).await
    }

    /// Submits a tool call and waits at most `deadline` for its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Internal`] when the request cannot be registered.
    pub async fn submit_with_deadline(
        &self,
        tool_name: impl Into<String>,
        arguments: Map<String, Value>,
        deadline: Duration,
    ) -> Result<Outcome, BrokerError> {
        let entry = RequestEntry::new(RequestId::generate(), tool_name, arguments);
        let id = entry.id;
        let tool_name = entry.tool_name.clone();
        let (handoff, mut receiver) = oneshot::channel::<Answer>();
        self.inner.registry.insert(entry, handoff)?;
        self.inner.emit(RequestEventKind::Queued, id, Some(&tool_name), None);
        let mut guard = PendingGuard {
            inner: Arc::clone(&self.inner),
            id,
            armed: true,
        };

        let resolved = match tokio::time::timeout(deadline, &mut receiver).await {
            Ok(delivered) => delivered.ok(),
            Err(_elapsed) => {
                if self.inner.registry.remove(&id).is_some() {
                    guard.armed = false;
                    self.inner.counters.timed_out.fetch_add(1, Ordering::Relaxed);
                    self.inner.emit(RequestEventKind::TimedOut, id, Some(&tool_name), None);
                    return Ok(Outcome::timed_out());
                }
                // The answer side already removed the entry; its send follows immediately.
                receiver.await.ok()
            }
        };
        guard.armed = false;

        Ok(resolved.map_or_else(
            || Outcome::Failure {
                reason: FailureReason::Withdrawn,
                message: WITHDRAWN_MESSAGE.to_string(),
            },
            Outcome::from,
        ))
    }

    /// Resolves a pending request with an operator answer.
    ///
    /// Removal from the registry and delivery form one step: once this call
    /// removes the entry, no other answer or timeout can resolve it.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::NotFound`] when the request is not pending or its
    /// caller is no longer waiting.
    pub fn answer(&self, id: &RequestId, answer: Answer) -> Result<(), BrokerError> {
        let Some((entry, handoff)) = self.inner.registry.take(id) else {
            self.reject(*id, None);
            return Err(BrokerError::NotFound(*id));
        };
        let is_error = answer.is_error;
        if handoff.send(answer).is_err() {
            self.reject(*id, Some(&entry.tool_name));
            return Err(BrokerError::NotFound(*id));
        }
        self.inner.counters.answered.fetch_add(1, Ordering::Relaxed);
        self.inner.emit(RequestEventKind::Answered, *id, Some(&entry.tool_name), Some(is_error));
        Ok(())
    }

    /// Lists pending requests, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Internal`] when the registry cannot be read.
    pub fn list_pending(&self) -> Result<Vec<RequestEntry>, BrokerError> {
        self.inner.registry.snapshot()
    }

    /// Returns current broker counters.
    #[must_use]
    pub fn stats(&self) -> BrokerStats {
        let counters = &self.inner.counters;
        BrokerStats {
            pending: self.inner.registry.len(),
            answered: counters.answered.load(Ordering::Relaxed),
            rejected: counters.rejected.load(Ordering::Relaxed),
            timed_out: counters.timed_out.load(Ordering::Relaxed),
            cancelled: counters.cancelled.load(Ordering::Relaxed),
        }
    }

    /// Returns true when the request is still pending.
    #[must_use]
    pub fn is_pending(&self, id: &RequestId) -> bool {
        self.inner.registry.contains(id)
    }

    /// Records a rejected answer.
    fn reject(&self, id: RequestId, tool_name: Option<&str>) {
        self.inner.counters.rejected.fetch_add(1, Ordering::Relaxed);
        self.inner.emit(RequestEventKind::AnswerRejected, id, tool_name, None);
    }
}

/// Releases a pending entry when its `submit` future is dropped early.
struct PendingGuard {
    /// Shared broker state.
    inner: Arc<BrokerInner>,
    /// Guarded request.
    id: RequestId,
    /// False once the request resolved through a normal path.
    armed: bool,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(entry) = self.inner.registry.remove(&self.id) {
            self.inner.counters.cancelled.fetch_add(1, Ordering::Relaxed);
            self.inner.emit(RequestEventKind::Cancelled, self.id, Some(&entry.tool_name), None);
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
