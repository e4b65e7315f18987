// crates/human-relay-core/src/events.rs
// ============================================================================
// Module: Request Lifecycle Events
// Description: Observer interface for pending request transitions.
// Purpose: Let hosts log broker activity without coupling the core to I/O.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The broker reports every lifecycle transition (`Pending` entry created,
//! answered, rejected answer, timed out, cancelled) to a [`RequestEventSink`].
//! Events carry identifiers and names only; argument values and answer text
//! are never included.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

use crate::identifiers::RequestId;

// ============================================================================
// SECTION: Event Types
// ============================================================================

/// Lifecycle transition classification.
///
/// # Invariants
/// - Variants are stable for log labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestEventKind {
    /// Request registered and visible to the operator.
    Queued,
    /// Answer accepted and delivered to the waiting caller.
    Answered,
    /// Answer refused because the request was no longer pending.
    AnswerRejected,
    /// Deadline elapsed before an answer arrived.
    TimedOut,
    /// Waiting caller went away before resolution.
    Cancelled,
}

impl RequestEventKind {
    /// Returns a stable label for the transition.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Answered => "answered",
            Self::AnswerRejected => "answer_rejected",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Lifecycle event emitted by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestEvent {
    /// Transition kind.
    pub kind: RequestEventKind,
    /// Request the transition applies to.
    pub request_id: RequestId,
    /// Tool name when known at the emission site.
    pub tool_name: Option<String>,
    /// Whether the delivered answer was an operator-signaled error.
    pub is_error: Option<bool>,
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Observer for broker lifecycle events.
pub trait RequestEventSink: Send + Sync {
    /// Records a lifecycle event.
    fn record(&self, event: &RequestEvent);
}

/// Event sink that discards everything.
pub struct NoopRequestEventSink;

impl RequestEventSink for NoopRequestEventSink {
    fn record(&self, _event: &RequestEvent) {}
}
