// crates/human-relay-core/src/lib.rs
// ============================================================================
// Module: Human Relay Core
// Description: Pending request broker between tool calls and a human operator.
// Purpose: Accept tool invocations, expose them for inspection, and resolve each once.
// Dependencies: serde, serde_json, thiserror, time, tokio, uuid
// ============================================================================

//! ## Overview
//! Human Relay Core holds the only stateful logic of the relay: the
//! [`RequestRegistry`] of requests waiting on a human and the
//! [`PendingRequestBroker`] that blocks each tool call until the operator
//! answers or the deadline expires. Transports and presentation live in
//! `human-relay-mcp`; this crate performs no I/O.
//!
//! Invariants:
//! - Each request resolves exactly once: success, operator error, or timeout.
//! - Late answers are rejected as not found.
//! - Nothing is persisted; a restart drops all pending work.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod broker;
pub mod events;
pub mod identifiers;
pub mod registry;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use broker::Answer;
pub use broker::BrokerError;
pub use broker::BrokerSettings;
pub use broker::BrokerStats;
pub use broker::DEFAULT_DEADLINE;
pub use broker::FailureReason;
pub use broker::Outcome;
pub use broker::PendingRequestBroker;
pub use broker::TIMEOUT_MESSAGE;
pub use broker::WITHDRAWN_MESSAGE;
pub use events::NoopRequestEventSink;
pub use events::RequestEvent;
pub use events::RequestEventKind;
pub use events::RequestEventSink;
pub use identifiers::InvalidRequestId;
pub use identifiers::RequestId;
pub use registry::AnswerHandoff;
pub use registry::RequestEntry;
pub use registry::RequestRegistry;
pub use time::Timestamp;
