// crates/human-relay-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared helpers for human-relay-core integration tests.
// Purpose: Provide argument builders, event recording, and pending-wait helpers.
// Dependencies: human-relay-core, serde_json, tokio
// ============================================================================

//! ## Overview
//! Shared helpers for broker tests: argument maps, a recording event sink,
//! and a cooperative wait for requests to become visible.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

use std::sync::Arc;
use std::sync::Mutex;

use human_relay_core::PendingRequestBroker;
use human_relay_core::RequestEntry;
use human_relay_core::RequestEvent;
use human_relay_core::RequestEventKind;
use human_relay_core::RequestEventSink;
use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Argument Helpers
// ============================================================================

/// Builds an argument map from key/value string pairs.
pub fn args(pairs: &[(&str, &str)]) -> Map<String, Value> {
    pairs.iter().map(|(key, value)| ((*key).to_string(), Value::String((*value).to_string()))).collect()
}

// ============================================================================
// SECTION: Event Recording
// ============================================================================

/// Event sink that keeps every event in memory.
#[derive(Default)]
pub struct RecordingSink {
    /// Recorded events in emission order.
    events: Mutex<Vec<RequestEvent>>,
}

impl RecordingSink {
    /// Creates a shared recording sink.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns recorded event kinds in order.
    pub fn kinds(&self) -> Vec<RequestEventKind> {
        self.events.lock().unwrap().iter().map(|event| event.kind).collect()
    }

    /// Returns a copy of all recorded events.
    pub fn events(&self) -> Vec<RequestEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl RequestEventSink for RecordingSink {
    fn record(&self, event: &RequestEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ============================================================================
// SECTION: Pending Helpers
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
