// crates/human-relay-core/src/registry.rs
// ============================================================================
// Module: Request Registry
// Description: Concurrent map of requests still waiting on a human.
// Purpose: Single source of truth for "what is waiting" plus its handoff slots.
// Dependencies: serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! [`RequestRegistry`] holds every unanswered [`RequestEntry`] together with
//! the one-shot sender that resolves its waiting caller. Removal is the only
//! way to resolve a request, so whichever path removes an id first (answer or
//! deadline) owns the resolution; every later caller observes absence.
//!
//! Invariants:
//! - At most one entry exists per [`RequestId`].
//! - The map lock is held only for the map operation itself, never across an
//!   await point or a channel send.
//! - Snapshots are ordered by insertion sequence (oldest first).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::broker::Answer;
use crate::broker::BrokerError;
use crate::identifiers::RequestId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Sending half of a per-request resolution handoff.
pub type AnswerHandoff = oneshot::Sender<Answer>;

/// A tool invocation waiting for a human answer.
///
/// # Invariants
/// - `arguments` are opaque to the broker and keep their original key order.
/// - `created_at` is display metadata only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEntry {
    /// Unique request identifier.
    pub id: RequestId,
    /// Name of the invoked tool.
    pub tool_name: String,
    /// Tool arguments as supplied by the agent.
    pub arguments: Map<String, Value>,
    /// Submission time.
    pub created_at: Timestamp,
}

impl RequestEntry {
    /// Creates a new entry stamped with the current time.
    #[must_use]
    pub fn new(id: RequestId, tool_name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id,
            tool_name: tool_name.into(),
            arguments,
            created_at: Timestamp::now(),
        }
    }
}

/// Registry slot pairing an entry with its resolution handoff.
struct Slot {
    /// Insertion order used for stable snapshots.
    sequence: u64,
    /// Request metadata shown to the operator.
    entry: RequestEntry,
    /// Sender that wakes the waiting caller.
    handoff: AnswerHandoff,
}

/// Lock-protected registry state.
#[derive(Default)]
struct RegistryState {
    /// Next insertion sequence number.
    next_sequence: u64,
    /// Pending slots keyed by request id.
    slots: HashMap<RequestId, Slot>,
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Thread-safe registry of pending requests.
#[derive(Default)]
pub struct RequestRegistry {
    /// Registry state guarded by a short-lived lock.
    state: Mutex<RegistryState>,
}

impl RequestRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new pending entry with its resolution handoff.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Internal`] when the registry lock is poisoned or
    /// the id is already registered.
    pub fn insert(&self, entry: RequestEntry, handoff: AnswerHandoff) -> Result<(), BrokerError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| BrokerError::Internal("request registry lock poisoned".to_string()))?;
        if state.slots.contains_key(&entry.id) {
            return Err(BrokerError::Internal(format!("duplicate request id {}", entry.id)));
        }
        let sequence = state.next_sequence;
        state.next_sequence = state.next_sequence.saturating_add(1);
        state.slots.insert(
            entry.id,
            Slot {
                sequence,
                entry,
                handoff,
            },
        );
        Ok(())
    }

    /// Atomically removes an entry and returns it with its handoff.
    ///
    /// Only the first caller for a given id receives `Some`.
    pub fn take(&self, id: &RequestId) -> Option<(RequestEntry, AnswerHandoff)> {
        self.lock_recovering().slots.remove(id).map(|slot| (slot.entry, slot.handoff))
    }

    /// Atomically removes an entry, dropping its handoff.
    ///
    /// A waiting caller whose handoff is dropped this way resolves as
    /// withdrawn.
    pub fn remove(&self, id: &RequestId) -> Option<RequestEntry> {
        self.take(id).map(|(entry, _)| entry)
    }

    /// Returns a point-in-time copy of all pending entries, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Internal`] when the registry lock is poisoned.
    pub fn snapshot(&self) -> Result<Vec<RequestEntry>, BrokerError> {
        let mut ordered: Vec<(u64, RequestEntry)> = {
            let state = self
                .state
                .lock()
                .map_err(|_| BrokerError::Internal("request registry lock poisoned".to_string()))?;
            state.slots.values().map(|slot| (slot.sequence, slot.entry.clone())).collect()
        };
        ordered.sort_by_key(|(sequence, _)| *sequence);
        Ok(ordered.into_iter().map(|(_, entry)| entry).collect())
    }

    /// Returns true when the id is currently pending.
    #[must_use]
    pub fn contains(&self, id: &RequestId) -> bool {
        self.lock_recovering().slots.contains_key(id)
    }

    /// Returns the number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_recovering().slots.len()
    }

    /// Returns true when nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Locks the state, recovering the map from a poisoned lock.
    ///
    /// Removal paths must keep working so in-flight callers can still drain.
    fn lock_recovering(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
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
        reason = "Test-only assertions on registry behavior."
    )]

    use serde_json::Map;
    use serde_json::json;
    use tokio::sync::oneshot;

    use super::RequestEntry;
    use super::RequestRegistry;
    use crate::broker::Answer;
    use crate::identifiers::RequestId;

    fn entry(tool: &str) -> RequestEntry {
        let mut arguments = Map::new();
        arguments.insert("question".to_string(), json!("Proceed?"));
        RequestEntry::new(RequestId::generate(), tool, arguments)
    }

    #[test]
    fn take_is_exactly_once() {
        let registry = RequestRegistry::new();
        let pending = entry("ask_human");
        let id = pending.id;
        let (tx, _rx) = oneshot::channel::<Answer>();
        registry.insert(pending, tx).expect("insert");

        assert!(registry.take(&id).is_some());
        assert!(registry.take(&id).is_none());
        assert!(registry.remove(&id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn insert_rejects_duplicate_id() {
        let registry = RequestRegistry::new();
        let pending = entry("ask_human");
        let duplicate = pending.clone();
        let (tx1, _rx1) = oneshot::channel::<Answer>();
        let (tx2, _rx2) = oneshot::channel::<Answer>();
        registry.insert(pending, tx1).expect("insert");
        assert!(registry.insert(duplicate, tx2).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn snapshot_is_ordered_by_insertion() {
        let registry = RequestRegistry::new();
        let mut expected = Vec::new();
        let mut receivers = Vec::new();
        for tool in ["ask_human", "human_search", "human_decision", "ask_human"] {
            let pending = entry(tool);
            expected.push(pending.id);
            let (tx, rx) = oneshot::channel::<Answer>();
            receivers.push(rx);
            registry.insert(pending, tx).expect("insert");
        }
        let ids: Vec<RequestId> =
            registry.snapshot().expect("snapshot").into_iter().map(|e| e.id).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn remove_drops_handoff() {
        let registry = RequestRegistry::new();
        let pending = entry("ask_human");
        let id = pending.id;
        let (tx, mut rx) = oneshot::channel::<Answer>();
        registry.insert(pending, tx).expect("insert");
        let removed = registry.remove(&id).expect("removed");
        assert_eq!(removed.id, id);
        assert!(rx.try_recv().is_err());
        assert!(!registry.contains(&id));
    }
}
