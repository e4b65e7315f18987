// crates/human-relay-core/src/identifiers.rs
// ============================================================================
// Module: Human Relay Identifiers
// Description: Opaque identifiers for pending human requests.
// Purpose: Provide a strongly typed, serializable request identifier.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! Request identifiers are random 128-bit values generated by the broker at
//! submission time. They serialize as their canonical hyphenated string form
//! and are never reused within a process.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Identifier of a single pending human request.
///
/// # Invariants
/// - Generated from a random UUID v4; collisions are not handled.
/// - Wire form is the lowercase hyphenated UUID string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a fresh random request identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID value.
    #[must_use]
    pub const fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for RequestId {
    type Err = InvalidRequestId;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(Self).map_err(|_| InvalidRequestId(value.to_string()))
    }
}

/// Error returned when a string is not a valid request identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid request id: {0}")]
pub struct InvalidRequestId(pub String);

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions on parse results."
    )]

    use super::RequestId;

    #[test]
    fn generated_ids_are_distinct() {
        let first = RequestId::generate();
        let second = RequestId::generate();
        assert_ne!(first, second);
    }

    #[test]
    fn display_round_trips_through_from_str() {
        let id = RequestId::generate();
        let parsed: RequestId = id.to_string().parse().expect("parse id");
        assert_eq!(parsed, id);
    }

    #[test]
    fn from_str_rejects_garbage() {
        let result = "not-a-request".parse::<RequestId>();
        assert!(result.is_err());
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = RequestId::generate();
        let value = serde_json::to_value(id).expect("serialize");
        assert_eq!(value, serde_json::Value::String(id.to_string()));
    }
}
