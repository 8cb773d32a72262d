//! Core data types for the listener registry.

use std::fmt;

/// Connection state of the registered listener.
///
/// Transitions only on external connect/disconnect notifications; client
/// code observes this state but never sets it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerConnectionState {
    /// The listener is not connected to the upstream event source.
    Disconnected,
    /// The listener is connected and receiving events.
    Connected,
}

impl ListenerConnectionState {
    /// Returns a string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            ListenerConnectionState::Disconnected => "disconnected",
            ListenerConnectionState::Connected => "connected",
        }
    }
}

/// A tracked event-bearing entity posted by the upstream source.
///
/// Items are never mutated in place: a "removed" notification deletes the
/// entry from the live set, though its key may remain in the removed
/// history for later inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedItem {
    /// Unique key within the registry's lifetime.
    pub key: String,
    /// Identifies the origin/package of the item.
    pub source_id: String,
    /// Opaque payload carried with the item.
    pub payload: Vec<u8>,
}

impl PostedItem {
    /// Create a new item with an empty payload.
    pub fn new(key: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            source_id: source_id.into(),
            payload: Vec::new(),
        }
    }

    /// Attach an opaque payload to the item.
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }
}

/// Opaque reason code recorded when an item is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RemovalReason(pub i32);

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reason({})", self.0)
    }
}
