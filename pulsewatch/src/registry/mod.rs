//! Event-listener state registry.
//!
//! The registry maintains a consistent, queryable view of "live" and
//! "removed" items and their ranking/interception status, fed by
//! asynchronous connect/disconnect and item-lifecycle notifications from an
//! upstream event source. It is safe to query from any thread.
//!
//! Ingestion is filtered by a mutable allow-list of source identifiers:
//! events from sources not on the list are dropped silently (logged at
//! debug, never surfaced as errors).

mod core;
mod model;
mod ranking;

pub use self::core::{EventSink, ListenerRegistry, RegistryConfig};
pub use model::{ListenerConnectionState, PostedItem, RemovalReason};
pub use ranking::{RankingEntry, RankingSnapshot};
