//! The listener registry itself.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, trace};

use super::model::{ListenerConnectionState, PostedItem, RemovalReason};
use super::ranking::RankingSnapshot;

/// Capability interface the upstream event source calls into.
///
/// The registry implements this trait; an upstream adapter holds a
/// reference and invokes it as notifications arrive. Connect/disconnect
/// calls are totally ordered on the producer side - the registry defends
/// readers against writers, not writers against each other.
pub trait EventSink: Send + Sync {
    /// The listener is now active.
    fn connected(&self);

    /// The listener has been detached from the event source.
    fn disconnected(&self);

    /// An item was posted, together with the ranking snapshot current at
    /// the time of the post.
    fn item_posted(&self, item: PostedItem, ranking: RankingSnapshot);

    /// An item was removed with an opaque reason code.
    fn item_removed(&self, item: PostedItem, ranking: RankingSnapshot, reason: RemovalReason);

    /// The platform-wide ranking changed without an item lifecycle event.
    fn ranking_updated(&self, ranking: RankingSnapshot);
}

/// Configuration for [`ListenerRegistry`].
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Source identifiers whose events are ingested from the start.
    ///
    /// The allow-list remains mutable at runtime via
    /// [`ListenerRegistry::add_allowed_source`].
    pub allowed_sources: Vec<String>,
}

/// Internal state, guarded by a single lock.
///
/// All maps are updated together under the write lock so queries observe
/// whole-snapshot-consistent state.
struct RegistryState {
    /// Sources whose events are ingested; all others are dropped.
    allowed_sources: HashSet<String>,

    /// Live items by key.
    live: HashMap<String, PostedItem>,

    /// Removal history: key of a removed item mapped to its reason code.
    removed: HashMap<String, RemovalReason>,

    /// Interception flag per key, recomputed on every snapshot replacement.
    intercepted: HashMap<String, bool>,

    /// The current ranking snapshot.
    ranking: RankingSnapshot,
}

impl RegistryState {
    fn new(config: RegistryConfig) -> Self {
        Self {
            allowed_sources: config.allowed_sources.into_iter().collect(),
            live: HashMap::new(),
            removed: HashMap::new(),
            intercepted: HashMap::new(),
            ranking: RankingSnapshot::default(),
        }
    }
}

/// Tracks listener connection state and a consistent view of posted items,
/// removal history, and interception flags.
///
/// Single-writer, many-reader: mutating notifications take the write lock,
/// queries clone what they need under the read lock. Connection state is
/// mirrored through a watch channel so [`ListenerRegistry::await_instance`]
/// callers get a happens-before edge on everything written before
/// [`EventSink::connected`] fired.
pub struct ListenerRegistry {
    /// Thread-safe state behind the registry's single lock.
    state: RwLock<RegistryState>,

    /// Connection-state signal for `await_instance` waiters.
    connection_tx: watch::Sender<ListenerConnectionState>,
}

impl ListenerRegistry {
    /// Create a new registry with the given configuration.
    pub fn new(config: RegistryConfig) -> Self {
        let (connection_tx, _) = watch::channel(ListenerConnectionState::Disconnected);
        Self {
            state: RwLock::new(RegistryState::new(config)),
            connection_tx,
        }
    }

    /// Create a registry with default configuration (empty allow-list).
    pub fn with_defaults() -> Self {
        Self::new(RegistryConfig::default())
    }

    // === Connection state ===

    /// Current connection state.
    pub fn connection_state(&self) -> ListenerConnectionState {
        *self.connection_tx.borrow()
    }

    /// Wait up to `timeout` for the listener to be connected.
    ///
    /// Returns a handle to the registry once connected, or `None` on
    /// timeout. A non-`None` return guarantees visibility of all state set
    /// before the corresponding [`EventSink::connected`] call.
    pub async fn await_instance(self: &Arc<Self>, timeout: Duration) -> Option<Arc<Self>> {
        let mut rx = self.connection_tx.subscribe();
        let wait = rx.wait_for(|state| *state == ListenerConnectionState::Connected);

        let result = match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(_)) => Some(Arc::clone(self)),
            // The sender lives in `self`, so this arm is unreachable while
            // the caller holds the Arc.
            Ok(Err(_)) => None,
            Err(_) => {
                debug!(timeout_ms = timeout.as_millis() as u64, "await_instance timed out");
                None
            }
        };
        result
    }

    /// Signal that the listener is now active. Idempotent.
    pub fn on_connected(&self) {
        let changed = self.connection_tx.send_if_modified(|state| {
            if *state == ListenerConnectionState::Connected {
                false
            } else {
                *state = ListenerConnectionState::Connected;
                true
            }
        });
        if changed {
            debug!("listener connected");
        }
    }

    /// Signal that the listener has been detached. Subsequent
    /// `await_instance` calls block until the next connect.
    pub fn on_disconnected(&self) {
        let changed = self.connection_tx.send_if_modified(|state| {
            if *state == ListenerConnectionState::Disconnected {
                false
            } else {
                *state = ListenerConnectionState::Disconnected;
                true
            }
        });
        if changed {
            debug!("listener disconnected");
        }
    }

    // === Allow-list ===

    /// Add a source identifier to the ingestion allow-list.
    pub fn add_allowed_source(&self, source_id: impl Into<String>) {
        if let Ok(mut state) = self.state.write() {
            let source_id = source_id.into();
            trace!(source = %source_id, "source allowed");
            state.allowed_sources.insert(source_id);
        }
    }

    /// Remove a source identifier from the ingestion allow-list.
    pub fn remove_allowed_source(&self, source_id: &str) {
        if let Ok(mut state) = self.state.write() {
            trace!(source = %source_id, "source disallowed");
            state.allowed_sources.remove(source_id);
        }
    }

    /// Whether events from this source are currently ingested.
    pub fn is_source_allowed(&self, source_id: &str) -> bool {
        self.state
            .read()
            .map(|s| s.allowed_sources.contains(source_id))
            .unwrap_or(false)
    }

    // === Ingestion ===

    /// Record a posted item and refresh the ranking snapshot.
    ///
    /// Items with an empty key are treated as malformed upstream noise and
    /// dropped. Items from sources not on the allow-list are dropped
    /// silently (debug-logged, never surfaced as an error).
    pub fn on_item_posted(&self, item: PostedItem, ranking: RankingSnapshot) {
        if item.key.is_empty() {
            debug!("dropping malformed posted item with empty key");
            return;
        }

        if let Ok(mut state) = self.state.write() {
            if !state.allowed_sources.contains(&item.source_id) {
                debug!(
                    key = %item.key,
                    source = %item.source_id,
                    "dropping posted item from disallowed source"
                );
                return;
            }

            trace!(key = %item.key, source = %item.source_id, "item posted");
            state.live.insert(item.key.clone(), item);
            Self::apply_ranking(&mut state, ranking);
        }
    }

    /// Record an item removal and refresh the ranking snapshot.
    ///
    /// Same allow-list filter as [`Self::on_item_posted`]. The key moves
    /// from the live set into the removal history.
    pub fn on_item_removed(&self, item: PostedItem, ranking: RankingSnapshot, reason: RemovalReason) {
        if item.key.is_empty() {
            debug!("dropping malformed removed item with empty key");
            return;
        }

        if let Ok(mut state) = self.state.write() {
            if !state.allowed_sources.contains(&item.source_id) {
                debug!(
                    key = %item.key,
                    source = %item.source_id,
                    "dropping removed item from disallowed source"
                );
                return;
            }

            trace!(key = %item.key, reason = %reason, "item removed");
            state.live.remove(&item.key);
            state.removed.insert(item.key.clone(), reason);
            Self::apply_ranking(&mut state, ranking);
        }
    }

    /// Replace the current ranking snapshot and recompute interception
    /// flags.
    ///
    /// Not subject to the allow-list filter: ranking updates apply
    /// platform-wide.
    pub fn on_ranking_updated(&self, ranking: RankingSnapshot) {
        if let Ok(mut state) = self.state.write() {
            trace!(entries = ranking.len(), "ranking updated");
            Self::apply_ranking(&mut state, ranking);
        }
    }

    /// Clear the live set, removal history, and interception flags.
    ///
    /// Connection state and the allow-list survive. The current ranking
    /// snapshot object is left in place. Idempotent.
    pub fn reset_data(&self) {
        if let Ok(mut state) = self.state.write() {
            debug!(
                live = state.live.len(),
                removed = state.removed.len(),
                "registry data reset"
            );
            state.live.clear();
            state.removed.clear();
            state.intercepted.clear();
        }
    }

    /// Install the new snapshot and recompute flags for every key it
    /// carries. Keys absent from the new snapshot keep their prior flag.
    fn apply_ranking(state: &mut RegistryState, ranking: RankingSnapshot) {
        for entry in ranking.entries() {
            state
                .intercepted
                .insert(entry.key().to_string(), entry.intercepted());
        }
        state.ranking = ranking;
    }

    // === Queries ===

    /// Interception flag for a key, if one has ever been computed for it.
    pub fn intercepted(&self, key: &str) -> Option<bool> {
        self.state
            .read()
            .ok()
            .and_then(|s| s.intercepted.get(key).copied())
    }

    /// All interception flags, cloned under a single read lock.
    ///
    /// The clone is whole-snapshot consistent: it can never mix flags from
    /// two different ranking snapshots.
    pub fn intercepted_flags(&self) -> HashMap<String, bool> {
        self.state
            .read()
            .map(|s| s.intercepted.clone())
            .unwrap_or_default()
    }

    /// The live item for a key, if present.
    pub fn live_item(&self, key: &str) -> Option<PostedItem> {
        self.state.read().ok().and_then(|s| s.live.get(key).cloned())
    }

    /// Keys of all live items.
    pub fn live_keys(&self) -> Vec<String> {
        self.state
            .read()
            .map(|s| s.live.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of live items.
    pub fn live_count(&self) -> usize {
        self.state.read().map(|s| s.live.len()).unwrap_or(0)
    }

    /// The reason recorded when `key` was removed, if it was.
    pub fn removal_reason(&self, key: &str) -> Option<RemovalReason> {
        self.state
            .read()
            .ok()
            .and_then(|s| s.removed.get(key).copied())
    }

    /// The current ranking snapshot.
    pub fn ranking(&self) -> RankingSnapshot {
        self.state
            .read()
            .map(|s| s.ranking.clone())
            .unwrap_or_default()
    }
}

impl EventSink for ListenerRegistry {
    fn connected(&self) {
        self.on_connected();
    }

    fn disconnected(&self) {
        self.on_disconnected();
    }

    fn item_posted(&self, item: PostedItem, ranking: RankingSnapshot) {
        self.on_item_posted(item, ranking);
    }

    fn item_removed(&self, item: PostedItem, ranking: RankingSnapshot, reason: RemovalReason) {
        self.on_item_removed(item, ranking, reason);
    }

    fn ranking_updated(&self, ranking: RankingSnapshot) {
        self.on_ranking_updated(ranking);
    }
}
