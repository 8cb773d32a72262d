//! Ranking snapshots.
//!
//! A ranking snapshot is an atomic, ordered view of all currently known
//! items and their metadata at a point in time. Exactly one snapshot is
//! current in a registry; every ranking update replaces it wholesale so a
//! reader never observes a half-old, half-new mix.

/// Per-key ranking metadata within a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingEntry {
    key: String,
    rank: usize,
    matches_interruption_filter: bool,
}

impl RankingEntry {
    /// Create a ranking entry.
    pub fn new(key: impl Into<String>, rank: usize, matches_interruption_filter: bool) -> Self {
        Self {
            key: key.into(),
            rank,
            matches_interruption_filter,
        }
    }

    /// The item key this entry describes.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Rank position within the snapshot's ordering.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Whether the item matches the current interruption filter.
    pub fn matches_interruption_filter(&self) -> bool {
        self.matches_interruption_filter
    }

    /// Whether the item is intercepted (suppressed from presentation).
    ///
    /// Defined as the negation of the interruption-filter match.
    pub fn intercepted(&self) -> bool {
        !self.matches_interruption_filter
    }
}

/// An ordered sequence of ranking entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankingSnapshot {
    entries: Vec<RankingEntry>,
}

impl RankingSnapshot {
    /// Create a snapshot from an ordered list of entries.
    pub fn new(entries: Vec<RankingEntry>) -> Self {
        Self { entries }
    }

    /// The entries in rank order.
    pub fn entries(&self) -> &[RankingEntry] {
        &self.entries
    }

    /// Look up the entry for a key, if present in this snapshot.
    pub fn get(&self, key: &str) -> Option<&RankingEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// The keys in rank order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    /// Number of entries in the snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
