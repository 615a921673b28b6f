use crate::CacheStats;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use genealogy_core::{Node, NodeId, Source};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// `(source, node id)` pair; renders as `"{source}:{node id}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TeamCountKey {
    pub source: Source,
    pub node_id: NodeId,
}

impl TeamCountKey {
    pub fn new(source: Source, node_id: NodeId) -> Self {
        Self { source, node_id }
    }
}

impl fmt::Display for TeamCountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.node_id)
    }
}

/// A cached team size and how many levels the counted tree covered.
///
/// `depth == None` marks a count from an explicit put (an override or a
/// dedicated fetch) that seeding must not replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamCountRecord {
    pub count: u64,
    pub depth: Option<u32>,
}

/// Per-session memo of team sizes, keyed by source and node id.
///
/// Cloning shares the underlying map, so a cache can be handed to several
/// collaborators of one view while separate views keep separate instances.
/// Entries are never invalidated automatically.
#[derive(Clone, Default)]
pub struct AggregateCache {
    entries: Arc<DashMap<TeamCountKey, TeamCountRecord>>,
    stats: Arc<Mutex<CacheStats>>,
}

impl AggregateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Team size = nodes in the subtree minus the node itself.
    pub fn team_size(node: &Node) -> u64 {
        genealogy_core::team_size(node)
    }

    pub fn get(&self, source: Source, node_id: &NodeId) -> Option<u64> {
        let key = TeamCountKey::new(source, node_id.clone());
        let found = self.entries.get(&key).map(|record| record.count);

        let mut stats = self.stats.lock();
        if found.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        trace!("team count {} {}", key, if found.is_some() { "hit" } else { "miss" });
        found
    }

    /// Overwrite the count for a key; last write wins.
    pub fn put(&self, source: Source, node_id: NodeId, count: u64) {
        self.entries.insert(
            TeamCountKey::new(source, node_id),
            TeamCountRecord { count, depth: None },
        );
    }

    /// Record a count observed in a tree that covered `depth` levels below
    /// and including the node.
    ///
    /// Stores when the key is new or the existing record came from a fetch at
    /// most as deep; returns whether the cache changed.
    pub fn record(&self, source: Source, node_id: NodeId, count: u64, depth: u32) -> bool {
        let record = TeamCountRecord {
            count,
            depth: Some(depth),
        };
        match self.entries.entry(TeamCountKey::new(source, node_id)) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
            Entry::Occupied(mut slot) => match slot.get().depth {
                Some(existing) if existing <= depth => {
                    slot.insert(record);
                    true
                }
                _ => false,
            },
        }
    }

    pub fn record_of(&self, source: Source, node_id: &NodeId) -> Option<TeamCountRecord> {
        self.entries
            .get(&TeamCountKey::new(source, node_id.clone()))
            .map(|record| *record)
    }

    pub fn contains(&self, source: Source, node_id: &NodeId) -> bool {
        self.entries
            .contains_key(&TeamCountKey::new(source, node_id.clone()))
    }

    /// Rendered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().to_string()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.lock().clone();
        stats.entries = self.entries.len();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    #[test]
    fn test_get_and_put() {
        let cache = AggregateCache::new();
        assert_eq!(cache.get(Source::Matrix, &id("A")), None);

        cache.put(Source::Matrix, id("A"), 3);
        assert_eq!(cache.get(Source::Matrix, &id("A")), Some(3));
        assert_eq!(cache.get(Source::Sponsor, &id("A")), None);

        cache.put(Source::Matrix, id("A"), 9);
        assert_eq!(cache.get(Source::Matrix, &id("A")), Some(9));
    }

    #[test]
    fn test_key_format() {
        let cache = AggregateCache::new();
        cache.put(Source::Sponsor, id("42"), 0);
        cache.put(Source::Matrix, id("7"), 1);
        assert_eq!(cache.keys(), vec!["matrix:7", "sponsor:42"]);
    }

    #[test]
    fn test_record_keeps_deeper_observation() {
        let cache = AggregateCache::new();
        assert!(cache.record(Source::Matrix, id("C"), 40, 6));
        // Seen again as a child of a parent fetch: one level shallower.
        assert!(!cache.record(Source::Matrix, id("C"), 12, 5));
        assert_eq!(cache.get(Source::Matrix, &id("C")), Some(40));

        assert!(cache.record(Source::Matrix, id("C"), 41, 6));
        assert_eq!(cache.get(Source::Matrix, &id("C")), Some(41));
    }

    #[test]
    fn test_record_never_replaces_explicit_put() {
        let cache = AggregateCache::new();
        cache.put(Source::Sponsor, id("B"), 120);
        assert!(!cache.record(Source::Sponsor, id("B"), 4, 6));
        assert_eq!(
            cache.record_of(Source::Sponsor, &id("B")),
            Some(TeamCountRecord {
                count: 120,
                depth: None
            })
        );
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = AggregateCache::new();
        let view = cache.clone();
        view.put(Source::Matrix, id("A"), 2);
        assert!(cache.contains(Source::Matrix, &id("A")));

        let separate = AggregateCache::new();
        assert!(separate.is_empty());
    }

    #[test]
    fn test_stats_track_hits_and_misses() {
        let cache = AggregateCache::new();
        cache.put(Source::Matrix, id("A"), 1);
        cache.get(Source::Matrix, &id("A"));
        cache.get(Source::Matrix, &id("B"));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_team_size_of_leaf_is_zero() {
        assert_eq!(AggregateCache::team_size(&Node::new("L", "leaf")), 0);
    }
}
