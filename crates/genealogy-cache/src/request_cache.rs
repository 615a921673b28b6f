use crate::{CacheEntry, CacheStats};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Short-lived memo of successful responses keyed by their full parameter
/// tuple, so repeated identical calls inside the TTL skip the network.
#[derive(Clone)]
pub struct RequestCache<V> {
    entries: Arc<DashMap<String, CacheEntry<V>>>,
    ttl: Duration,
    stats: Arc<Mutex<CacheStats>>,
}

impl<V: Clone> RequestCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
            stats: Arc::new(Mutex::new(CacheStats::default())),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut expired = false;
        let found = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => Some(entry.value.clone()),
            Some(_) => {
                expired = true;
                None
            }
            None => None,
        };

        if expired {
            // Re-check under the write lock; a fresh insert may have landed.
            if self
                .entries
                .remove_if(key, |_, entry| entry.is_expired())
                .is_some()
            {
                self.stats.lock().evictions += 1;
            }
        }

        let mut stats = self.stats.lock();
        if found.is_some() {
            stats.hits += 1;
            debug!("request cache hit: {}", key);
        } else {
            stats.misses += 1;
        }
        found
    }

    /// Store a response. Expired entries under any key are swept first, so
    /// the memo never holds more than one TTL window of distinct requests.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        if self.ttl.is_zero() {
            return;
        }
        self.purge_expired();
        self.entries
            .insert(key.into(), CacheEntry::new(value, Some(self.ttl)));
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drop expired entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.stats.lock().evictions += removed as u64;
        }
        removed
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

    #[test]
    fn test_hit_within_ttl() {
        let cache = RequestCache::new(Duration::from_secs(30));
        cache.insert("matrix|root=A", 1u32);
        assert_eq!(cache.get("matrix|root=A"), Some(1));
        assert_eq!(cache.get("matrix|root=B"), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let cache = RequestCache::new(Duration::from_millis(1));
        cache.insert("k", "v".to_string());
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_purge_expired() {
        let cache = RequestCache::new(Duration::from_millis(1));
        cache.insert("a", 1u8);
        cache.insert("b", 2u8);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_zero_ttl_disables_caching() {
        let cache = RequestCache::new(Duration::ZERO);
        cache.insert("a", 1u8);
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn test_insert_sweeps_expired_entries_of_other_keys() {
        let cache = RequestCache::new(Duration::from_millis(1));
        cache.insert("matrix|root=A", 1u8);
        cache.insert("matrix|root=B", 2u8);
        std::thread::sleep(Duration::from_millis(5));

        cache.insert("matrix|root=C", 3u8);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().evictions, 2);
    }
}
