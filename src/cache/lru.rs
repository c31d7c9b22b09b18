//! LRU Tracker Module
//!
//! Least Recently Used bookkeeping for capacity eviction in the in-process store.

use std::collections::{BTreeMap, HashMap};

// == LRU Tracker ==
/// Tracks access recency for LRU eviction.
///
/// Every touch stamps the key with a monotonically increasing tick; the
/// smallest tick is the least recently used key.
#[derive(Debug, Default)]
pub struct LruTracker {
    /// Tick -> key, ordered oldest first
    order: BTreeMap<u64, String>,
    /// Key -> its current tick
    ticks: HashMap<String, u64>,
    next_tick: u64,
}

impl LruTracker {
    // == Touch ==
    /// Marks a key as most recently used.
    pub fn touch(&mut self, key: &str) {
        let tick = self.next_tick;
        self.next_tick += 1;

        if let Some(previous) = self.ticks.insert(key.to_string(), tick) {
            self.order.remove(&previous);
        }
        self.order.insert(tick, key.to_string());
    }

    // == Remove ==
    /// Stops tracking a key.
    pub fn remove(&mut self, key: &str) {
        if let Some(tick) = self.ticks.remove(key) {
            self.order.remove(&tick);
        }
    }

    // == Evict Oldest ==
    /// Returns and forgets the least recently used key.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.ticks.remove(&key);
        Some(key)
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.ticks.clear();
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_empty() {
        let mut lru = LruTracker::default();
        assert_eq!(lru.evict_oldest(), None);
    }

    #[test]
    fn test_lru_touch_existing_key_moves_to_back_of_queue() {
        let mut lru = LruTracker::default();

        lru.touch("p:1");
        lru.touch("p:2");
        lru.touch("p:3");
        lru.touch("p:1");

        assert_eq!(lru.evict_oldest().as_deref(), Some("p:2"));
        assert_eq!(lru.evict_oldest().as_deref(), Some("p:3"));
        assert_eq!(lru.evict_oldest().as_deref(), Some("p:1"));
    }

    #[test]
    fn test_lru_evict_order() {
        let mut lru = LruTracker::default();

        lru.touch("a");
        lru.touch("b");
        lru.touch("c");
        lru.touch("a");
        lru.touch("c");
        lru.touch("b");

        assert_eq!(lru.evict_oldest().as_deref(), Some("a"));
        assert_eq!(lru.evict_oldest().as_deref(), Some("c"));
        assert_eq!(lru.evict_oldest().as_deref(), Some("b"));
        assert_eq!(lru.evict_oldest(), None);
    }

    #[test]
    fn test_lru_remove() {
        let mut lru = LruTracker::default();

        lru.touch("key1");
        lru.touch("key2");
        lru.remove("key1");
        lru.remove("missing");

        assert_eq!(lru.evict_oldest().as_deref(), Some("key2"));
        assert_eq!(lru.evict_oldest(), None);
    }

    #[test]
    fn test_lru_repeated_touch_tracks_once() {
        let mut lru = LruTracker::default();

        lru.touch("key1");
        lru.touch("key1");
        lru.touch("key1");
        assert_eq!(lru.evict_oldest().as_deref(), Some("key1"));
        assert_eq!(lru.evict_oldest(), None);

        lru.touch("key2");
        lru.clear();
        assert_eq!(lru.evict_oldest(), None);
    }
}
