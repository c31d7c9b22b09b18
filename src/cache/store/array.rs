//! Array Store Module
//!
//! In-process backend combining HashMap storage with LRU tracking and TTL expiration.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::cache::lru::LruTracker;
use crate::cache::{CacheEntry, CacheStats, MAX_VALUE_SIZE};
use crate::error::{CacheError, Result};

use super::Store;

#[derive(Debug, Default)]
struct ArrayState {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Native tag sets, exempt from TTL and eviction
    sets: HashMap<String, BTreeSet<String>>,
    /// LRU access tracker
    lru: LruTracker,
    /// Keys dropped by expiry or eviction, reported by the next purge
    vanished: BTreeSet<String>,
    stats: CacheStats,
}

impl ArrayState {
    /// Returns the live entry for `key`, dropping it first if it has expired.
    fn live_entry(&mut self, key: &str) -> Option<&CacheEntry> {
        if self.entries.get(key).is_some_and(CacheEntry::is_expired) {
            self.remove(key);
            self.vanished.insert(key.to_string());
        }
        self.entries.get(key)
    }

    fn remove(&mut self, key: &str) -> bool {
        self.vanished.remove(key);
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.lru.remove(key);
            self.stats.set_total_entries(self.entries.len());
        }
        removed
    }

    fn insert(&mut self, key: &str, entry: CacheEntry, max_entries: usize) {
        let is_overwrite = self.entries.contains_key(key);

        if !is_overwrite && self.entries.len() >= max_entries {
            if let Some(evicted) = self.lru.evict_oldest() {
                debug!(key = %evicted, "array store evicted least recently used key");
                self.entries.remove(&evicted);
                self.vanished.insert(evicted);
                self.stats.record_eviction();
            }
        }

        self.vanished.remove(key);
        self.entries.insert(key.to_string(), entry);
        self.lru.touch(key);
        self.stats.set_total_entries(self.entries.len());
    }
}

// == Array Store ==
/// Process-local store with LRU eviction and TTL support.
#[derive(Debug)]
pub struct ArrayStore {
    state: Mutex<ArrayState>,
    /// Maximum number of entries allowed
    max_entries: usize,
}

impl ArrayStore {
    // == Constructor ==
    /// Creates an empty store holding at most `max_entries` values.
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: Mutex::new(ArrayState::default()),
            max_entries: max_entries.max(1),
        }
    }

    fn state(&self) -> MutexGuard<'_, ArrayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current number of stored values, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_size(value: &[u8]) -> Result<()> {
        if value.len() > MAX_VALUE_SIZE {
            return Err(CacheError::InvalidRequest(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }
        Ok(())
    }
}

impl Store for ArrayStore {
    fn name(&self) -> &str {
        "array"
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut state = self.state();
        let value = state.live_entry(key).map(|entry| entry.value.clone());
        match value {
            Some(value) => {
                state.stats.record_hit();
                state.lru.touch(key);
                Ok(Some(value))
            }
            None => {
                state.stats.record_miss();
                Ok(None)
            }
        }
    }

    fn put(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        Self::check_size(value)?;
        let mut state = self.state();
        state.insert(key, CacheEntry::new(value.to_vec(), ttl), self.max_entries);
        state.stats.record_write();
        Ok(())
    }

    fn add(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<bool> {
        Self::check_size(value)?;
        let mut state = self.state();
        if state.live_entry(key).is_some() {
            return Ok(false);
        }
        state.insert(key, CacheEntry::new(value.to_vec(), ttl), self.max_entries);
        state.stats.record_write();
        Ok(true)
    }

    fn forget(&self, key: &str) -> Result<bool> {
        let mut state = self.state();
        let live = state.live_entry(key).is_some();
        if live {
            state.remove(key);
            state.stats.record_deletes(1);
        }
        Ok(live)
    }

    fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        let mut state = self.state();
        let (current, expires_at) = match state.live_entry(key) {
            Some(entry) => {
                let text = std::str::from_utf8(&entry.value).ok();
                let current = text.and_then(|t| t.trim().parse::<i64>().ok()).ok_or_else(|| {
                    CacheError::InvalidRequest(format!("Value at '{}' is not an integer", key))
                })?;
                (current, entry.expires_at)
            }
            None => (0, None),
        };

        let next = current.checked_add(delta).ok_or_else(|| {
            CacheError::InvalidRequest(format!("Increment of '{}' overflows", key))
        })?;

        let mut entry = CacheEntry::new(next.to_string().into_bytes(), None);
        entry.expires_at = expires_at;
        state.insert(key, entry, self.max_entries);
        Ok(next)
    }

    fn flush(&self) -> Result<()> {
        let mut state = self.state();
        state.entries.clear();
        state.sets.clear();
        state.lru.clear();
        state.vanished.clear();
        state.stats.set_total_entries(0);
        Ok(())
    }

    fn ping(&self) -> Result<()> {
        Ok(())
    }

    // == Cleanup Expired ==
    fn purge_expired(&self) -> Result<Vec<String>> {
        let mut state = self.state();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            state.remove(key);
        }

        let mut vanished = std::mem::take(&mut state.vanished);
        vanished.extend(expired);
        Ok(vanished.into_iter().collect())
    }

    fn remaining_ttl(&self, key: &str) -> Result<Option<Duration>> {
        let mut state = self.state();
        Ok(state.live_entry(key).and_then(CacheEntry::ttl_remaining))
    }

    fn stats(&self) -> Option<CacheStats> {
        let state = self.state();
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.entries.len());
        Some(stats)
    }

    fn set_add(&self, key: &str, members: &[String]) -> Result<()> {
        let mut state = self.state();
        state
            .sets
            .entry(key.to_string())
            .or_default()
            .extend(members.iter().cloned());
        Ok(())
    }

    fn set_members(&self, key: &str) -> Result<BTreeSet<String>> {
        Ok(self.state().sets.get(key).cloned().unwrap_or_default())
    }

    fn set_remove(&self, key: &str, members: &[String]) -> Result<()> {
        let mut state = self.state();
        if let Some(set) = state.sets.get_mut(key) {
            for member in members {
                set.remove(member);
            }
            if set.is_empty() {
                state.sets.remove(key);
            }
        }
        Ok(())
    }

    fn set_take(&self, key: &str) -> Result<BTreeSet<String>> {
        Ok(self.state().sets.remove(key).unwrap_or_default())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn secs(n: u64) -> Option<Duration> {
        Some(Duration::from_secs(n))
    }

    #[test]
    fn test_store_new() {
        let store = ArrayStore::new(100);
        assert!(store.is_empty());
        assert_eq!(store.name(), "array");
    }

    #[test]
    fn test_store_put_and_get() {
        let store = ArrayStore::new(100);

        store.put("key1", b"value1", secs(300)).unwrap();

        assert_eq!(store.get("key1").unwrap().as_deref(), Some(&b"value1"[..]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_missing_is_none() {
        let store = ArrayStore::new(100);
        assert_eq!(store.get("nonexistent").unwrap(), None);
    }

    #[test]
    fn test_store_forget() {
        let store = ArrayStore::new(100);

        store.put("key1", b"value1", None).unwrap();
        assert!(store.forget("key1").unwrap());
        assert!(!store.forget("key1").unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_add_only_when_absent() {
        let store = ArrayStore::new(100);

        assert!(store.add("k", b"first", None).unwrap());
        assert!(!store.add("k", b"second", None).unwrap());
        assert_eq!(store.get("k").unwrap().as_deref(), Some(&b"first"[..]));
    }

    #[test]
    fn test_store_add_replaces_expired_value() {
        let store = ArrayStore::new(100);

        store.put("k", b"old", Some(Duration::from_millis(30))).unwrap();
        sleep(Duration::from_millis(60));
        assert!(store.add("k", b"new", None).unwrap());
        assert_eq!(store.get("k").unwrap().as_deref(), Some(&b"new"[..]));
    }

    #[test]
    fn test_store_ttl_expiration() {
        let store = ArrayStore::new(100);

        store.put("key1", b"value1", Some(Duration::from_millis(50))).unwrap();
        assert!(store.get("key1").unwrap().is_some());

        sleep(Duration::from_millis(80));

        assert_eq!(store.get("key1").unwrap(), None);
        assert!(!store.forget("key1").unwrap());
    }

    #[test]
    fn test_store_lru_eviction() {
        let store = ArrayStore::new(3);

        store.put("key1", b"1", None).unwrap();
        store.put("key2", b"2", None).unwrap();
        store.put("key3", b"3", None).unwrap();
        store.get("key1").unwrap();
        store.put("key4", b"4", None).unwrap();

        assert_eq!(store.len(), 3);
        assert!(store.get("key1").unwrap().is_some());
        assert!(store.get("key2").unwrap().is_none());
        assert_eq!(store.stats().unwrap().evictions, 1);
    }

    #[test]
    fn test_store_increment_and_decrement() {
        let store = ArrayStore::new(10);

        assert_eq!(store.increment("counter", 5).unwrap(), 5);
        assert_eq!(store.increment("counter", 2).unwrap(), 7);
        assert_eq!(store.decrement("counter", 10).unwrap(), -3);
        assert_eq!(store.get("counter").unwrap().as_deref(), Some(&b"-3"[..]));
    }

    #[test]
    fn test_store_increment_rejects_non_integer() {
        let store = ArrayStore::new(10);
        store.put("name", b"\"alice\"", None).unwrap();

        assert!(matches!(
            store.increment("name", 1),
            Err(CacheError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_store_purge_expired() {
        let store = ArrayStore::new(100);

        store.put("key1", b"v", Some(Duration::from_millis(30))).unwrap();
        store.put("key2", b"v", secs(10)).unwrap();
        sleep(Duration::from_millis(60));

        assert_eq!(store.purge_expired().unwrap(), vec!["key1"]);
        assert_eq!(store.len(), 1);
        assert!(store.get("key2").unwrap().is_some());
        assert!(store.purge_expired().unwrap().is_empty());
    }

    #[test]
    fn test_purge_reports_lazily_expired_and_evicted_keys() {
        let store = ArrayStore::new(2);

        store.put("short", b"v", Some(Duration::from_millis(20))).unwrap();
        sleep(Duration::from_millis(40));
        assert!(store.get("short").unwrap().is_none());

        store.put("a", b"1", None).unwrap();
        store.put("b", b"2", None).unwrap();
        store.put("c", b"3", None).unwrap();
        store.put("gone", b"v", None).unwrap();
        store.forget("gone").unwrap();

        assert_eq!(store.purge_expired().unwrap(), vec!["a", "b", "short"]);
    }

    #[test]
    fn test_rewritten_key_is_not_reported() {
        let store = ArrayStore::new(1);

        store.put("a", b"1", None).unwrap();
        store.put("b", b"2", None).unwrap();
        store.put("a", b"1", None).unwrap();

        assert_eq!(store.purge_expired().unwrap(), vec!["b"]);
    }

    #[test]
    fn test_remaining_ttl() {
        let store = ArrayStore::new(10);
        store.put("ttl", b"v", secs(10)).unwrap();
        store.put("forever", b"v", None).unwrap();

        let remaining = store.remaining_ttl("ttl").unwrap().unwrap();
        assert!(remaining <= Duration::from_secs(10));
        assert!(remaining > Duration::from_secs(9));
        assert_eq!(store.remaining_ttl("forever").unwrap(), None);
        assert_eq!(store.remaining_ttl("missing").unwrap(), None);
    }

    #[test]
    fn test_store_value_too_large() {
        let store = ArrayStore::new(100);
        let large = vec![b'x'; MAX_VALUE_SIZE + 1];

        assert!(matches!(
            store.put("key", &large, None),
            Err(CacheError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_native_sets() {
        let store = ArrayStore::new(100);
        let members = vec!["a".to_string(), "b".to_string()];

        store.set_add("tag", &members).unwrap();
        store.set_add("tag", &members).unwrap();
        assert_eq!(store.set_members("tag").unwrap().len(), 2);

        store.set_remove("tag", &["a".to_string()]).unwrap();
        let taken = store.set_take("tag").unwrap();
        assert_eq!(taken.into_iter().collect::<Vec<_>>(), vec!["b"]);
        assert!(store.set_members("tag").unwrap().is_empty());
    }

    #[test]
    fn test_flush_clears_values_and_sets() {
        let store = ArrayStore::new(100);
        store.put("k", b"v", None).unwrap();
        store.set_add("s", &["k".to_string()]).unwrap();

        store.flush().unwrap();

        assert!(store.is_empty());
        assert!(store.set_members("s").unwrap().is_empty());
    }
}
