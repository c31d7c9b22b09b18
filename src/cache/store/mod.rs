//! Store Module
//!
//! Low-level key-value backends. Values are opaque byte blobs; the cache
//! repository owns serialization, namespacing and tag bookkeeping.
//!
//! # Backends
//! - [`ArrayStore`]: in-process map with TTL and LRU capacity eviction
//! - [`RedisStore`]: Redis via blocking connections
//! - [`MemcachedStore`]: Memcached via the `memcache` client

mod array;
mod memcached;
mod redis;

use std::collections::BTreeSet;
use std::time::Duration;

use crate::cache::CacheStats;
use crate::error::Result;

pub use self::array::ArrayStore;
pub use self::memcached::MemcachedStore;
pub use self::redis::RedisStore;

// == Store Trait ==
/// Contract every cache backend implements.
///
/// Backend failures surface as `CacheError::StoreUnavailable`. A missing key
/// is never an error: reads return `None` and deletes return `false`.
pub trait Store: Send + Sync {
    /// Short backend name used in logs and errors.
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Batched read, one slot per requested key in the same order.
    fn many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    /// Stores a value. `None` keeps it until explicitly removed.
    fn put(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Stores a value only if the key is absent. Returns whether it was written.
    fn add(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<bool>;

    /// Removes a key. Returns false when it did not exist.
    fn forget(&self, key: &str) -> Result<bool>;

    /// Adds `delta` to an integer value, creating it from zero when missing.
    fn increment(&self, key: &str, delta: i64) -> Result<i64>;

    /// Subtracts `delta`. Memcached clamps at zero; the other stores go negative.
    fn decrement(&self, key: &str, delta: i64) -> Result<i64> {
        self.increment(key, -delta)
    }

    /// Removes every key, tag sets included.
    fn flush(&self) -> Result<()>;

    /// Connectivity check.
    fn ping(&self) -> Result<()>;

    /// Drops expired entries for stores that keep them around.
    ///
    /// Returns every key whose value the store dropped on its own, by expiry
    /// or eviction, since the previous call. Backends that expire entries
    /// server-side report nothing.
    fn purge_expired(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// Time left before `key` expires. `None` means no expiry or unknown.
    fn remaining_ttl(&self, _key: &str) -> Result<Option<Duration>> {
        Ok(None)
    }

    /// Store-side statistics, when the backend keeps them.
    fn stats(&self) -> Option<CacheStats> {
        None
    }

    // == Raw Set Storage ==
    // Defaults persist the set as a JSON string array under `key`. Backends
    // with native sets override all four.

    fn set_add(&self, key: &str, members: &[String]) -> Result<()> {
        let mut set = self.set_members(key)?;
        let before = set.len();
        set.extend(members.iter().cloned());
        if set.len() != before {
            self.put(key, &encode_set(&set)?, None)?;
        }
        Ok(())
    }

    fn set_members(&self, key: &str) -> Result<BTreeSet<String>> {
        match self.get(key)? {
            Some(bytes) => decode_set(&bytes),
            None => Ok(BTreeSet::new()),
        }
    }

    fn set_remove(&self, key: &str, members: &[String]) -> Result<()> {
        let mut set = self.set_members(key)?;
        let before = set.len();
        for member in members {
            set.remove(member);
        }
        if set.is_empty() {
            self.forget(key)?;
        } else if set.len() != before {
            self.put(key, &encode_set(&set)?, None)?;
        }
        Ok(())
    }

    /// Reads and deletes a set in one step.
    fn set_take(&self, key: &str) -> Result<BTreeSet<String>> {
        let set = self.set_members(key)?;
        self.forget(key)?;
        Ok(set)
    }
}

fn encode_set(set: &BTreeSet<String>) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(set)?)
}

fn decode_set(bytes: &[u8]) -> Result<BTreeSet<String>> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Whole seconds for a TTL, never below one so a short TTL cannot mean "forever".
pub(crate) fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_secs_floor() {
        assert_eq!(ttl_secs(Duration::from_millis(10)), 1);
        assert_eq!(ttl_secs(Duration::from_secs(90)), 90);
    }

    #[test]
    fn test_set_encoding() {
        let set: BTreeSet<String> = ["b", "a"].iter().map(|s| s.to_string()).collect();
        let bytes = encode_set(&set).unwrap();
        assert_eq!(bytes, br#"["a","b"]"#);
        assert_eq!(decode_set(&bytes).unwrap(), set);
    }
}
