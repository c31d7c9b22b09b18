//! Two-Level Store
//!
//! Composes a fast local L1 (Memcached) in front of a shared L2 (Redis).
//!
//! # Semantics
//! - Reads try L1, fall back to L2 and copy L2 hits into L1 (lazy promotion).
//!   A promoted copy never outlives the L2 value it came from
//! - Writes go to both levels; a failed L1 write is logged, an L2 failure is an error
//! - Deletes hit both levels, so tag invalidation never leaves stale L1 copies
//! - Counters and tag sets live in L2 only

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::Store;
use crate::error::Result;

// == Two-Level Store ==
pub struct TwoLevelStore {
    l1: Arc<dyn Store>,
    l2: Arc<dyn Store>,
    /// TTL given to values copied from L2 into L1
    promotion_ttl: Duration,
}

impl TwoLevelStore {
    pub fn new(l1: Arc<dyn Store>, l2: Arc<dyn Store>, promotion_ttl: Duration) -> Self {
        Self {
            l1,
            l2,
            promotion_ttl,
        }
    }

    pub fn l1(&self) -> &Arc<dyn Store> {
        &self.l1
    }

    pub fn l2(&self) -> &Arc<dyn Store> {
        &self.l2
    }

    /// TTL for an L1 copy: the promotion TTL, capped by what L2 has left.
    /// `None` skips promotion because the L2 value is already gone.
    fn promotion_ttl_for(&self, key: &str) -> Option<Duration> {
        match self.l2.remaining_ttl(key) {
            Ok(Some(remaining)) if remaining.is_zero() => None,
            Ok(Some(remaining)) => Some(remaining.min(self.promotion_ttl)),
            Ok(None) => Some(self.promotion_ttl),
            Err(err) => {
                warn!(key, error = %err, "L2 TTL lookup failed, skipping promotion");
                None
            }
        }
    }

    fn promote(&self, key: &str, value: &[u8]) {
        let Some(ttl) = self.promotion_ttl_for(key) else {
            return;
        };
        match self.l1.put(key, value, Some(ttl)) {
            Ok(()) => debug!(key, ttl_ms = ttl.as_millis() as u64, "promoted L2 hit into L1"),
            Err(err) => warn!(key, error = %err, "L1 promotion failed"),
        }
    }

    /// L1 copies are never authoritative; failure to drop one only logs.
    fn drop_l1(&self, key: &str) -> bool {
        match self.l1.forget(key) {
            Ok(removed) => removed,
            Err(err) => {
                warn!(key, error = %err, "L1 delete failed; copy expires with its TTL");
                false
            }
        }
    }
}

impl Store for TwoLevelStore {
    fn name(&self) -> &str {
        "two_level_cache"
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.l1.get(key) {
            Ok(Some(value)) => return Ok(Some(value)),
            Ok(None) => {}
            Err(err) => warn!(key, error = %err, "L1 read failed, reading L2"),
        }

        let value = self.l2.get(key)?;
        if let Some(value) = &value {
            self.promote(key, value);
        }
        Ok(value)
    }

    fn many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let mut values = match self.l1.many(keys) {
            Ok(values) => values,
            Err(err) => {
                warn!(error = %err, "L1 batch read failed, reading L2");
                vec![None; keys.len()]
            }
        };

        let missing: Vec<usize> = (0..keys.len()).filter(|&i| values[i].is_none()).collect();
        if missing.is_empty() {
            return Ok(values);
        }

        let missing_keys: Vec<String> = missing.iter().map(|&i| keys[i].clone()).collect();
        let found = self.l2.many(&missing_keys)?;
        for (index, value) in missing.into_iter().zip(found) {
            if let Some(value) = &value {
                self.promote(&keys[index], value);
            }
            values[index] = value;
        }
        Ok(values)
    }

    fn put(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        self.l2.put(key, value, ttl)?;
        if let Err(err) = self.l1.put(key, value, ttl) {
            warn!(key, error = %err, "L1 write failed; L2 holds the value");
        }
        Ok(())
    }

    fn add(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<bool> {
        let added = self.l2.add(key, value, ttl)?;
        if added {
            if let Err(err) = self.l1.put(key, value, ttl) {
                warn!(key, error = %err, "L1 write failed; L2 holds the value");
            }
        }
        Ok(added)
    }

    fn forget(&self, key: &str) -> Result<bool> {
        let from_l1 = self.drop_l1(key);
        let from_l2 = self.l2.forget(key)?;
        Ok(from_l1 || from_l2)
    }

    fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        let value = self.l2.increment(key, delta)?;
        self.drop_l1(key);
        Ok(value)
    }

    fn decrement(&self, key: &str, delta: i64) -> Result<i64> {
        let value = self.l2.decrement(key, delta)?;
        self.drop_l1(key);
        Ok(value)
    }

    fn flush(&self) -> Result<()> {
        if let Err(err) = self.l1.flush() {
            warn!(error = %err, "L1 flush failed");
        }
        self.l2.flush()
    }

    fn ping(&self) -> Result<()> {
        if let Err(err) = self.l1.ping() {
            warn!(store = self.l1.name(), error = %err, "L1 unreachable, serving from L2");
        }
        self.l2.ping()
    }

    /// Only L2 losses are reported; L1 copies carry no tag bookkeeping.
    fn purge_expired(&self) -> Result<Vec<String>> {
        if let Err(err) = self.l1.purge_expired() {
            warn!(error = %err, "L1 purge failed");
        }
        self.l2.purge_expired()
    }

    fn remaining_ttl(&self, key: &str) -> Result<Option<Duration>> {
        self.l2.remaining_ttl(key)
    }

    fn set_add(&self, key: &str, members: &[String]) -> Result<()> {
        self.l2.set_add(key, members)
    }

    fn set_members(&self, key: &str) -> Result<BTreeSet<String>> {
        self.l2.set_members(key)
    }

    fn set_remove(&self, key: &str, members: &[String]) -> Result<()> {
        self.l2.set_remove(key, members)
    }

    fn set_take(&self, key: &str) -> Result<BTreeSet<String>> {
        self.l2.set_take(key)
    }
}
