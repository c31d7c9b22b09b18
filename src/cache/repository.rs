//! Cache Repository
//!
//! Public cache API composing a [`Store`] with the [`TagIndex`]. The repository
//! serializes values with serde_json, applies the namespace prefix and keeps
//! tag bookkeeping in step with value writes.
//!
//! Values are always written before their tags are registered, so a failure in
//! between leaves an untracked key rather than a tag pointing at nothing.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CacheStats, Namespace, Store, TagIndex};
use crate::error::{CacheError, Result};

// == Tag Flush Report ==
/// Outcome of invalidating one or more tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFlushReport {
    /// Prepared keys confirmed deleted
    pub deleted: Vec<String>,
    /// Keys already gone (expired or evicted) when the flush reached them
    pub missing: Vec<String>,
    /// Keys whose delete failed
    pub failed: Vec<String>,
}

impl TagFlushReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Turns failed deletes into `TagOperationPartialFailure`.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.failed.is_empty() {
            Ok(self.deleted)
        } else {
            Err(CacheError::TagOperationPartialFailure {
                deleted: self.deleted,
                failed: self.failed,
            })
        }
    }
}

// == Cache Repository ==
pub struct CacheRepository {
    store: Arc<dyn Store>,
    tags: TagIndex,
    namespace: Namespace,
    stats: Mutex<CacheStats>,
}

impl CacheRepository {
    pub fn new(store: Arc<dyn Store>, prefix: impl Into<String>) -> Self {
        let namespace = Namespace::new(prefix);
        Self {
            tags: TagIndex::new(store.clone(), namespace.clone()),
            store,
            namespace,
            stats: Mutex::new(CacheStats::new()),
        }
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn tags(&self) -> &TagIndex {
        &self.tags
    }

    pub fn prefix(&self) -> &str {
        self.namespace.prefix()
    }

    /// Resolves a key to the string stored in the backend.
    pub fn prepare_key<'a>(&self, key: impl Into<CacheKey<'a>>) -> Result<String> {
        self.namespace.resolve(&key.into())
    }

    /// Strips the namespace prefix from a prepared key.
    pub fn unprepare_key(&self, key: &str) -> String {
        self.namespace.strip(key).to_string()
    }

    fn stats_guard(&self) -> MutexGuard<'_, CacheStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Repository counters, plus entry and eviction counts when the store keeps them.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats_guard().clone();
        if let Some(store_stats) = self.store.stats() {
            stats.evictions = store_stats.evictions;
            stats.set_total_entries(store_stats.total_entries);
        }
        stats
    }

    // == Reads ==

    pub fn has<'a>(&self, key: impl Into<CacheKey<'a>>) -> Result<bool> {
        let key = self.prepare_key(key)?;
        Ok(self.store.get(&key)?.is_some())
    }

    /// Reads a value; a miss is `None`.
    pub fn find<'a, T: DeserializeOwned>(&self, key: impl Into<CacheKey<'a>>) -> Result<Option<T>> {
        let key = self.prepare_key(key)?;
        let value = self.store.get(&key)?;

        let mut stats = self.stats_guard();
        match value {
            Some(bytes) => {
                stats.record_hit();
                drop(stats);
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
            None => {
                stats.record_miss();
                Ok(None)
            }
        }
    }

    /// Reads a value, returning `default` on a miss.
    pub fn get<'a, T: DeserializeOwned>(&self, key: impl Into<CacheKey<'a>>, default: T) -> Result<T> {
        Ok(self.find(key)?.unwrap_or(default))
    }

    /// Batched read. Every requested key appears in the result; misses map to `None`.
    pub fn many<'a, T, I, K>(&self, keys: I) -> Result<HashMap<String, Option<T>>>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = K>,
        K: Into<CacheKey<'a>>,
    {
        let mut requested = Vec::new();
        let mut prepared = Vec::new();
        for key in keys {
            let key = key.into();
            prepared.push(self.namespace.resolve(&key)?);
            requested.push(key.as_str().to_string());
        }

        let values = self.store.many(&prepared)?;
        let mut result = HashMap::with_capacity(requested.len());
        let (mut hits, mut misses) = (0, 0);
        for (key, value) in requested.into_iter().zip(values) {
            let decoded = match value {
                Some(bytes) => {
                    hits += 1;
                    Some(serde_json::from_slice(&bytes)?)
                }
                None => {
                    misses += 1;
                    None
                }
            };
            result.insert(key, decoded);
        }

        let mut stats = self.stats_guard();
        stats.hits += hits;
        stats.misses += misses;
        Ok(result)
    }

    /// Reads and removes a value.
    pub fn pull<'a, T: DeserializeOwned>(&self, key: impl Into<CacheKey<'a>>) -> Result<Option<T>> {
        let key = CacheKey::prepared(self.prepare_key(key)?);
        let value = self.find(key.clone())?;
        if value.is_some() {
            self.forget(key)?;
        }
        Ok(value)
    }

    // == Writes ==

    fn write(&self, key: &str, bytes: &[u8], ttl: Option<Duration>, tags: &[&str]) -> Result<()> {
        self.tags.check(key, tags)?;
        self.store.put(key, bytes, ttl)?;
        self.tags.attach_key_to_tags(key, tags)?;
        self.stats_guard().record_write();
        Ok(())
    }

    /// Stores a value for `ttl` under every tag in `tags`.
    ///
    /// A zero TTL removes the key instead and returns false.
    pub fn put<'a, T: Serialize + ?Sized>(
        &self,
        key: impl Into<CacheKey<'a>>,
        value: &T,
        ttl: Duration,
        tags: &[&str],
    ) -> Result<bool> {
        let key = self.prepare_key(key)?;
        if ttl.is_zero() {
            self.forget(CacheKey::prepared(key))?;
            return Ok(false);
        }

        let bytes = serde_json::to_vec(value)?;
        self.write(&key, &bytes, Some(ttl), tags)?;
        debug!(key = %key, ttl_secs = ttl.as_secs(), tags = ?tags, "cache put");
        Ok(true)
    }

    /// Stores a value without expiry.
    pub fn forever<'a, T: Serialize + ?Sized>(
        &self,
        key: impl Into<CacheKey<'a>>,
        value: &T,
        tags: &[&str],
    ) -> Result<bool> {
        let key = self.prepare_key(key)?;
        let bytes = serde_json::to_vec(value)?;
        self.write(&key, &bytes, None, tags)?;
        debug!(key = %key, tags = ?tags, "cache put forever");
        Ok(true)
    }

    /// Stores a value only if the key is absent.
    pub fn add<'a, T: Serialize + ?Sized>(
        &self,
        key: impl Into<CacheKey<'a>>,
        value: &T,
        ttl: Duration,
        tags: &[&str],
    ) -> Result<bool> {
        let key = self.prepare_key(key)?;
        if ttl.is_zero() {
            return Ok(false);
        }

        self.tags.check(&key, tags)?;
        let bytes = serde_json::to_vec(value)?;
        if !self.store.add(&key, &bytes, Some(ttl))? {
            return Ok(false);
        }
        self.tags.attach_key_to_tags(&key, tags)?;
        self.stats_guard().record_write();
        Ok(true)
    }

    // == Remember ==
    /// Returns the cached value, or runs `producer`, stores its result and returns it.
    ///
    /// There is no cross-caller locking: concurrent misses may each run their
    /// producer, and the last write wins. A producer error is returned and
    /// nothing is cached.
    pub fn remember<'a, T, F>(
        &self,
        key: impl Into<CacheKey<'a>>,
        ttl: Duration,
        tags: &[&str],
        producer: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        let key = CacheKey::prepared(self.prepare_key(key)?);
        if let Some(value) = self.find(key.clone())? {
            return Ok(value);
        }

        let value = producer()?;
        self.put(key, &value, ttl, tags)?;
        Ok(value)
    }

    pub fn remember_forever<'a, T, F>(
        &self,
        key: impl Into<CacheKey<'a>>,
        tags: &[&str],
        producer: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        let key = CacheKey::prepared(self.prepare_key(key)?);
        if let Some(value) = self.find(key.clone())? {
            return Ok(value);
        }

        let value = producer()?;
        self.forever(key, &value, tags)?;
        Ok(value)
    }

    // == Counters ==

    pub fn increment<'a>(&self, key: impl Into<CacheKey<'a>>, delta: i64) -> Result<i64> {
        let key = self.prepare_key(key)?;
        self.store.increment(&key, delta)
    }

    pub fn decrement<'a>(&self, key: impl Into<CacheKey<'a>>, delta: i64) -> Result<i64> {
        let key = self.prepare_key(key)?;
        self.store.decrement(&key, delta)
    }

    // == Deletes ==

    /// Removes a key and detaches it from its tags. A missing key returns false.
    pub fn forget<'a>(&self, key: impl Into<CacheKey<'a>>) -> Result<bool> {
        let key = self.prepare_key(key)?;
        let removed = self.store.forget(&key)?;
        if removed {
            self.stats_guard().record_deletes(1);
        }

        if let Err(err) = self.tags.detach_key(&key) {
            warn!(key = %key, error = %err, "failed to detach forgotten key from its tags");
        }
        Ok(removed)
    }

    /// Invalidates every key under `tags` and reports what happened to each.
    ///
    /// Keys already expired count as missing; failed deletes are collected and
    /// the flush carries on with the remaining keys.
    pub fn flush_tags(&self, tags: &[&str]) -> Result<TagFlushReport> {
        let mut report = TagFlushReport::default();
        let mut seen = BTreeSet::new();

        for tag in tags {
            let keys = self.tags.remove_tag(tag)?;
            for key in keys {
                if !seen.insert(key.clone()) {
                    continue;
                }

                match self.store.forget(&key) {
                    Ok(true) => report.deleted.push(key.clone()),
                    Ok(false) => report.missing.push(key.clone()),
                    Err(err) => {
                        warn!(tag, key = %key, error = %err, "failed to delete tagged key");
                        report.failed.push(key);
                        continue;
                    }
                }

                if let Err(err) = self.tags.detach_key(&key) {
                    warn!(key = %key, error = %err, "failed to detach key from remaining tags");
                }
            }
        }

        self.stats_guard().record_deletes(report.deleted.len());
        info!(
            tags = ?tags,
            deleted = report.deleted.len(),
            missing = report.missing.len(),
            failed = report.failed.len(),
            "flushed cache tags"
        );
        Ok(report)
    }

    /// Invalidates every key under `tags`, returning the keys confirmed deleted.
    ///
    /// With `unprepare` the namespace prefix is stripped from the returned keys.
    pub fn forget_by_tags(&self, tags: &[&str], unprepare: bool) -> Result<Vec<String>> {
        let report = self.flush_tags(tags)?;
        if !report.is_complete() {
            warn!(
                failed = ?report.failed,
                "tag flush incomplete; returning confirmed deletions only"
            );
        }

        let deleted = report.deleted;
        if unprepare {
            Ok(deleted.iter().map(|key| self.unprepare_key(key)).collect())
        } else {
            Ok(deleted)
        }
    }

    /// Keys currently under `tag`, dropping members whose values are gone.
    pub fn tagged_keys(&self, tag: &str, unprepare: bool) -> Result<Vec<String>> {
        let members = self.tags.keys_for_tag(tag)?;
        let mut live = Vec::with_capacity(members.len());
        let mut stale = Vec::new();

        for key in members {
            if self.store.get(&key)?.is_some() {
                live.push(key);
            } else {
                stale.push(key);
            }
        }

        if !stale.is_empty() {
            debug!(tag, pruned = stale.len(), "pruned stale tag members");
            self.tags.prune(tag, &stale)?;
        }

        if unprepare {
            Ok(live.iter().map(|key| self.unprepare_key(key)).collect())
        } else {
            Ok(live)
        }
    }

    /// Removes everything from the backing store.
    pub fn flush(&self) -> Result<()> {
        info!(store = self.store.name(), "flushing cache store");
        self.store.flush()
    }

    /// Drops expired values and detaches every key the store lost on its own
    /// from its tags. Returns how many keys were cleaned up.
    pub fn purge_expired(&self) -> Result<usize> {
        let vanished = self.store.purge_expired()?;
        for key in &vanished {
            if let Err(err) = self.tags.detach_key(key) {
                warn!(key = %key, error = %err, "failed to detach expired key from its tags");
            }
        }

        if !vanished.is_empty() {
            debug!(removed = vanished.len(), "purged expired keys and their tag entries");
        }
        Ok(vanished.len())
    }
}
