//! Priority Repository
//!
//! Records ordered by a unique priority, plus a caching decorator that serves
//! reads through the cache repository and invalidates the `priority` tag on
//! every write.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::CacheRepository;
use crate::error::{CacheError, Result};

/// Tag attached to every cached priority entry.
pub const PRIORITY_TAG: &str = "priority";

// == Record ==
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityRecord {
    pub id: u64,
    /// Unique across records; higher runs later
    pub priority: i64,
    pub enabled: bool,
}

// == Repository Trait ==
pub trait PriorityRepository: Send + Sync {
    fn find(&self, id: u64) -> Result<PriorityRecord>;

    /// Every record, ordered by priority.
    fn all(&self) -> Result<Vec<PriorityRecord>>;

    /// Creates a record with the next free priority (highest + 1).
    fn create(&self, enabled: bool) -> Result<PriorityRecord>;

    /// Overwrites an existing record. Taking another record's priority is a conflict.
    fn replace(&self, record: PriorityRecord) -> Result<PriorityRecord>;

    fn set_enabled(&self, id: u64, enabled: bool) -> Result<PriorityRecord>;

    /// Swaps the priorities of two records.
    fn switch_priority(&self, a: u64, b: u64) -> Result<(PriorityRecord, PriorityRecord)>;
}

// == In-Memory Repository ==
#[derive(Debug, Default)]
struct Records {
    by_id: BTreeMap<u64, PriorityRecord>,
    next_id: u64,
}

impl Records {
    fn get(&self, id: u64) -> Result<&PriorityRecord> {
        self.by_id.get(&id).ok_or(CacheError::RecordNotFound(id))
    }
}

/// Process-local record store.
#[derive(Debug, Default)]
pub struct InMemoryPriorityRepository {
    records: Mutex<Records>,
}

impl InMemoryPriorityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PriorityRepository for InMemoryPriorityRepository {
    fn find(&self, id: u64) -> Result<PriorityRecord> {
        self.records().get(id).cloned()
    }

    fn all(&self) -> Result<Vec<PriorityRecord>> {
        let mut all: Vec<PriorityRecord> = self.records().by_id.values().cloned().collect();
        all.sort_by_key(|record| record.priority);
        Ok(all)
    }

    fn create(&self, enabled: bool) -> Result<PriorityRecord> {
        let mut records = self.records();
        let priority = match records.by_id.values().map(|record| record.priority).max() {
            None => 1,
            Some(max) => max.checked_add(1).ok_or_else(|| {
                CacheError::Conflict(format!("no priority left above {}", max))
            })?,
        };

        records.next_id += 1;
        let record = PriorityRecord {
            id: records.next_id,
            priority,
            enabled,
        };
        records.by_id.insert(record.id, record.clone());
        Ok(record)
    }

    fn replace(&self, record: PriorityRecord) -> Result<PriorityRecord> {
        let mut records = self.records();
        records.get(record.id)?;

        let taken = records
            .by_id
            .values()
            .any(|other| other.id != record.id && other.priority == record.priority);
        if taken {
            return Err(CacheError::Conflict(format!(
                "priority {} is already assigned",
                record.priority
            )));
        }

        records.by_id.insert(record.id, record.clone());
        Ok(record)
    }

    fn set_enabled(&self, id: u64, enabled: bool) -> Result<PriorityRecord> {
        let mut records = self.records();
        let record = records
            .by_id
            .get_mut(&id)
            .ok_or(CacheError::RecordNotFound(id))?;
        record.enabled = enabled;
        Ok(record.clone())
    }

    fn switch_priority(&self, a: u64, b: u64) -> Result<(PriorityRecord, PriorityRecord)> {
        let mut records = self.records();
        let mut first = records.get(a)?.clone();
        let mut second = records.get(b)?.clone();

        std::mem::swap(&mut first.priority, &mut second.priority);
        records.by_id.insert(first.id, first.clone());
        records.by_id.insert(second.id, second.clone());
        Ok((first, second))
    }
}

// == Caching Decorator ==
/// Serves reads from the cache and keeps it consistent with `R` on writes.
///
/// Writes hit `R` first, then drop everything tagged `priority`, then write
/// the fresh records back so the next single-record read is a hit.
pub struct CachingRepository<R> {
    inner: R,
    cache: Arc<CacheRepository>,
    ttl: Duration,
}

impl<R: PriorityRepository> CachingRepository<R> {
    pub fn new(inner: R, cache: Arc<CacheRepository>, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// TTL given to cached records.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn record_key(id: u64) -> String {
        format!("priority:{}", id)
    }

    fn invalidate(&self) -> Result<()> {
        let dropped = self.cache.forget_by_tags(&[PRIORITY_TAG], true)?;
        debug!(dropped = dropped.len(), "invalidated cached priorities");
        Ok(())
    }

    fn write_through(&self, record: &PriorityRecord) -> Result<()> {
        self.cache
            .put(Self::record_key(record.id), record, self.ttl, &[PRIORITY_TAG])?;
        Ok(())
    }
}

impl<R: PriorityRepository> PriorityRepository for CachingRepository<R> {
    fn find(&self, id: u64) -> Result<PriorityRecord> {
        self.cache
            .remember(Self::record_key(id), self.ttl, &[PRIORITY_TAG], || {
                self.inner.find(id)
            })
    }

    fn all(&self) -> Result<Vec<PriorityRecord>> {
        self.cache
            .remember("priority:all", self.ttl, &[PRIORITY_TAG], || self.inner.all())
    }

    fn create(&self, enabled: bool) -> Result<PriorityRecord> {
        let record = self.inner.create(enabled)?;
        self.invalidate()?;
        self.write_through(&record)?;
        info!(id = record.id, priority = record.priority, "priority record created");
        Ok(record)
    }

    fn replace(&self, record: PriorityRecord) -> Result<PriorityRecord> {
        let record = self.inner.replace(record)?;
        self.invalidate()?;
        self.write_through(&record)?;
        Ok(record)
    }

    fn set_enabled(&self, id: u64, enabled: bool) -> Result<PriorityRecord> {
        let record = self.inner.set_enabled(id, enabled)?;
        self.invalidate()?;
        self.write_through(&record)?;
        Ok(record)
    }

    fn switch_priority(&self, a: u64, b: u64) -> Result<(PriorityRecord, PriorityRecord)> {
        let (first, second) = self.inner.switch_priority(a, b)?;
        self.invalidate()?;
        self.write_through(&first)?;
        self.write_through(&second)?;
        info!(a, b, "priorities switched");
        Ok((first, second))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_assigns_next_priority() {
        let repo = InMemoryPriorityRepository::new();

        let first = repo.create(true).unwrap();
        let second = repo.create(false).unwrap();

        assert_eq!((first.id, first.priority), (1, 1));
        assert_eq!((second.id, second.priority), (2, 2));
        assert!(!second.enabled);
    }

    #[test]
    fn test_create_follows_highest_priority() {
        let repo = InMemoryPriorityRepository::new();
        let record = repo.create(true).unwrap();
        repo.replace(PriorityRecord {
            priority: 10,
            ..record
        })
        .unwrap();

        assert_eq!(repo.create(true).unwrap().priority, 11);
    }

    #[test]
    fn test_create_above_max_priority_is_conflict() {
        let repo = InMemoryPriorityRepository::new();
        let record = repo.create(true).unwrap();
        repo.replace(PriorityRecord {
            priority: i64::MAX,
            ..record
        })
        .unwrap();

        assert!(matches!(repo.create(true), Err(CacheError::Conflict(_))));
        assert_eq!(repo.all().unwrap().len(), 1);
    }

    #[test]
    fn test_all_is_ordered_by_priority() {
        let repo = InMemoryPriorityRepository::new();
        let a = repo.create(true).unwrap();
        let b = repo.create(true).unwrap();
        repo.switch_priority(a.id, b.id).unwrap();

        let ids: Vec<u64> = repo.all().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[test]
    fn test_replace_conflict() {
        let repo = InMemoryPriorityRepository::new();
        let a = repo.create(true).unwrap();
        let b = repo.create(true).unwrap();

        let result = repo.replace(PriorityRecord {
            priority: a.priority,
            ..b
        });

        assert!(matches!(result, Err(CacheError::Conflict(_))));
    }

    #[test]
    fn test_unknown_id_is_record_not_found() {
        let repo = InMemoryPriorityRepository::new();

        assert!(matches!(repo.find(7), Err(CacheError::RecordNotFound(7))));
        assert!(matches!(
            repo.set_enabled(7, true),
            Err(CacheError::RecordNotFound(7))
        ));
        assert!(matches!(
            repo.switch_priority(7, 8),
            Err(CacheError::RecordNotFound(7))
        ));
    }

    #[test]
    fn test_switch_priority_with_itself_is_noop() {
        let repo = InMemoryPriorityRepository::new();
        let a = repo.create(true).unwrap();

        let (first, second) = repo.switch_priority(a.id, a.id).unwrap();

        assert_eq!(first, a);
        assert_eq!(second, a);
    }
}
