//! Application wiring
//!
//! Builds the configured store, the cache repository on top of it and the
//! repositories that cache through it. Callers receive their dependencies from
//! here instead of reaching for globals.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cache::{ArrayStore, CacheRepository, MemcachedStore, RedisStore, Store, TwoLevelStore};
use crate::config::{CacheDriver, Config};
use crate::error::Result;
use crate::repositories::{CachingRepository, InMemoryPriorityRepository};

/// Opens the store selected by `config.driver`.
///
/// The two-level driver uses Memcached as L1 and Redis as L2.
pub fn build_store(config: &Config) -> Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match config.driver {
        CacheDriver::Array => Arc::new(ArrayStore::new(config.max_entries)),
        CacheDriver::Redis => Arc::new(RedisStore::open(&config.redis_url)?),
        CacheDriver::Memcached => Arc::new(MemcachedStore::connect(&config.memcached)?),
        CacheDriver::TwoLevel => {
            let l1 = Arc::new(MemcachedStore::connect(&config.memcached)?);
            let l2 = Arc::new(RedisStore::open(&config.redis_url)?);
            Arc::new(TwoLevelStore::new(
                l1,
                l2,
                Duration::from_secs(config.promotion_ttl),
            ))
        }
    };

    info!(driver = %config.driver, store = store.name(), "cache store ready");
    Ok(store)
}

/// Builds the cache repository for `config`.
pub fn build_cache(config: &Config) -> Result<Arc<CacheRepository>> {
    let store = build_store(config)?;
    Ok(Arc::new(CacheRepository::new(store, config.prefix.clone())))
}

/// Priority repository whose reads are cached for `CACHE_DEFAULT_TTL` seconds.
pub fn build_priorities(
    config: &Config,
    cache: Arc<CacheRepository>,
) -> CachingRepository<InMemoryPriorityRepository> {
    CachingRepository::new(
        InMemoryPriorityRepository::new(),
        cache,
        Duration::from_secs(config.default_ttl),
    )
}
