//! Memcached Store
//!
//! Memcached has no secondary index, so tag sets fall back to the JSON blob
//! encoding provided by the [`Store`] trait defaults.

use std::time::Duration;

use memcache::{Client, MemcacheError};
use tracing::{debug, info};

use super::{ttl_secs, Store};
use crate::cache::current_timestamp_ms;
use crate::config::MemcachedConfig;
use crate::error::{CacheError, Result};

/// Relative expirations beyond this many seconds are read by Memcached as
/// absolute Unix timestamps.
const MAX_RELATIVE_EXPIRATION: u64 = 60 * 60 * 24 * 30;

// == Memcached Store ==
pub struct MemcachedStore {
    client: Client,
    /// Connection name used in logs
    connection_name: String,
}

impl MemcachedStore {
    /// Connects to every configured server.
    pub fn connect(config: &MemcachedConfig) -> Result<Self> {
        if config.servers.is_empty() {
            return Err(CacheError::InvalidConfig(
                "memcached requires at least one server".to_string(),
            ));
        }

        let client = Client::connect(config.urls()?).map_err(unavailable)?;
        let connection_name = config
            .persistent_id
            .clone()
            .unwrap_or_else(|| config.servers.join(","));

        info!(
            connection = %connection_name,
            servers = config.servers.len(),
            sasl = config.sasl.is_some(),
            "memcached store connected"
        );
        Ok(Self {
            client,
            connection_name,
        })
    }

    pub fn connection_name(&self) -> &str {
        &self.connection_name
    }
}

fn unavailable(err: MemcacheError) -> CacheError {
    CacheError::unavailable("memcached", err)
}

/// Memcached expiration field: 0 keeps forever, long TTLs become timestamps.
fn expiration(ttl: Option<Duration>) -> u32 {
    match ttl {
        None => 0,
        Some(ttl) => {
            let secs = ttl_secs(ttl);
            let value = if secs > MAX_RELATIVE_EXPIRATION {
                current_timestamp_ms() / 1000 + secs
            } else {
                secs
            };
            u32::try_from(value).unwrap_or(u32::MAX)
        }
    }
}

impl Store for MemcachedStore {
    fn name(&self) -> &str {
        "memcached"
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.client.get::<Vec<u8>>(key).map_err(unavailable)
    }

    fn put(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        self.client
            .set(key, value, expiration(ttl))
            .map_err(unavailable)
    }

    fn add(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<bool> {
        match self.client.add(key, value, expiration(ttl)) {
            Ok(()) => Ok(true),
            // NOT_STORED: the key is already present
            Err(MemcacheError::CommandError(_)) => Ok(false),
            Err(err) => Err(unavailable(err)),
        }
    }

    fn forget(&self, key: &str) -> Result<bool> {
        self.client.delete(key).map_err(unavailable)
    }

    fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        // Seed missing counters; an existing key makes this add a no-op.
        match self.client.add(key, "0", 0) {
            Ok(()) => debug!(key, "memcached counter initialised"),
            Err(MemcacheError::CommandError(_)) => {}
            Err(err) => return Err(unavailable(err)),
        }

        let value = if delta >= 0 {
            self.client.increment(key, delta.unsigned_abs())
        } else {
            // DECR stops at zero on the server
            self.client.decrement(key, delta.unsigned_abs())
        }
        .map_err(unavailable)?;

        i64::try_from(value)
            .map_err(|_| CacheError::InvalidRequest(format!("Counter '{}' overflows i64", key)))
    }

    fn flush(&self) -> Result<()> {
        self.client.flush().map_err(unavailable)
    }

    fn ping(&self) -> Result<()> {
        let versions = self.client.version().map_err(unavailable)?;
        debug!(connection = %self.connection_name, servers = versions.len(), "memcached ping");
        Ok(())
    }
}
