//! Configuration Module
//!
//! Handles loading cache and server configuration from environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{CacheError, Result};

// == Cache Driver ==
/// Backend selected by `CACHE_DRIVER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheDriver {
    Redis,
    Memcached,
    #[default]
    Array,
    TwoLevel,
}

impl CacheDriver {
    /// Name as written in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheDriver::Redis => "redis",
            CacheDriver::Memcached => "memcached",
            CacheDriver::Array => "array",
            CacheDriver::TwoLevel => "two_level_cache",
        }
    }
}

impl FromStr for CacheDriver {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(CacheDriver::Redis),
            "memcached" => Ok(CacheDriver::Memcached),
            "array" => Ok(CacheDriver::Array),
            "two_level_cache" => Ok(CacheDriver::TwoLevel),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown cache driver '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for CacheDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Memcached Settings ==
/// Connection settings for the Memcached store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemcachedConfig {
    /// `host:port` pairs
    pub servers: Vec<String>,
    /// Connection name used in logs
    pub persistent_id: Option<String>,
    /// SASL username and password
    pub sasl: Option<(String, String)>,
}

impl Default for MemcachedConfig {
    fn default() -> Self {
        Self {
            servers: vec!["127.0.0.1:11211".to_string()],
            persistent_id: None,
            sasl: None,
        }
    }
}

impl MemcachedConfig {
    /// Builds `memcache://` URLs for every server, with SASL credentials
    /// percent-encoded into the userinfo part.
    pub fn urls(&self) -> Result<Vec<String>> {
        self.servers
            .iter()
            .map(|server| {
                let mut url = Url::parse(&format!("memcache://{}", server)).map_err(|err| {
                    CacheError::InvalidConfig(format!("memcached server '{}': {}", server, err))
                })?;
                if let Some((user, password)) = &self.sasl {
                    if url.set_username(user).is_err()
                        || url.set_password(Some(password.as_str())).is_err()
                    {
                        return Err(CacheError::InvalidConfig(format!(
                            "memcached server '{}' cannot carry credentials",
                            server
                        )));
                    }
                }
                Ok(url.into())
            })
            .collect()
    }
}

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache backend
    pub driver: CacheDriver,
    /// Namespace prepended to every prepared key
    pub prefix: String,
    /// Default TTL in seconds handed to callers without an explicit TTL
    pub default_ttl: u64,
    /// Maximum number of entries the in-process store can hold
    pub max_entries: usize,
    /// TTL in seconds for values promoted from L2 into L1
    pub promotion_ttl: u64,
    /// Redis connection URL
    pub redis_url: String,
    /// Memcached connection settings
    pub memcached: MemcachedConfig,
    /// Application name reported by `/sys-env`
    pub app_name: String,
    /// Application environment reported by `/sys-env`
    pub app_env: String,
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DRIVER` - `redis`, `memcached`, `array` or `two_level_cache` (default: array)
    /// - `CACHE_PREFIX` - Key namespace (default: empty)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `CACHE_MAX_ENTRIES` - In-process store capacity (default: 1000)
    /// - `CACHE_PROMOTION_TTL` - L1 TTL for promoted values (default: 60)
    /// - `REDIS_URL` - Redis connection (default: redis://127.0.0.1:6379/0)
    /// - `MEMCACHED_SERVERS` - Comma separated servers (default: 127.0.0.1:11211)
    /// - `MEMCACHED_PERSISTENT_ID` - Memcached connection name
    /// - `MEMCACHED_SASL_USERNAME` / `MEMCACHED_SASL_PASSWORD` - SASL credentials
    /// - `APP_NAME` / `APP_ENV` - Reported application identity
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let driver = match env::var("CACHE_DRIVER") {
            Ok(value) if !value.trim().is_empty() => value.parse()?,
            _ => defaults.driver,
        };

        let servers = env::var("MEMCACHED_SERVERS")
            .ok()
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .filter(|servers| !servers.is_empty())
            .unwrap_or(defaults.memcached.servers);

        let sasl = match (
            env::var("MEMCACHED_SASL_USERNAME").ok(),
            env::var("MEMCACHED_SASL_PASSWORD").ok(),
        ) {
            (Some(user), Some(password)) if !user.is_empty() => Some((user, password)),
            _ => None,
        };

        Ok(Self {
            driver,
            prefix: env::var("CACHE_PREFIX").unwrap_or(defaults.prefix),
            default_ttl: parse_env("CACHE_DEFAULT_TTL", defaults.default_ttl),
            max_entries: parse_env("CACHE_MAX_ENTRIES", defaults.max_entries),
            promotion_ttl: parse_env("CACHE_PROMOTION_TTL", defaults.promotion_ttl),
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            memcached: MemcachedConfig {
                servers,
                persistent_id: env::var("MEMCACHED_PERSISTENT_ID").ok(),
                sasl,
            },
            app_name: env::var("APP_NAME").unwrap_or(defaults.app_name),
            app_env: env::var("APP_ENV").unwrap_or(defaults.app_env),
            server_port: parse_env("SERVER_PORT", defaults.server_port),
            cleanup_interval: parse_env("CLEANUP_INTERVAL", defaults.cleanup_interval),
        })
    }
}

fn parse_env<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            driver: CacheDriver::Array,
            prefix: String::new(),
            default_ttl: 300,
            max_entries: 1000,
            promotion_ttl: 60,
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            memcached: MemcachedConfig::default(),
            app_name: "common_cache".to_string(),
            app_env: "production".to_string(),
            server_port: 3000,
            cleanup_interval: 1,
        }
    }
}
