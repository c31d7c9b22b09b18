//! Response DTOs for the health and diagnostics API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::config::Config;

/// Response body for GET /status
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Response body for the liveness endpoint (GET /healthz)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Response body for the readiness endpoints (GET /readyz, GET /redis-health-check)
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    /// Store that answered the ping
    pub store: String,
    pub timestamp: String,
}

impl ReadinessResponse {
    pub fn ready(store: impl Into<String>) -> Self {
        Self {
            status: "ready".to_string(),
            store: store.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Response body for GET /sys-env
#[derive(Debug, Clone, Serialize)]
pub struct SysEnvResponse {
    pub app_name: String,
    pub app_env: String,
    /// Crate version the binary was built from
    pub version: String,
    pub cache_driver: String,
    pub cache_prefix: String,
}

impl SysEnvResponse {
    pub fn from_config(config: &Config) -> Self {
        Self {
            app_name: config.app_name.clone(),
            app_env: config.app_env.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            cache_driver: config.driver.to_string(),
            cache_prefix: config.prefix.clone(),
        }
    }
}

/// Response body for GET /logging
#[derive(Debug, Clone, Serialize)]
pub struct LoggingResponse {
    pub logged: bool,
    /// Levels a line was emitted at
    pub levels: Vec<&'static str>,
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    pub writes: u64,
    pub deletes: u64,
    /// Number of evictions
    pub evictions: u64,
    /// Current number of entries in the store, 0 when the store cannot tell
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Name of the backing store
    pub store: String,
}

impl StatsResponse {
    pub fn new(stats: &CacheStats, store: impl Into<String>) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            writes: stats.writes,
            deletes: stats.deletes,
            evictions: stats.evictions,
            total_entries: stats.total_entries,
            hit_rate: stats.hit_rate(),
            store: store.into(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
