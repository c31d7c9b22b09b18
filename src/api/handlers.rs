//! API Handlers
//!
//! Health, readiness and diagnostics endpoints. Store calls block, so every
//! handler that touches a store runs it on the blocking pool.

use std::sync::Arc;

use axum::{extract::State, Json};
use tracing::{debug, error, info, trace, warn};

use crate::bootstrap;
use crate::cache::{CacheRepository, RedisStore, Store};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    HealthResponse, LoggingResponse, ReadinessResponse, StatsResponse, StatusResponse,
    SysEnvResponse,
};
use crate::repositories::{CachingRepository, InMemoryPriorityRepository};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheRepository>,
    /// Priority records, cached through `cache`
    pub priorities: Arc<CachingRepository<InMemoryPriorityRepository>>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(cache: Arc<CacheRepository>, config: Config) -> Self {
        let priorities = bootstrap::build_priorities(&config, cache.clone());
        Self {
            cache,
            priorities: Arc::new(priorities),
            config: Arc::new(config),
        }
    }

    /// Builds the configured store and repositories.
    pub fn from_config(config: Config) -> Result<Self> {
        let cache = bootstrap::build_cache(&config)?;
        Ok(Self::new(cache, config))
    }
}

/// Runs a blocking store call off the async runtime.
async fn blocking<T, F>(task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| CacheError::Internal(format!("blocking task failed: {}", err)))?
}

/// Handler for GET /status
pub async fn status_handler() -> Json<StatusResponse> {
    Json(StatusResponse::ok())
}

/// Handler for GET /healthz
///
/// Liveness only; never touches a store.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for GET /readyz
///
/// Pings the configured store.
pub async fn readiness_handler(State(state): State<AppState>) -> Result<Json<ReadinessResponse>> {
    let cache = state.cache.clone();
    let store = blocking(move || {
        cache.store().ping()?;
        Ok(cache.store().name().to_string())
    })
    .await
    .inspect_err(|err| warn!(error = %err, "readiness check failed"))?;

    Ok(Json(ReadinessResponse::ready(store)))
}

/// Handler for GET /redis-health-check
///
/// Pings Redis at `REDIS_URL`, whichever driver serves the cache.
pub async fn redis_health_handler(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>> {
    let url = state.config.redis_url.clone();
    blocking(move || RedisStore::open(&url)?.ping())
        .await
        .inspect_err(|err| error!(error = %err, "redis health check failed"))?;

    Ok(Json(ReadinessResponse::ready("redis")))
}

/// Handler for GET /sys-env
pub async fn sys_env_handler(State(state): State<AppState>) -> Json<SysEnvResponse> {
    Json(SysEnvResponse::from_config(&state.config))
}

/// Handler for GET /logging
///
/// Emits one line per level so log shipping can be checked end to end.
pub async fn logging_handler() -> Json<LoggingResponse> {
    trace!("logging check");
    debug!("logging check");
    info!("logging check");
    warn!("logging check");
    error!("logging check");

    Json(LoggingResponse {
        logged: true,
        levels: vec!["trace", "debug", "info", "warn", "error"],
    })
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.cache.stats();
    Json(StatsResponse::new(&stats, state.cache.store().name()))
}
