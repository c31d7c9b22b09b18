//! Expiry Sweep Task
//!
//! Background task that periodically purges expired entries from stores that
//! expire lazily. Redis and Memcached expire on their own and report nothing.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheRepository;

/// Spawns a task that calls [`CacheRepository::purge_expired`] every
/// `cleanup_interval_secs` seconds.
///
/// Store calls block, so each sweep runs on the blocking pool. The returned
/// handle is aborted during graceful shutdown.
pub fn spawn_cleanup_task(cache: Arc<CacheRepository>, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            interval_secs = interval.as_secs(),
            store = cache.store().name(),
            "starting expiry sweep task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let sweep = cache.clone();
            match tokio::task::spawn_blocking(move || sweep.purge_expired()).await {
                Ok(Ok(0)) => debug!("expiry sweep: nothing to remove"),
                Ok(Ok(removed)) => info!(removed, "expiry sweep removed expired entries"),
                Ok(Err(err)) => warn!(error = %err, "expiry sweep failed"),
                Err(err) => warn!(error = %err, "expiry sweep task panicked"),
            }
        }
    })
}
