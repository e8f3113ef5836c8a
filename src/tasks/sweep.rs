//! Eviction Sweep Task
//!
//! Background task that periodically removes entries nobody has requested
//! for longer than the configured age.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::CachingTransport;
use crate::transport::Transport;

/// Spawns a background task that periodically sweeps the cache directory.
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between sweeps. A failed sweep is logged and retried on the next tick.
///
/// # Arguments
/// * `cache` - shared caching transport whose directory is swept
/// * `sweep_interval_secs` - Interval in seconds between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(CachingTransport::new(origin, config)?);
/// let sweep_handle = spawn_sweep_task(cache.clone(), 3600);
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task<T>(
    cache: Arc<CachingTransport<T>>,
    sweep_interval_secs: u64,
) -> JoinHandle<()>
where
    T: Transport + 'static,
{
    let interval = Duration::from_secs(sweep_interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting eviction sweep task with interval of {} seconds",
            sweep_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            if let Err(e) = cache.sweep().await {
                warn!("Eviction sweep failed: {}", e);
            }
        }
    })
}
