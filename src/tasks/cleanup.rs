//! Expiry Sweep Task
//!
//! Background task that periodically removes expired entries from the
//! in-process stores. Expired keys are already invisible to reads; the
//! sweep reclaims their memory.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::store::MemoryStore;

/// Spawns a background task that sweeps expired keys from `stores`.
///
/// The task runs until aborted, sleeping `cleanup_interval_secs` between
/// sweeps. Each store's lock is taken only for its own sweep.
///
/// # Example
/// ```ignore
/// let handle = spawn_cleanup_task(state.memory_stores.clone(), 1);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_cleanup_task(stores: Vec<MemoryStore>, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting expiry sweep with interval of {} seconds over {} stores",
            interval.as_secs(),
            stores.len()
        );

        loop {
            tokio::time::sleep(interval).await;

            let mut removed = 0;
            for store in &stores {
                removed += store.cleanup_expired().await;
            }

            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }
    })
}
