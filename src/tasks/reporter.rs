//! Metrics Reporter Task
//!
//! Periodically logs the cache hit ratios and store statistics.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::CacheMetrics;

/// Spawns a task that logs a metrics snapshot every `interval_secs`.
///
/// A failed snapshot is logged and the next tick tried again.
pub fn spawn_metrics_reporter(metrics: CacheMetrics, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            match metrics.snapshot().await {
                Ok(snapshot) => info!(
                    hits = snapshot.application.hits,
                    misses = snapshot.application.misses,
                    hit_rate = %format!("{:.2}%", snapshot.application.hit_rate * 100.0),
                    keyspace_hit_rate =
                        %format!("{:.2}%", snapshot.keyspace.hit_rate * 100.0),
                    connected_clients = snapshot.connected_clients,
                    used_memory = %snapshot.used_memory,
                    "Cache metrics"
                ),
                Err(e) => warn!(error = %e, "Failed to collect cache metrics"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KvStore, MemoryStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_reporter_keeps_running() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new(10));
        let handle = spawn_metrics_reporter(CacheMetrics::new(store), 1);

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(!handle.is_finished());

        handle.abort();
    }
}
