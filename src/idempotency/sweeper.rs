//! Periodic expiry sweep for the idempotency store

use chrono::Utc;
use tokio::task::JoinHandle;

use super::{IdempotencyConfig, SharedStore};

/// Handle to the background sweep task
#[derive(Debug)]
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweep task. Cached entries stay live until cleared or until
    /// a future sweeper picks them up.
    pub fn shutdown(self) {
        self.task.abort();
        tracing::debug!("idempotency sweeper stopped");
    }
}

/// Spawn the recurring expiry sweep.
///
/// Every `sweep_interval` the store drops entries older than `ttl`. A
/// failed sweep is logged and the next run proceeds on schedule.
#[must_use]
pub fn spawn_sweeper(store: SharedStore, config: &IdempotencyConfig) -> SweeperHandle {
    let ttl = config.ttl;
    let period = config.sweep_interval;

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately; skip it
        interval.tick().await;

        loop {
            interval.tick().await;
            match store.sweep(ttl, Utc::now()).await {
                Ok(outcome) => {
                    tracing::info!(
                        removed = outcome.removed,
                        remaining = outcome.remaining,
                        "idempotency sweep completed"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, "idempotency sweep failed");
                }
            }
        }
    });

    tracing::debug!(
        period_secs = period.as_secs(),
        ttl_secs = ttl.as_secs(),
        "idempotency sweeper started"
    );
    SweeperHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idempotency::{CachedEntry, MemoryStore};
    use std::sync::Arc;
    use std::time::Duration;

    fn stale_entry() -> CachedEntry {
        CachedEntry {
            body: b"{}".to_vec(),
            status: 200,
            created_at: Utc::now() - chrono::Duration::hours(25),
        }
    }

    fn config(period: Duration) -> IdempotencyConfig {
        IdempotencyConfig {
            sweep_interval: period,
            ..IdempotencyConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_expired_entries() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        store.insert("stale", stale_entry()).await.unwrap();

        let period = Duration::from_secs(10);
        let handle = spawn_sweeper(store.clone(), &config(period));

        // Let two periods elapse on the paused clock
        tokio::time::sleep(period * 2).await;

        assert!(store.lookup("stale").await.unwrap().is_none());
        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_sweeping() {
        let store: SharedStore = Arc::new(MemoryStore::new());

        let period = Duration::from_secs(10);
        let handle = spawn_sweeper(store.clone(), &config(period));
        handle.shutdown();

        store.insert("stale", stale_entry()).await.unwrap();
        tokio::time::sleep(period * 3).await;

        // No sweep ran after shutdown
        assert!(store.lookup("stale").await.unwrap().is_some());
    }
}
