//! Idempotency entry storage
//!
//! [`MemoryStore`] is the baseline backend: one coarse mutex over a
//! `HashMap`, which is plenty for per-instance traffic. External backends
//! (Redis and friends) implement [`IdempotencyStore`] and are bounded by
//! the configured store timeout at every call site.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{CachedEntry, EntrySummary};
use crate::Result;

/// Shared handle to the configured store
pub type SharedStore = Arc<dyn IdempotencyStore>;

/// Result of one expiry sweep
#[derive(Clone, Copy, Debug)]
pub struct SweepOutcome {
    /// Entries removed by this sweep
    pub removed: usize,

    /// Entries still live afterwards
    pub remaining: usize,
}

/// Point-in-time view of store contents
#[derive(Clone, Debug)]
pub struct StoreSnapshot {
    /// Live entry count
    pub size: usize,

    /// Summary of the oldest live entry, if any
    pub oldest_entry: Option<EntrySummary>,

    /// Summary of the newest live entry, if any
    pub newest_entry: Option<EntrySummary>,
}

/// Storage contract for cached idempotent responses.
///
/// Plain `insert` is last-write-wins: when two requests with the same key
/// race past the lookup, both execute and the later finisher's response is
/// the one retries see. Deployments that need at-most-once execution use
/// `insert_if_absent` as the reservation primitive instead.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Look up a live entry by key
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable
    async fn lookup(&self, key: &str) -> Result<Option<CachedEntry>>;

    /// Insert an entry, replacing any previous one
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable
    async fn insert(&self, key: &str, entry: CachedEntry) -> Result<()>;

    /// Insert only when no entry exists; returns true when the write won
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable
    async fn insert_if_absent(&self, key: &str, entry: CachedEntry) -> Result<bool>;

    /// Remove entries whose age exceeds `ttl` at `now`; returns counts
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable
    async fn sweep(&self, ttl: Duration, now: DateTime<Utc>) -> Result<SweepOutcome>;

    /// Remove all entries; returns how many were dropped
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable
    async fn clear(&self) -> Result<usize>;

    /// Snapshot size and boundary entries at `now`
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable
    async fn stats(&self, now: DateTime<Utc>) -> Result<StoreSnapshot>;
}

/// In-memory idempotency store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, CachedEntry>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CachedEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl IdempotencyStore for MemoryStore {
    async fn lookup(&self, key: &str) -> Result<Option<CachedEntry>> {
        Ok(self.lock().get(key).cloned())
    }

    async fn insert(&self, key: &str, entry: CachedEntry) -> Result<()> {
        self.lock().insert(key.to_string(), entry);
        Ok(())
    }

    async fn insert_if_absent(&self, key: &str, entry: CachedEntry) -> Result<bool> {
        let mut entries = self.lock();
        match entries.entry(key.to_string()) {
            std::collections::hash_map::Entry::Occupied(_) => Ok(false),
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(true)
            }
        }
    }

    async fn sweep(&self, ttl: Duration, now: DateTime<Utc>) -> Result<SweepOutcome> {
        // Snapshot the expired keys, then delete in short per-key critical
        // sections so lookups are never blocked behind a full scan.
        let expired: Vec<String> = self
            .lock()
            .iter()
            .filter(|(_, entry)| entry.is_expired(ttl, now))
            .map(|(key, _)| key.clone())
            .collect();

        let mut removed = 0;
        for key in &expired {
            let mut entries = self.lock();
            // The slot may have been replaced since the scan; only delete
            // entries that are still expired.
            if entries.get(key).is_some_and(|e| e.is_expired(ttl, now)) {
                entries.remove(key);
                removed += 1;
            }
        }

        let remaining = self.lock().len();
        Ok(SweepOutcome { removed, remaining })
    }

    async fn clear(&self) -> Result<usize> {
        let mut entries = self.lock();
        let size = entries.len();
        entries.clear();
        Ok(size)
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<StoreSnapshot> {
        let entries = self.lock();
        Ok(StoreSnapshot {
            size: entries.len(),
            oldest_entry: entries
                .values()
                .min_by_key(|e| e.created_at)
                .map(|e| EntrySummary::of(e, now)),
            newest_entry: entries
                .values()
                .max_by_key(|e| e.created_at)
                .map(|e| EntrySummary::of(e, now)),
        })
    }
}
