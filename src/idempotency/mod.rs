//! Idempotency protection for write requests
//!
//! Clients opt in by sending an `X-Idempotency-Key` header on a write
//! (POST/PUT/PATCH/DELETE). The first response in the 200–399 range is
//! cached under a key derived from `(method, path, token)`; any retry of
//! the same triple is answered with a 409 conflict carrying that original
//! response instead of re-executing the operation.
//!
//! Storage sits behind [`IdempotencyStore`] so the in-memory baseline can
//! be swapped for an external backend. Every store call in the request
//! path is bounded by a timeout; what happens when it trips is governed by
//! [`FailMode`].

pub mod key;
pub mod middleware;
pub mod store;
pub mod sweeper;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use key::derive_key;
pub use middleware::{IDEMPOTENCY_HEADER, idempotency_middleware};
pub use store::{IdempotencyStore, MemoryStore, SharedStore, StoreSnapshot, SweepOutcome};
pub use sweeper::{SweeperHandle, spawn_sweeper};

/// Default entry lifetime (24 hours)
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default period between expiry sweeps (1 hour)
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Default bound on individual store operations
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Fail mode used when the store is unreachable or slow
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailMode {
    /// Treat the failure as a cache miss and let the request through.
    /// Duplicate protection degrades; traffic keeps flowing.
    #[default]
    Open,
    /// Reject the request with 503 until the store recovers
    Closed,
}

/// Idempotency subsystem configuration
#[derive(Clone, Debug)]
pub struct IdempotencyConfig {
    /// How long a cached entry stays live
    pub ttl: Duration,

    /// Period between expiry sweeps
    pub sweep_interval: Duration,

    /// Bound on individual store operations
    pub store_timeout: Duration,

    /// Behavior when a store operation fails or times out
    pub fail_mode: FailMode,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            fail_mode: FailMode::Open,
        }
    }
}

/// A captured first-time response
#[derive(Clone, Debug)]
pub struct CachedEntry {
    /// Response body bytes as sent to the original caller
    pub body: Vec<u8>,

    /// Response status code
    pub status: u16,

    /// When the response was captured
    pub created_at: DateTime<Utc>,
}

impl CachedEntry {
    /// Age of this entry at `now`, clamped to zero
    #[must_use]
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_seconds().max(0)
    }

    /// True when the entry's age exceeds `ttl` at `now`
    #[must_use]
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        (now - self.created_at)
            .to_std()
            .is_ok_and(|age| age > ttl)
    }
}

/// Timestamp and age of one boundary entry in a [`StoreSnapshot`]
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySummary {
    /// RFC 3339 capture timestamp
    pub processed_at: String,

    /// Whole seconds since capture
    pub age_seconds: i64,
}

impl EntrySummary {
    /// Summarize an entry at `now`
    #[must_use]
    pub fn of(entry: &CachedEntry, now: DateTime<Utc>) -> Self {
        Self {
            processed_at: entry.created_at.to_rfc3339(),
            age_seconds: entry.age_seconds(now),
        }
    }
}
