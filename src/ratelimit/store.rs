use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),

    #[error("counter store did not answer in time")]
    Timeout,
}

/// Counter for one limiter key inside its current window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub key: String,
    pub window_start: DateTime<Utc>,
    pub count: u64,
}

impl RateLimitEntry {
    fn open(key: &str, now: DateTime<Utc>) -> Self {
        Self {
            key: key.to_string(),
            window_start: now,
            count: 0,
        }
    }

    pub fn window_end(&self, window: Duration) -> DateTime<Utc> {
        self.window_start + window
    }

    pub fn is_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now >= self.window_end(window)
    }
}

/// Addressable store holding limiter counters. Implementations must make
/// `hit` atomic per key: concurrent hits on one key never lose a count.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Count one request for `key`, opening a new window when the previous one
    /// has elapsed, and return the entry after the increment.
    async fn hit(&self, key: &str, now: DateTime<Utc>, window: Duration) -> Result<RateLimitEntry, CounterError>;

    /// Drop entries whose window has elapsed. Returns how many were removed.
    async fn purge_expired(&self, now: DateTime<Utc>, window: Duration) -> usize;
}

/// Single-instance counter store. Each key lives in its own DashMap shard
/// entry, so the read-modify-write in `hit` holds that key's lock only.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    entries: DashMap<String, RateLimitEntry>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn hit(&self, key: &str, now: DateTime<Utc>, window: Duration) -> Result<RateLimitEntry, CounterError> {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry::open(key, now));

        if entry.is_expired(now, window) {
            *entry = RateLimitEntry::open(key, now);
        }
        entry.count += 1;

        Ok(entry.value().clone())
    }

    async fn purge_expired(&self, now: DateTime<Utc>, window: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now, window));
        before.saturating_sub(self.entries.len())
    }
}
