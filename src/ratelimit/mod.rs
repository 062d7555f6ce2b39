//! Fixed-window request limiter keyed by client address.
//!
//! Each key moves `Idle -> Counting -> Exceeded -> Idle`: the first request
//! opens a window, every request inside it bumps the count, requests above the
//! ceiling are rejected, and the first request after the window elapses opens
//! a fresh one. No explicit reset exists.

pub mod store;

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{RateLimitConfig, RateLimitKeyMode};

pub use store::{CounterError, CounterStore, MemoryCounterStore, RateLimitEntry};

/// Where a key sits in its window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Idle,
    Counting,
    Exceeded,
}

impl WindowState {
    pub fn of(entry: Option<&RateLimitEntry>, max_requests: u64) -> Self {
        match entry {
            None => WindowState::Idle,
            Some(e) if e.count == 0 => WindowState::Idle,
            Some(e) if e.count <= max_requests => WindowState::Counting,
            Some(_) => WindowState::Exceeded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { limit: u64, remaining: u64 },
    Exceeded { limit: u64, retry_after_secs: u64 },
}

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    enabled: bool,
    max_requests: u64,
    window: Duration,
    key_mode: RateLimitKeyMode,
    trust_forwarded: bool,
    op_timeout: std::time::Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, store: Arc<dyn CounterStore>) -> Self {
        Self {
            store,
            enabled: config.enabled,
            max_requests: config.max_requests,
            window: Duration::seconds(config.window().as_secs() as i64),
            key_mode: config.key_mode,
            trust_forwarded: config.trust_forwarded,
            op_timeout: config.op_timeout(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn trusts_forwarded(&self) -> bool {
        self.trust_forwarded
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Build the counter key for a client and request path
    pub fn key_for(&self, client: &str, path: &str) -> String {
        match self.key_mode {
            RateLimitKeyMode::Ip => format!("rl:{}", client),
            RateLimitKeyMode::IpRoute => format!("rl:{}:{}", client, route_class(path)),
        }
    }

    pub async fn check(&self, client: &str, path: &str) -> RateLimitDecision {
        self.check_at(client, path, Utc::now()).await
    }

    /// Count one request at `now` and decide whether it may proceed
    pub async fn check_at(&self, client: &str, path: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let key = self.key_for(client, path);

        let hit = tokio::time::timeout(self.op_timeout, self.store.hit(&key, now, self.window))
            .await
            .unwrap_or(Err(CounterError::Timeout));

        match hit {
            Ok(entry) => self.decide(&entry, now),
            Err(e) => {
                // Limiter outage must not take the API down with it
                warn!("Rate limiter failing open for '{}': {}", key, e);
                RateLimitDecision::Allowed {
                    limit: self.max_requests,
                    remaining: self.max_requests,
                }
            }
        }
    }

    fn decide(&self, entry: &RateLimitEntry, now: DateTime<Utc>) -> RateLimitDecision {
        match WindowState::of(Some(entry), self.max_requests) {
            WindowState::Exceeded => {
                let remaining_ms = (entry.window_end(self.window) - now).num_milliseconds().max(0);
                let retry_after_secs = ((remaining_ms as u64) + 999) / 1000;
                debug!("Rate limit exceeded for '{}' ({} requests)", entry.key, entry.count);
                RateLimitDecision::Exceeded {
                    limit: self.max_requests,
                    retry_after_secs: retry_after_secs.max(1),
                }
            }
            _ => RateLimitDecision::Allowed {
                limit: self.max_requests,
                remaining: self.max_requests.saturating_sub(entry.count),
            },
        }
    }

    pub async fn purge_expired(&self) -> usize {
        self.store.purge_expired(Utc::now(), self.window).await
    }
}

/// First path segment, or "root" for `/`
pub fn route_class(path: &str) -> &str {
    match path.trim_start_matches('/').split('/').next() {
        Some(segment) if !segment.is_empty() => segment,
        _ => "root",
    }
}
