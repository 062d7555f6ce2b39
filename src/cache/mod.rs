//! Read-through cache for idempotent reads.
//!
//! Keys are `cache:{tenant}:{resource}:g{generation}:{digest}` where the
//! digest covers method, path, tenant and normalised query. A write bumps the
//! namespace generation before deleting the namespace's entries, so a read
//! that loaded data before the write can only ever store it under a dead key.

pub mod store;

use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::config::CacheConfig;
use crate::error::ApiError;
use crate::types::{ResourceKind, TenantId};
use uuid::Uuid;

pub use store::{CacheEntry, CacheError, CacheStore, MemoryCacheStore};

/// Deterministic identity of a read request within one tenant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSignature {
    pub tenant_id: TenantId,
    pub resource: ResourceKind,
    pub method: String,
    pub path: String,
    pub query: String,
    /// Set for reads whose result depends on the calling user
    pub user_id: Option<Uuid>,
}

impl RequestSignature {
    pub fn new(
        tenant_id: TenantId,
        resource: ResourceKind,
        method: &str,
        path: &str,
        query: Option<&str>,
    ) -> Self {
        Self {
            tenant_id,
            resource,
            method: method.to_ascii_uppercase(),
            path: path.trim_end_matches('/').to_string(),
            query: normalize_query(query.unwrap_or("")),
            user_id: None,
        }
    }

    /// Narrow the signature to one user within the tenant
    pub fn per_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn namespace(&self) -> String {
        namespace(self.tenant_id, self.resource)
    }

    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.path.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.tenant_id.to_string().as_bytes());
        hasher.update(b"\n");
        hasher.update(self.query.as_bytes());
        if let Some(user_id) = self.user_id {
            hasher.update(b"\n");
            hasher.update(user_id.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn key(&self, generation: u64) -> String {
        format!("{}:g{}:{}", self.namespace(), generation, self.digest())
    }
}

fn namespace(tenant_id: TenantId, resource: ResourceKind) -> String {
    format!("cache:{}:{}", tenant_id, resource)
}

/// Sort query pairs so parameter order does not split the cache
fn normalize_query(query: &str) -> String {
    let mut pairs: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
    pairs.sort_unstable();
    pairs.join("&")
}

/// Cache tier facade. Every store call is bounded by `op_timeout`; any store
/// failure is treated as a miss.
#[derive(Clone)]
pub struct CacheTier {
    store: Arc<dyn CacheStore>,
    enabled: bool,
    ttl: Duration,
    op_timeout: Duration,
}

impl CacheTier {
    pub fn new(config: &CacheConfig, store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            enabled: config.enabled,
            ttl: config.ttl(),
            op_timeout: config.op_timeout(),
        }
    }

    async fn bounded<T>(&self, op: impl Future<Output = Result<T, CacheError>>) -> Result<T, CacheError> {
        tokio::time::timeout(self.op_timeout, op)
            .await
            .unwrap_or(Err(CacheError::Timeout))
    }

    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        match self.bounded(self.store.get(key)).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Cache lookup failed for '{}', treating as miss: {}", key, e);
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: serde_json::Value) {
        if let Err(e) = self.bounded(self.store.set(key, value, self.ttl)).await {
            warn!("Cache store failed for '{}': {}", key, e);
        }
    }

    /// Serve `signature` from cache, or run `load` and remember its result
    pub async fn read_through<T, F, Fut>(&self, signature: &RequestSignature, load: F) -> Result<T, ApiError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        if !self.enabled {
            return load().await;
        }

        let namespace = signature.namespace();
        let generation = match self.bounded(self.store.generation(&namespace)).await {
            Ok(generation) => generation,
            Err(e) => {
                warn!("Cache generation lookup failed for '{}', bypassing cache: {}", namespace, e);
                return load().await;
            }
        };
        let key = signature.key(generation);

        if let Some(cached) = self.get(&key).await {
            match serde_json::from_value::<T>(cached) {
                Ok(value) => {
                    debug!("Cache hit: {}", key);
                    return Ok(value);
                }
                Err(e) => warn!("Discarding undecodable cache entry '{}': {}", key, e),
            }
        }

        debug!("Cache miss: {}", key);
        let value = load().await?;

        match serde_json::to_value(&value) {
            Ok(json) => self.set(&key, json).await,
            Err(e) => warn!("Skipping cache store for '{}': {}", key, e),
        }

        Ok(value)
    }

    /// Drop every cached read of `resource` for `tenant_id`. Called on the
    /// write path once the write has succeeded.
    pub async fn invalidate(&self, tenant_id: TenantId, resource: ResourceKind) {
        let namespace = namespace(tenant_id, resource);

        match self.bounded(self.store.bump_generation(&namespace)).await {
            Ok(generation) => debug!("Cache namespace '{}' advanced to g{}", namespace, generation),
            Err(e) => error!("Cache generation bump failed for '{}': {}", namespace, e),
        }

        match self.bounded(self.store.delete_prefix(&format!("{}:", namespace))).await {
            Ok(removed) => debug!("Invalidated {} cache entries in '{}'", removed, namespace),
            Err(e) => error!("Cache invalidation failed for '{}': {}", namespace, e),
        }
    }

    pub async fn purge_expired(&self) -> usize {
        self.store.purge_expired().await
    }
}
