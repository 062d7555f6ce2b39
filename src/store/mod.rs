//! Tenant-scoped persistence seams used by the resource handlers.
//!
//! Every operation takes the caller's `TenantId` as its first argument and
//! must apply it as a filter on reads and writes. A record owned by another
//! tenant is reported as not found.

pub mod memory;
pub mod models;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::types::{ResourceKind, TenantId};

pub use memory::MemoryStore;
pub use models::{
    Contact, ContactFilter, ContactInput, FavoriteToggle, Job, JobInput, JobStatus, Notification,
    NotificationInput,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{} {id} not found", kind.singular())]
    NotFound { kind: ResourceKind, id: Uuid },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn list(&self, tenant: TenantId, filter: &ContactFilter) -> Result<Vec<Contact>, StoreError>;

    async fn get(&self, tenant: TenantId, id: Uuid) -> Result<Contact, StoreError>;

    async fn create(&self, tenant: TenantId, input: ContactInput) -> Result<Contact, StoreError>;

    async fn update(&self, tenant: TenantId, id: Uuid, input: ContactInput) -> Result<Contact, StoreError>;

    async fn delete(&self, tenant: TenantId, id: Uuid) -> Result<(), StoreError>;

    /// Flip the favorite flag and return the contact after the flip
    async fn toggle_favorite(&self, tenant: TenantId, id: Uuid) -> Result<Contact, StoreError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Notifications addressed to `user_id`
    async fn list(&self, tenant: TenantId, user_id: Uuid, unread_only: bool) -> Result<Vec<Notification>, StoreError>;

    async fn create(&self, tenant: TenantId, input: NotificationInput) -> Result<Notification, StoreError>;

    async fn mark_read(&self, tenant: TenantId, user_id: Uuid, id: Uuid) -> Result<Notification, StoreError>;

    /// Returns how many notifications changed state
    async fn mark_all_read(&self, tenant: TenantId, user_id: Uuid) -> Result<usize, StoreError>;

    async fn delete(&self, tenant: TenantId, user_id: Uuid, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn list(&self, tenant: TenantId) -> Result<Vec<Job>, StoreError>;

    async fn get(&self, tenant: TenantId, id: Uuid) -> Result<Job, StoreError>;

    async fn create(&self, tenant: TenantId, created_by: Uuid, input: JobInput) -> Result<Job, StoreError>;

    async fn update(&self, tenant: TenantId, id: Uuid, input: JobInput) -> Result<Job, StoreError>;

    async fn delete(&self, tenant: TenantId, id: Uuid) -> Result<(), StoreError>;
}

/// Store handles shared by all handlers
#[derive(Clone)]
pub struct Stores {
    pub contacts: Arc<dyn ContactStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub jobs: Arc<dyn JobStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            contacts: store.clone(),
            notifications: store.clone(),
            jobs: store,
        }
    }
}
