use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    Contact, ContactFilter, ContactInput, ContactStore, Job, JobInput, JobStore, Notification,
    NotificationInput, NotificationStore, StoreError,
};
use crate::types::{ResourceKind, TenantId};

/// In-process store for single-instance deployments and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    contacts: RwLock<HashMap<Uuid, Contact>>,
    notifications: RwLock<HashMap<Uuid, Notification>>,
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(kind: ResourceKind, id: Uuid) -> StoreError {
    StoreError::NotFound { kind, id }
}

fn normalized_email(email: &Option<String>) -> Option<String> {
    email.as_ref().map(|e| e.trim().to_lowercase())
}

fn ensure_unique_email(
    contacts: &HashMap<Uuid, Contact>,
    tenant: TenantId,
    email: &Option<String>,
    except: Option<Uuid>,
) -> Result<(), StoreError> {
    let Some(email) = normalized_email(email) else {
        return Ok(());
    };
    let taken = contacts.values().any(|c| {
        c.corp_id == tenant
            && Some(c.id) != except
            && normalized_email(&c.email).as_deref() == Some(email.as_str())
    });
    if taken {
        return Err(StoreError::Conflict(format!(
            "A contact with email '{}' already exists",
            email
        )));
    }
    Ok(())
}

#[async_trait]
impl ContactStore for MemoryStore {
    async fn list(&self, tenant: TenantId, filter: &ContactFilter) -> Result<Vec<Contact>, StoreError> {
        let contacts = self.contacts.read().await;
        let mut rows: Vec<Contact> = contacts
            .values()
            .filter(|c| c.corp_id == tenant && filter.matches(c))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn get(&self, tenant: TenantId, id: Uuid) -> Result<Contact, StoreError> {
        let contacts = self.contacts.read().await;
        contacts
            .get(&id)
            .filter(|c| c.corp_id == tenant)
            .cloned()
            .ok_or_else(|| not_found(ResourceKind::Contacts, id))
    }

    async fn create(&self, tenant: TenantId, input: ContactInput) -> Result<Contact, StoreError> {
        let mut contacts = self.contacts.write().await;
        ensure_unique_email(&contacts, tenant, &input.email, None)?;

        let now = Utc::now();
        let contact = Contact {
            id: Uuid::new_v4(),
            corp_id: tenant,
            name: input.name,
            email: input.email,
            phone: input.phone,
            company: input.company,
            notes: input.notes,
            favorited_contact: false,
            created_at: now,
            updated_at: now,
        };
        contacts.insert(contact.id, contact.clone());
        Ok(contact)
    }

    async fn update(&self, tenant: TenantId, id: Uuid, input: ContactInput) -> Result<Contact, StoreError> {
        let mut contacts = self.contacts.write().await;
        ensure_unique_email(&contacts, tenant, &input.email, Some(id))?;

        let contact = contacts
            .get_mut(&id)
            .filter(|c| c.corp_id == tenant)
            .ok_or_else(|| not_found(ResourceKind::Contacts, id))?;

        contact.name = input.name;
        contact.email = input.email;
        contact.phone = input.phone;
        contact.company = input.company;
        contact.notes = input.notes;
        contact.updated_at = Utc::now();
        Ok(contact.clone())
    }

    async fn delete(&self, tenant: TenantId, id: Uuid) -> Result<(), StoreError> {
        let mut contacts = self.contacts.write().await;
        match contacts.get(&id) {
            Some(c) if c.corp_id == tenant => {
                contacts.remove(&id);
                Ok(())
            }
            _ => Err(not_found(ResourceKind::Contacts, id)),
        }
    }

    async fn toggle_favorite(&self, tenant: TenantId, id: Uuid) -> Result<Contact, StoreError> {
        let mut contacts = self.contacts.write().await;
        let contact = contacts
            .get_mut(&id)
            .filter(|c| c.corp_id == tenant)
            .ok_or_else(|| not_found(ResourceKind::Contacts, id))?;

        contact.favorited_contact = !contact.favorited_contact;
        contact.updated_at = Utc::now();
        Ok(contact.clone())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn list(&self, tenant: TenantId, user_id: Uuid, unread_only: bool) -> Result<Vec<Notification>, StoreError> {
        let notifications = self.notifications.read().await;
        let mut rows: Vec<Notification> = notifications
            .values()
            .filter(|n| n.corp_id == tenant && n.is_visible_to(user_id))
            .filter(|n| !unread_only || !n.read)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn create(&self, tenant: TenantId, input: NotificationInput) -> Result<Notification, StoreError> {
        let notification = Notification {
            id: Uuid::new_v4(),
            corp_id: tenant,
            user_id: input.user_id,
            title: input.title,
            body: input.body,
            read: false,
            created_at: Utc::now(),
        };
        self.notifications
            .write()
            .await
            .insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn mark_read(&self, tenant: TenantId, user_id: Uuid, id: Uuid) -> Result<Notification, StoreError> {
        let mut notifications = self.notifications.write().await;
        let notification = notifications
            .get_mut(&id)
            .filter(|n| n.corp_id == tenant && n.is_visible_to(user_id))
            .ok_or_else(|| not_found(ResourceKind::Notifications, id))?;

        notification.read = true;
        Ok(notification.clone())
    }

    async fn mark_all_read(&self, tenant: TenantId, user_id: Uuid) -> Result<usize, StoreError> {
        let mut notifications = self.notifications.write().await;
        let mut changed = 0;
        for n in notifications
            .values_mut()
            .filter(|n| n.corp_id == tenant && n.is_visible_to(user_id) && !n.read)
        {
            n.read = true;
            changed += 1;
        }
        Ok(changed)
    }

    async fn delete(&self, tenant: TenantId, user_id: Uuid, id: Uuid) -> Result<(), StoreError> {
        let mut notifications = self.notifications.write().await;
        match notifications.get(&id) {
            Some(n) if n.corp_id == tenant && n.is_visible_to(user_id) => {
                notifications.remove(&id);
                Ok(())
            }
            _ => Err(not_found(ResourceKind::Notifications, id)),
        }
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn list(&self, tenant: TenantId) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        let mut rows: Vec<Job> = jobs.values().filter(|j| j.corp_id == tenant).cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn get(&self, tenant: TenantId, id: Uuid) -> Result<Job, StoreError> {
        let jobs = self.jobs.read().await;
        jobs.get(&id)
            .filter(|j| j.corp_id == tenant)
            .cloned()
            .ok_or_else(|| not_found(ResourceKind::Jobs, id))
    }

    async fn create(&self, tenant: TenantId, created_by: Uuid, input: JobInput) -> Result<Job, StoreError> {
        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            corp_id: tenant,
            title: input.title,
            description: input.description,
            location: input.location,
            status: input.status,
            created_by,
            created_at: now,
            updated_at: now,
        };
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(job)
    }

    async fn update(&self, tenant: TenantId, id: Uuid, input: JobInput) -> Result<Job, StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&id)
            .filter(|j| j.corp_id == tenant)
            .ok_or_else(|| not_found(ResourceKind::Jobs, id))?;

        job.title = input.title;
        job.description = input.description;
        job.location = input.location;
        job.status = input.status;
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn delete(&self, tenant: TenantId, id: Uuid) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get(&id) {
            Some(j) if j.corp_id == tenant => {
                jobs.remove(&id);
                Ok(())
            }
            _ => Err(not_found(ResourceKind::Jobs, id)),
        }
    }
}
