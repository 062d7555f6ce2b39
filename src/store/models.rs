use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::TenantId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub corp_id: TenantId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
    pub favorited_contact: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable contact fields. Used for both create and full update; the tenant
/// is never part of it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactInput {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactFilter {
    /// Case-insensitive match on name, email or company
    pub search: Option<String>,
    pub favorite: Option<bool>,
}

impl ContactFilter {
    pub fn matches(&self, contact: &Contact) -> bool {
        if let Some(favorite) = self.favorite {
            if contact.favorited_contact != favorite {
                return false;
            }
        }
        match &self.search {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                [Some(&contact.name), contact.email.as_ref(), contact.company.as_ref()]
                    .into_iter()
                    .flatten()
                    .any(|field| field.to_lowercase().contains(&term))
            }
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub corp_id: TenantId,
    /// Recipient
    pub user_id: Uuid,
    pub title: String,
    pub body: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn is_visible_to(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationInput {
    pub user_id: Uuid,
    pub title: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Draft,
    #[default]
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub corp_id: TenantId,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub status: JobStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobInput {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub status: JobStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteToggle {
    pub id: Uuid,
    pub favorited: bool,
    pub favorited_contact: bool,
}

impl From<&Contact> for FavoriteToggle {
    fn from(contact: &Contact) -> Self {
        Self {
            id: contact.id,
            favorited: contact.favorited_contact,
            favorited_contact: contact.favorited_contact,
        }
    }
}
