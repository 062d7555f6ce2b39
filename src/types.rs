/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Tenant (corporation) identifier. Every domain record carries one and every
/// store call takes one; it only ever comes from a validated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric role carried in the token. Higher levels include lower ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleLevel(pub u8);

impl RoleLevel {
    pub const VIEWER: RoleLevel = RoleLevel(1);
    pub const MEMBER: RoleLevel = RoleLevel(2);
    pub const MANAGER: RoleLevel = RoleLevel(3);
    pub const ADMIN: RoleLevel = RoleLevel(4);

    /// Check if this role satisfies a route's minimum requirement
    pub fn satisfies(self, minimum: RoleLevel) -> bool {
        self >= minimum
    }
}

impl fmt::Display for RoleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resource families served behind the pipeline. Used as the cache
/// namespace so a write can invalidate every read of the same family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Contacts,
    Notifications,
    Jobs,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Contacts => "contacts",
            ResourceKind::Notifications => "notifications",
            ResourceKind::Jobs => "jobs",
        }
    }

    pub fn singular(&self) -> &'static str {
        match self {
            ResourceKind::Contacts => "Contact",
            ResourceKind::Notifications => "Notification",
            ResourceKind::Jobs => "Job",
        }
    }

    /// Resolve the resource family from the first segment of a request path
    pub fn from_path(path: &str) -> Option<Self> {
        match path.trim_start_matches('/').split('/').next()? {
            "contacts" => Some(ResourceKind::Contacts),
            "notifications" => Some(ResourceKind::Notifications),
            "jobs" => Some(ResourceKind::Jobs),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
