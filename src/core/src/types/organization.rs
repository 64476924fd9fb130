//! Organizations (tenants)

use super::ids::OrganizationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tenant. Owns vaults; never owned by anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,

    pub name: String,

    /// Inactive organizations are invisible to non-administrative operations
    pub active: bool,

    /// Soft-delete marker
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Organization {
    /// Create a new active organization
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: OrganizationId::new(),
            name: name.into(),
            active: true,
            deleted_at: None,
        }
    }

    /// Mark the organization as soft-deleted
    pub fn soft_delete(mut self, at: DateTime<Utc>) -> Self {
        self.deleted_at = Some(at);
        self
    }

    /// Toggle the active flag
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Active and not soft-deleted
    pub fn is_live(&self) -> bool {
        self.active && !self.is_deleted()
    }
}
