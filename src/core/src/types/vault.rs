//! Vaults

use super::ids::{OrganizationId, PrincipalId, VaultId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Vault lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultStatus {
    Active,
    /// Readable, not writable
    Archived,
    /// Inactive: every operation is denied
    Suspended,
}

impl VaultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VaultStatus::Active => "active",
            VaultStatus::Archived => "archived",
            VaultStatus::Suspended => "suspended",
        }
    }
}

impl fmt::Display for VaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VaultStatus {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s {
            "active" => Ok(VaultStatus::Active),
            "archived" => Ok(VaultStatus::Archived),
            "suspended" => Ok(VaultStatus::Suspended),
            other => Err(crate::error::CoreError::invalid(format!("unknown vault status '{}'", other))),
        }
    }
}

/// A container of assets owned by exactly one organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub id: VaultId,

    pub organization_id: OrganizationId,

    pub name: String,

    pub created_by: PrincipalId,

    pub status: VaultStatus,

    /// Visible to every active role in the organization, viewers included
    #[serde(default)]
    pub public: bool,

    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Vault {
    /// Create a new active, private vault
    pub fn new(organization_id: OrganizationId, name: impl Into<String>, created_by: PrincipalId) -> Self {
        Self {
            id: VaultId::new(),
            organization_id,
            name: name.into(),
            created_by,
            status: VaultStatus::Active,
            public: false,
            deleted_at: None,
        }
    }

    pub fn with_status(mut self, status: VaultStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    pub fn soft_delete(mut self, at: DateTime<Utc>) -> Self {
        self.deleted_at = Some(at);
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Suspended vaults are inactive
    pub fn is_inactive(&self) -> bool {
        self.status == VaultStatus::Suspended
    }

    pub fn is_read_only(&self) -> bool {
        self.status == VaultStatus::Archived
    }
}
