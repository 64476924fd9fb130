//! Assets and the vault/asset join relation

use super::ids::{AssetId, OrganizationId, PrincipalId, VaultId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An uploaded document.
///
/// The owning organization is reached through the vault binding. The
/// optional `organization_id` column is a legacy direct binding; when set
/// it must agree with the vault's organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,

    pub file_name: String,

    /// Principal that uploaded the asset
    pub uploaded_by: PrincipalId,

    #[serde(default)]
    pub organization_id: Option<OrganizationId>,

    #[serde(default)]
    pub public: bool,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Asset {
    pub fn new(file_name: impl Into<String>, uploaded_by: PrincipalId) -> Self {
        Self {
            id: AssetId::new(),
            file_name: file_name.into(),
            uploaded_by,
            organization_id: None,
            public: false,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    pub fn with_public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    /// Set the legacy direct organization column
    pub fn with_organization(mut self, organization_id: OrganizationId) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    pub fn soft_delete(mut self, at: DateTime<Utc>) -> Self {
        self.deleted_at = Some(at);
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Join row placing an asset in a vault. Its existence is a visibility
/// grant: an asset without one is an orphan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultAsset {
    pub vault_id: VaultId,

    pub asset_id: AssetId,

    pub added_at: DateTime<Utc>,
}

impl VaultAsset {
    pub fn new(vault_id: VaultId, asset_id: AssetId) -> Self {
        Self {
            vault_id,
            asset_id,
            added_at: Utc::now(),
        }
    }
}
