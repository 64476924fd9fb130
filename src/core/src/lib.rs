//! # DocVault Core
//!
//! Tenancy data model shared by the authorization engine and its storage
//! collaborators: organizations, memberships, vaults, assets and the
//! vault/asset join relation.
//!
//! Entities are independent records joined by explicit foreign keys. The
//! hierarchy (organization → vault → asset) is a data dependency, never a
//! type relationship.

pub mod types;
pub mod error;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use types::{
    Asset, AssetId, Membership, MembershipStatus, Organization, OrganizationId, PrincipalId,
    Role, Vault, VaultAsset, VaultId, VaultStatus,
};
