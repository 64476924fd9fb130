//! Tenancy entities

pub mod ids;
pub mod organization;
pub mod membership;
pub mod vault;
pub mod asset;

// Re-export commonly used types
pub use ids::{AssetId, OrganizationId, PrincipalId, VaultId};
pub use organization::Organization;
pub use membership::{Membership, MembershipStatus, Role};
pub use vault::{Vault, VaultStatus};
pub use asset::{Asset, VaultAsset};
