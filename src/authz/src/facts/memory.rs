//! In-memory tenancy store
//!
//! Holds every relation behind a single lock, so each `fetch_facts` call
//! observes one consistent snapshot.

use super::{FactSnapshot, FactStore, MembershipFact, FactBundle, VaultBinding};
use crate::error::{AuthzError, Result};
use crate::membership::MembershipSource;
use crate::types::{EntityType, ListScope, Row};
use async_trait::async_trait;
use docvault_core::{
    Asset, AssetId, CoreError, Membership, MembershipStatus, Organization, OrganizationId,
    PrincipalId, Role, Vault, VaultAsset, VaultId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct TenancyState {
    organizations: HashMap<OrganizationId, Organization>,
    memberships: HashMap<(OrganizationId, PrincipalId), Membership>,
    vaults: HashMap<VaultId, Vault>,
    assets: HashMap<AssetId, Asset>,
    /// One binding per asset (many-to-one toward vault)
    bindings: HashMap<AssetId, VaultAsset>,
}

impl TenancyState {
    fn membership_fact(&self, organization: OrganizationId, principal: PrincipalId) -> MembershipFact {
        match self.memberships.get(&(organization, principal)) {
            Some(m) => MembershipFact::Member(m.clone()),
            None => MembershipFact::NonMember,
        }
    }

    fn organization_of(&self, vault: &Vault) -> Result<Organization> {
        self.organizations
            .get(&vault.organization_id)
            .cloned()
            .ok_or_else(|| {
                AuthzError::InconsistentFacts(format!(
                    "vault {} references missing organization {}",
                    vault.id, vault.organization_id
                ))
            })
    }
}

/// In-memory implementation of [`FactStore`] and [`MembershipSource`]
#[derive(Clone, Default)]
pub struct InMemoryTenancyStore {
    state: Arc<RwLock<TenancyState>>,
    /// Simulated storage outage
    unavailable: Arc<AtomicBool>,
}

impl InMemoryTenancyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every read fail until reset
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuthzError::DatabaseError("store unavailable".to_string()));
        }
        Ok(())
    }

    /// Insert or replace an organization
    pub async fn put_organization(&self, organization: Organization) {
        let mut state = self.state.write().await;
        state.organizations.insert(organization.id, organization);
    }

    /// Insert or replace a vault
    pub async fn put_vault(&self, vault: Vault) {
        let mut state = self.state.write().await;
        state.vaults.insert(vault.id, vault);
    }

    /// Insert or replace an asset
    pub async fn put_asset(&self, asset: Asset) {
        let mut state = self.state.write().await;
        state.assets.insert(asset.id, asset);
    }

    /// Record a new membership, enforcing uniqueness per (organization,
    /// principal) and at most one primary membership per principal
    pub async fn add_membership(&self, membership: Membership) -> Result<()> {
        let mut state = self.state.write().await;
        let key = (membership.organization_id, membership.principal_id);

        if state.memberships.contains_key(&key) {
            return Err(CoreError::DuplicateMembership {
                organization: membership.organization_id,
                principal: membership.principal_id,
            }
            .into());
        }

        if membership.is_primary
            && state
                .memberships
                .values()
                .any(|m| m.principal_id == membership.principal_id && m.is_primary)
        {
            return Err(CoreError::DuplicatePrimary(membership.principal_id).into());
        }

        state.memberships.insert(key, membership);
        Ok(())
    }

    /// Move a membership through its state machine
    pub async fn transition_membership(
        &self,
        organization: OrganizationId,
        principal: PrincipalId,
        to: MembershipStatus,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let membership = state
            .memberships
            .get_mut(&(organization, principal))
            .ok_or_else(|| CoreError::not_found(format!("membership {}/{}", organization, principal)))?;

        membership.transition(to)?;
        Ok(())
    }

    pub async fn change_role(&self, organization: OrganizationId, principal: PrincipalId, role: Role) -> Result<()> {
        let mut state = self.state.write().await;
        let membership = state
            .memberships
            .get_mut(&(organization, principal))
            .ok_or_else(|| CoreError::not_found(format!("membership {}/{}", organization, principal)))?;

        membership.change_role(role)?;
        Ok(())
    }

    /// Place an asset in a vault. An asset lives in at most one vault.
    pub async fn bind_asset(&self, vault: VaultId, asset: AssetId) -> Result<()> {
        let mut state = self.state.write().await;

        if !state.vaults.contains_key(&vault) {
            return Err(CoreError::not_found(format!("vault {}", vault)).into());
        }
        if !state.assets.contains_key(&asset) {
            return Err(CoreError::not_found(format!("asset {}", asset)).into());
        }
        if let Some(existing) = state.bindings.get(&asset) {
            if existing.vault_id != vault {
                return Err(CoreError::invalid(format!(
                    "asset {} already bound to vault {}",
                    asset, existing.vault_id
                ))
                .into());
            }
            return Ok(());
        }

        state.bindings.insert(asset, VaultAsset::new(vault, asset));
        Ok(())
    }

    /// Remove an asset's binding, leaving it orphaned
    pub async fn unbind_asset(&self, asset: AssetId) {
        let mut state = self.state.write().await;
        state.bindings.remove(&asset);
    }

    fn sorted(ids: impl IntoIterator<Item = Uuid>) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = ids.into_iter().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl FactStore for InMemoryTenancyStore {
    async fn fetch_facts(
        &self,
        principal: &PrincipalId,
        entity: EntityType,
        row_id: Uuid,
    ) -> Result<Option<FactSnapshot>> {
        self.check_available()?;
        let state = self.state.read().await;

        let snapshot = match entity {
            EntityType::Organization => {
                let Some(org) = state.organizations.get(&OrganizationId(row_id)) else {
                    return Ok(None);
                };
                FactSnapshot {
                    row: Row::Organization(org.clone()),
                    facts: FactBundle::new()
                        .with_organization(org.clone())
                        .with_membership(state.membership_fact(org.id, *principal)),
                }
            }
            EntityType::Vault => {
                let Some(vault) = state.vaults.get(&VaultId(row_id)) else {
                    return Ok(None);
                };
                let org = state.organization_of(vault)?;
                let membership = state.membership_fact(org.id, *principal);
                FactSnapshot {
                    row: Row::Vault(vault.clone()),
                    facts: FactBundle::new().with_organization(org).with_membership(membership),
                }
            }
            EntityType::Asset => {
                let Some(asset) = state.assets.get(&AssetId(row_id)) else {
                    return Ok(None);
                };
                let facts = match state.bindings.get(&asset.id) {
                    None => FactBundle::new().with_binding(VaultBinding::Orphan),
                    Some(binding) => {
                        let vault = state.vaults.get(&binding.vault_id).cloned().ok_or_else(|| {
                            AuthzError::InconsistentFacts(format!(
                                "asset {} bound to missing vault {}",
                                asset.id, binding.vault_id
                            ))
                        })?;
                        let org = state.organization_of(&vault)?;
                        let membership = state.membership_fact(org.id, *principal);
                        FactBundle::new()
                            .with_binding(VaultBinding::Bound(binding.clone()))
                            .with_vault(vault)
                            .with_organization(org)
                            .with_membership(membership)
                    }
                };
                FactSnapshot {
                    row: Row::Asset(asset.clone()),
                    facts,
                }
            }
        };

        Ok(Some(snapshot))
    }

    async fn candidates(
        &self,
        entity: EntityType,
        scope: &ListScope,
        organizations: &[OrganizationId],
    ) -> Result<Vec<Uuid>> {
        self.check_available()?;
        let state = self.state.read().await;

        let in_scope_org = |org: &OrganizationId| -> bool {
            organizations.contains(org)
                && match scope {
                    ListScope::Organization(scoped) => scoped == org,
                    _ => true,
                }
        };

        let ids = match (entity, scope) {
            (EntityType::Organization, ListScope::Vault(_)) => {
                return Err(AuthzError::InvalidInput(
                    "organizations cannot be listed within a vault".to_string(),
                ))
            }
            (EntityType::Organization, _) => Self::sorted(
                state
                    .organizations
                    .keys()
                    .filter(|id| in_scope_org(*id))
                    .map(|id| id.0),
            ),
            (EntityType::Vault, _) => Self::sorted(
                state
                    .vaults
                    .values()
                    .filter(|v| in_scope_org(&v.organization_id))
                    .filter(|v| match scope {
                        ListScope::Vault(scoped) => *scoped == v.id,
                        _ => true,
                    })
                    .map(|v| v.id.0),
            ),
            (EntityType::Asset, _) => {
                // Orphans have no binding and never appear here
                let vault_orgs: BTreeMap<VaultId, OrganizationId> = state
                    .vaults
                    .values()
                    .map(|v| (v.id, v.organization_id))
                    .collect();

                Self::sorted(
                    state
                        .bindings
                        .values()
                        .filter(|b| {
                            vault_orgs
                                .get(&b.vault_id)
                                .map(|org| in_scope_org(org))
                                .unwrap_or(false)
                        })
                        .filter(|b| match scope {
                            ListScope::Vault(scoped) => *scoped == b.vault_id,
                            _ => true,
                        })
                        .map(|b| b.asset_id.0),
                )
            }
        };

        Ok(ids)
    }
}

#[async_trait]
impl MembershipSource for InMemoryTenancyStore {
    async fn memberships_of(&self, principal: &PrincipalId) -> Result<Vec<Membership>> {
        self.check_available()?;
        let state = self.state.read().await;

        Ok(state
            .memberships
            .values()
            .filter(|m| m.principal_id == *principal)
            .cloned()
            .collect())
    }
}
