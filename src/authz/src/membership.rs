//! Membership index
//!
//! The sole source of organization-level visibility. It reads the membership
//! relation and nothing else: no organization, vault or policy lookups. That
//! makes it a leaf of the evaluation graph, so no rule that depends on it can
//! ever be consulted while computing it.

use crate::error::{AuthzError, Result};
use crate::types::EntityType;
use async_trait::async_trait;
use docvault_core::{Membership, OrganizationId, PrincipalId, Role};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Read access to the membership relation.
///
/// Implementations run with internal privilege and must not consult any
/// other relation.
#[async_trait]
pub trait MembershipSource: Send + Sync {
    /// Every membership row recorded for the principal, any status
    async fn memberships_of(&self, principal: &PrincipalId) -> Result<Vec<Membership>>;
}

/// Active (organization, role) pairs for one principal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveMemberships {
    entries: BTreeMap<OrganizationId, Role>,
}

impl ActiveMemberships {
    /// Keep only rows that are active and belong to `principal`
    pub fn from_memberships<'a, I>(principal: &PrincipalId, memberships: I) -> Self
    where
        I: IntoIterator<Item = &'a Membership>,
    {
        let entries = memberships
            .into_iter()
            .filter(|m| m.principal_id == *principal && m.is_active())
            .map(|m| (m.organization_id, m.role))
            .collect();

        Self { entries }
    }

    pub fn contains(&self, organization: &OrganizationId) -> bool {
        self.entries.contains_key(organization)
    }

    pub fn role_in(&self, organization: &OrganizationId) -> Option<Role> {
        self.entries.get(organization).copied()
    }

    /// Organization ids in ascending order
    pub fn organization_ids(&self) -> Vec<OrganizationId> {
        self.entries.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OrganizationId, &Role)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Computes active memberships from a [`MembershipSource`]
#[derive(Clone)]
pub struct MembershipIndex {
    source: Arc<dyn MembershipSource>,
}

impl MembershipIndex {
    pub fn new(source: Arc<dyn MembershipSource>) -> Self {
        Self { source }
    }

    /// Organizations where the principal holds an `active` membership.
    /// Source failures surface as `FactUnavailable`.
    pub async fn active_organizations_for(&self, principal: &PrincipalId) -> Result<ActiveMemberships> {
        let rows = self.source.memberships_of(principal).await.map_err(|e| match e {
            e @ AuthzError::FactUnavailable { .. } => e,
            other => AuthzError::fact_unavailable(EntityType::Organization, principal, other.to_string()),
        })?;
        let active = ActiveMemberships::from_memberships(principal, &rows);

        debug!(
            "Membership index: principal={} rows={} active={}",
            principal,
            rows.len(),
            active.len()
        );

        Ok(active)
    }
}
