//! Fact bundles and the storage contract that produces them
//!
//! Every cross-entity lookup a rule could need is materialized here, once,
//! by the storage collaborator running with internal privilege. The
//! evaluator only ever inspects the resulting flat bundle.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryTenancyStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresFactStore;

use crate::error::{AuthzError, Result};
use crate::types::{EntityType, ListScope, Row};
use async_trait::async_trait;
use docvault_core::{Membership, Organization, OrganizationId, PrincipalId, Vault, VaultAsset};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Asset placement as recorded by the join relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VaultBinding {
    Bound(VaultAsset),
    /// No VaultAsset row exists
    Orphan,
}

/// The requesting principal's membership in the row's organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MembershipFact {
    /// A membership row exists (any status)
    Member(Membership),
    NonMember,
}

/// Precomputed, cross-entity-free snapshot consumed by the evaluator.
///
/// `None` means the fact was not supplied. A missing fact that the entity
/// requires always yields a deny.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactBundle {
    /// Organization at the root of the row's tenancy chain
    pub organization: Option<Organization>,

    /// Vault holding the row (asset rows only)
    pub vault: Option<Vault>,

    /// Join row for asset rows
    pub binding: Option<VaultBinding>,

    /// Principal's membership in `organization`
    pub membership: Option<MembershipFact>,
}

impl FactBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_organization(mut self, organization: Organization) -> Self {
        self.organization = Some(organization);
        self
    }

    pub fn with_vault(mut self, vault: Vault) -> Self {
        self.vault = Some(vault);
        self
    }

    pub fn with_binding(mut self, binding: VaultBinding) -> Self {
        self.binding = Some(binding);
        self
    }

    pub fn with_membership(mut self, membership: MembershipFact) -> Self {
        self.membership = Some(membership);
        self
    }
}

/// A row together with the facts read alongside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactSnapshot {
    pub row: Row,
    pub facts: FactBundle,
}

/// Storage collaborator contract.
///
/// Runs with elevated/internal privilege and never consults policy. Each
/// `fetch_facts` call must read the row and every fact in one consistent
/// snapshot.
#[async_trait]
pub trait FactStore: Send + Sync {
    /// Row plus facts, or `None` when the row does not exist.
    ///
    /// A reference to a row that does not exist (vault pointing at a
    /// missing organization) is reported as `InconsistentFacts`.
    async fn fetch_facts(
        &self,
        principal: &PrincipalId,
        entity: EntityType,
        row_id: Uuid,
    ) -> Result<Option<FactSnapshot>>;

    /// Candidate row ids for a listing, restricted to rows under
    /// `organizations`. Ascending id order.
    async fn candidates(
        &self,
        entity: EntityType,
        scope: &ListScope,
        organizations: &[OrganizationId],
    ) -> Result<Vec<Uuid>>;
}

/// Wraps a [`FactStore`] with a deadline and normalizes failures
#[derive(Clone)]
pub struct FactGatherer {
    store: Arc<dyn FactStore>,
    timeout: Duration,
}

impl FactGatherer {
    pub fn new(store: Arc<dyn FactStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Fetch one snapshot. Timeouts and storage errors become
    /// `FactUnavailable`; `InconsistentFacts` passes through unchanged.
    pub async fn gather(
        &self,
        principal: &PrincipalId,
        entity: EntityType,
        row_id: Uuid,
    ) -> Result<Option<FactSnapshot>> {
        let fetch = self.store.fetch_facts(principal, entity, row_id);

        match tokio::time::timeout(self.timeout, fetch).await {
            Ok(Ok(snapshot)) => Ok(snapshot),
            Ok(Err(e @ AuthzError::InconsistentFacts(_))) => Err(e),
            Ok(Err(e @ AuthzError::FactUnavailable { .. })) => Err(e),
            Ok(Err(e)) => Err(AuthzError::fact_unavailable(entity, row_id, e.to_string())),
            Err(_) => Err(AuthzError::fact_unavailable(
                entity,
                row_id,
                format!("timed out after {}ms", self.timeout.as_millis()),
            )),
        }
    }

    /// Candidate ids for a listing. Storage errors and timeouts become
    /// `FactUnavailable`; rejected scopes pass through as `InvalidInput`.
    pub async fn candidates(
        &self,
        entity: EntityType,
        scope: &ListScope,
        organizations: &[OrganizationId],
    ) -> Result<Vec<Uuid>> {
        match tokio::time::timeout(self.timeout, self.store.candidates(entity, scope, organizations)).await {
            Ok(Ok(ids)) => Ok(ids),
            Ok(Err(e @ AuthzError::InvalidInput(_))) => Err(e),
            Ok(Err(e @ AuthzError::InconsistentFacts(_))) => Err(e),
            Ok(Err(e @ AuthzError::FactUnavailable { .. })) => Err(e),
            Ok(Err(e)) => Err(AuthzError::fact_unavailable(entity, "listing", e.to_string())),
            Err(_) => Err(AuthzError::fact_unavailable(
                entity,
                "listing",
                format!("timed out after {}ms", self.timeout.as_millis()),
            )),
        }
    }
}
