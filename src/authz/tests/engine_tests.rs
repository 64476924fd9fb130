//! Engine integration tests
//!
//! Session → facts → evaluation → decision, and listings, over the
//! in-memory tenancy store.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use docvault_authz::{
    AuthzEngine, AuthzError, DecisionReason, DenialClass, EngineConfig, EntityType, FactSnapshot,
    FactStore, InMemoryTenancyStore, ListScope, Operation, Result, Row, Session,
};
use docvault_core::{
    Asset, Membership, MembershipStatus, Organization, OrganizationId, PrincipalId, Role, Vault,
    VaultStatus,
};
use futures::TryStreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

struct Tenancy {
    store: InMemoryTenancyStore,
    engine: AuthzEngine,
}

impl Tenancy {
    fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    fn with_config(config: EngineConfig) -> Self {
        init_tracing();
        let store = InMemoryTenancyStore::new();
        let engine = AuthzEngine::new(config, Arc::new(store.clone()), Arc::new(store.clone())).unwrap();
        Self { store, engine }
    }

    async fn organization(&self, name: &str) -> Organization {
        let org = Organization::new(name);
        self.store.put_organization(org.clone()).await;
        org
    }

    async fn vault(&self, org: &Organization, created_by: PrincipalId) -> Vault {
        let vault = Vault::new(org.id, "documents", created_by);
        self.store.put_vault(vault.clone()).await;
        vault
    }

    async fn asset_in(&self, vault: &Vault, uploaded_by: PrincipalId) -> Asset {
        let asset = Asset::new("report.pdf", uploaded_by);
        self.store.put_asset(asset.clone()).await;
        self.store.bind_asset(vault.id, asset.id).await.unwrap();
        asset
    }

    async fn join(&self, org: &Organization, principal: PrincipalId, role: Role) {
        self.store
            .add_membership(Membership::active(org.id, principal, role))
            .await
            .unwrap();
    }

    async fn list(&self, session: &Session, entity: EntityType, scope: ListScope) -> Vec<Row> {
        self.engine
            .list_visible(session, entity, scope)
            .unwrap()
            .try_collect()
            .await
            .unwrap()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn session(principal: PrincipalId) -> Session {
    Session::for_principal(principal, ChronoDuration::minutes(15))
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[tokio::test]
async fn test_single_membership_lists_exactly_one_organization() {
    let t = Tenancy::new();
    let user = PrincipalId::new();
    let o1 = t.organization("o1").await;
    let _o2 = t.organization("o2").await;
    t.join(&o1, user, Role::Member).await;

    let rows = t.list(&session(user), EntityType::Organization, ListScope::All).await;

    assert_eq!(rows, vec![Row::Organization(o1)]);
}

#[tokio::test]
async fn test_revoked_membership_denies_vault_read() {
    let t = Tenancy::new();
    let user = PrincipalId::new();
    let o1 = t.organization("o1").await;
    let vault = t.vault(&o1, PrincipalId::new()).await;
    t.join(&o1, user, Role::Member).await;

    let before = t
        .engine
        .check(&session(user), Operation::Read, EntityType::Vault, vault.id.0)
        .await;
    assert!(before.allowed);

    t.store
        .transition_membership(o1.id, user, MembershipStatus::Revoked)
        .await
        .unwrap();

    let after = t
        .engine
        .check(&session(user), Operation::Read, EntityType::Vault, vault.id.0)
        .await;
    assert!(!after.allowed);
    assert_eq!(after.reason, DecisionReason::MembershipInactive);
    assert_eq!(after.denial_class(), Some(DenialClass::NotFound));
}

#[tokio::test]
async fn test_orphan_asset_unreachable_for_everyone() {
    let t = Tenancy::new();
    let uploader = PrincipalId::new();
    let owner = PrincipalId::new();
    let org = t.organization("acme").await;
    t.join(&org, uploader, Role::Member).await;
    t.join(&org, owner, Role::Owner).await;

    let orphan = Asset::new("lost.pdf", uploader).with_public(true);
    t.store.put_asset(orphan.clone()).await;

    for principal in [uploader, owner, PrincipalId::new()] {
        let decision = t
            .engine
            .check(&session(principal), Operation::Read, EntityType::Asset, orphan.id.0)
            .await;
        assert_eq!(decision.reason, DecisionReason::Unreachable);
    }

    let listed = t.list(&session(uploader), EntityType::Asset, ListScope::All).await;
    assert!(listed.is_empty());
}

#[tokio::test]
async fn test_unbinding_orphans_an_asset() {
    let t = Tenancy::new();
    let user = PrincipalId::new();
    let org = t.organization("acme").await;
    let vault = t.vault(&org, user).await;
    let asset = t.asset_in(&vault, user).await;
    t.join(&org, user, Role::Member).await;

    let bound = t
        .engine
        .check(&session(user), Operation::Read, EntityType::Asset, asset.id.0)
        .await;
    assert!(bound.allowed);

    t.store.unbind_asset(asset.id).await;

    let orphaned = t
        .engine
        .check(&session(user), Operation::Read, EntityType::Asset, asset.id.0)
        .await;
    assert_eq!(orphaned.code(), "unreachable");
}

// ============================================================================
// MEMBERSHIP GATING
// ============================================================================

#[tokio::test]
async fn test_pending_membership_sees_nothing() {
    let t = Tenancy::new();
    let user = PrincipalId::new();
    let org = t.organization("acme").await;
    let vault = t.vault(&org, user).await;
    t.asset_in(&vault, user).await;
    t.store
        .add_membership(Membership::invite(org.id, user, Role::Admin))
        .await
        .unwrap();

    let s = session(user);
    for entity in EntityType::ALL {
        assert!(t.list(&s, entity, ListScope::All).await.is_empty());
    }

    // Even rows the principal created stay hidden until the invitation is accepted
    let decision = t
        .engine
        .check(&s, Operation::Read, EntityType::Vault, vault.id.0)
        .await;
    assert_eq!(decision.reason, DecisionReason::MembershipInactive);
}

#[tokio::test]
async fn test_reinvitation_restores_visibility_only_through_active() {
    let t = Tenancy::new();
    let user = PrincipalId::new();
    let org = t.organization("acme").await;
    let vault = t.vault(&org, PrincipalId::new()).await;
    t.join(&org, user, Role::Member).await;

    t.store
        .transition_membership(org.id, user, MembershipStatus::Revoked)
        .await
        .unwrap();

    let direct = t
        .store
        .transition_membership(org.id, user, MembershipStatus::Active)
        .await;
    assert!(direct.is_err());

    t.store
        .transition_membership(org.id, user, MembershipStatus::Pending)
        .await
        .unwrap();
    let pending = t.list(&session(user), EntityType::Vault, ListScope::All).await;
    assert!(pending.is_empty());

    t.store
        .transition_membership(org.id, user, MembershipStatus::Active)
        .await
        .unwrap();
    let active = t.list(&session(user), EntityType::Vault, ListScope::All).await;
    assert_eq!(active, vec![Row::Vault(vault)]);
}

#[tokio::test]
async fn test_non_member_denied_as_not_member() {
    let t = Tenancy::new();
    let org = t.organization("acme").await;
    let vault = t.vault(&org, PrincipalId::new()).await;

    let decision = t
        .engine
        .check(&session(PrincipalId::new()), Operation::Read, EntityType::Vault, vault.id.0)
        .await;

    assert_eq!(decision.reason, DecisionReason::NotMember);
    assert_eq!(decision.denial_class(), Some(DenialClass::NotFound));
}

// ============================================================================
// LIFECYCLE FLAGS
// ============================================================================

#[tokio::test]
async fn test_soft_deleted_vault_denied_for_owner_admin() {
    let t = Tenancy::new();
    let user = PrincipalId::new();
    let org = t.organization("acme").await;
    t.join(&org, user, Role::Owner).await;
    let vault = Vault::new(org.id, "old", user).soft_delete(Utc::now());
    t.store.put_vault(vault.clone()).await;

    for operation in Operation::ALL {
        let decision = t
            .engine
            .check(&session(user), operation, EntityType::Vault, vault.id.0)
            .await;
        assert_eq!(decision.reason, DecisionReason::Deleted);
    }

    assert!(t.list(&session(user), EntityType::Vault, ListScope::All).await.is_empty());
}

#[tokio::test]
async fn test_deleted_organization_hides_its_vaults() {
    let t = Tenancy::new();
    let user = PrincipalId::new();
    let org = Organization::new("gone").soft_delete(Utc::now());
    t.store.put_organization(org.clone()).await;
    let vault = t.vault(&org, user).await;
    t.join(&org, user, Role::Owner).await;

    let decision = t
        .engine
        .check(&session(user), Operation::Read, EntityType::Vault, vault.id.0)
        .await;
    assert_eq!(
        decision.reason,
        DecisionReason::AncestorUnavailable {
            entity: EntityType::Organization
        }
    );

    let s = session(user);
    assert!(t.list(&s, EntityType::Organization, ListScope::All).await.is_empty());
    assert!(t.list(&s, EntityType::Vault, ListScope::All).await.is_empty());
}

#[tokio::test]
async fn test_inactive_organization_denied() {
    let t = Tenancy::new();
    let user = PrincipalId::new();
    let org = Organization::new("dormant").with_active(false);
    t.store.put_organization(org.clone()).await;
    t.join(&org, user, Role::Member).await;

    let decision = t
        .engine
        .check(&session(user), Operation::Read, EntityType::Organization, org.id.0)
        .await;

    assert_eq!(decision.reason, DecisionReason::Inactive);
}

#[tokio::test]
async fn test_archived_vault_is_read_only() {
    let t = Tenancy::new();
    let admin = PrincipalId::new();
    let org = t.organization("acme").await;
    t.join(&org, admin, Role::Admin).await;
    let vault = Vault::new(org.id, "2019", PrincipalId::new()).with_status(VaultStatus::Archived);
    t.store.put_vault(vault.clone()).await;
    let asset = t.asset_in(&vault, PrincipalId::new()).await;

    let s = session(admin);
    let read = t.engine.check(&s, Operation::Read, EntityType::Asset, asset.id.0).await;
    assert!(read.allowed);

    let write = t.engine.check(&s, Operation::Write, EntityType::Asset, asset.id.0).await;
    assert_eq!(write.reason, DecisionReason::ReadOnly);

    let delete = t.engine.check(&s, Operation::Delete, EntityType::Vault, vault.id.0).await;
    assert_eq!(delete.reason, DecisionReason::ReadOnly);
    assert_eq!(delete.denial_class(), Some(DenialClass::Forbidden));
}

#[tokio::test]
async fn test_suspended_vault_hides_assets() {
    let t = Tenancy::new();
    let admin = PrincipalId::new();
    let org = t.organization("acme").await;
    t.join(&org, admin, Role::Admin).await;
    let vault = Vault::new(org.id, "frozen", admin).with_status(VaultStatus::Suspended);
    t.store.put_vault(vault.clone()).await;
    let asset = t.asset_in(&vault, admin).await;

    let s = session(admin);
    let vault_read = t.engine.check(&s, Operation::Read, EntityType::Vault, vault.id.0).await;
    assert_eq!(vault_read.reason, DecisionReason::Inactive);

    let asset_read = t.engine.check(&s, Operation::Read, EntityType::Asset, asset.id.0).await;
    assert_eq!(
        asset_read.reason,
        DecisionReason::AncestorUnavailable {
            entity: EntityType::Vault
        }
    );
}

// ============================================================================
// ROLES AND OWNERSHIP
// ============================================================================

#[tokio::test]
async fn test_mutations_require_owner_or_admin() {
    let t = Tenancy::new();
    let member = PrincipalId::new();
    let admin = PrincipalId::new();
    let org = t.organization("acme").await;
    t.join(&org, member, Role::Member).await;
    t.join(&org, admin, Role::Admin).await;
    let vault = t.vault(&org, PrincipalId::new()).await;
    let own = t.asset_in(&vault, member).await;
    let foreign = t.asset_in(&vault, PrincipalId::new()).await;

    let m = session(member);
    assert!(t.engine.check(&m, Operation::Delete, EntityType::Asset, own.id.0).await.allowed);
    assert_eq!(
        t.engine
            .check(&m, Operation::Delete, EntityType::Asset, foreign.id.0)
            .await
            .reason,
        DecisionReason::NoMatchingRule
    );
    assert!(!t.engine.check(&m, Operation::Write, EntityType::Vault, vault.id.0).await.allowed);

    let a = session(admin);
    assert!(t.engine.check(&a, Operation::Delete, EntityType::Asset, foreign.id.0).await.allowed);
    assert!(t.engine.check(&a, Operation::Write, EntityType::Vault, vault.id.0).await.allowed);
    assert!(t.engine.check(&a, Operation::Write, EntityType::Organization, org.id.0).await.allowed);
}

#[tokio::test]
async fn test_viewer_listing_limited_to_public_rows() {
    let t = Tenancy::new();
    let viewer = PrincipalId::new();
    let org = t.organization("acme").await;
    t.join(&org, viewer, Role::Viewer).await;
    let open = Vault::new(org.id, "open", PrincipalId::new()).with_public(true);
    let closed = Vault::new(org.id, "closed", PrincipalId::new());
    t.store.put_vault(open.clone()).await;
    t.store.put_vault(closed.clone()).await;

    let rows = t.list(&session(viewer), EntityType::Vault, ListScope::Organization(org.id)).await;

    assert_eq!(rows, vec![Row::Vault(open)]);
}

#[tokio::test]
async fn test_public_rows_invisible_outside_membership() {
    let t = Tenancy::new();
    let outsider = PrincipalId::new();
    let org = t.organization("acme").await;
    let vault = Vault::new(org.id, "open", PrincipalId::new()).with_public(true);
    t.store.put_vault(vault.clone()).await;

    let decision = t
        .engine
        .check(&session(outsider), Operation::Read, EntityType::Vault, vault.id.0)
        .await;

    assert_eq!(decision.reason, DecisionReason::NotMember);
    assert!(t.list(&session(outsider), EntityType::Vault, ListScope::All).await.is_empty());
}

#[tokio::test]
async fn test_listing_scoped_to_vault() {
    let t = Tenancy::new();
    let user = PrincipalId::new();
    let org = t.organization("acme").await;
    t.join(&org, user, Role::Member).await;
    let first = t.vault(&org, user).await;
    let second = t.vault(&org, user).await;
    let a = t.asset_in(&first, user).await;
    let _b = t.asset_in(&second, user).await;

    let rows = t.list(&session(user), EntityType::Asset, ListScope::Vault(first.id)).await;

    assert_eq!(rows, vec![Row::Asset(a)]);
}

#[tokio::test]
async fn test_organizations_cannot_be_listed_within_vault() {
    let t = Tenancy::new();
    let user = PrincipalId::new();
    let org = t.organization("acme").await;
    t.join(&org, user, Role::Member).await;
    let vault = t.vault(&org, user).await;

    let result: Result<Vec<Row>> = t
        .engine
        .list_visible(&session(user), EntityType::Organization, ListScope::Vault(vault.id))
        .unwrap()
        .try_collect()
        .await;

    assert!(matches!(result, Err(AuthzError::InvalidInput(_))));
}

// ============================================================================
// FAIL-CLOSED PATHS
// ============================================================================

#[tokio::test]
async fn test_store_outage_fails_closed() {
    let t = Tenancy::new();
    let user = PrincipalId::new();
    let org = t.organization("acme").await;
    t.join(&org, user, Role::Owner).await;
    let vault = t.vault(&org, user).await;

    t.store.set_unavailable(true);

    let decision = t
        .engine
        .check(&session(user), Operation::Read, EntityType::Vault, vault.id.0)
        .await;
    assert_eq!(decision.code(), "fact_unavailable");
    assert_eq!(decision.denial_class(), Some(DenialClass::ServiceError));

    let listing: Result<Vec<Row>> = t
        .engine
        .list_visible(&session(user), EntityType::Vault, ListScope::All)
        .unwrap()
        .try_collect()
        .await;
    assert!(matches!(listing, Err(AuthzError::FactUnavailable { .. })));

    let metrics = t.engine.get_metrics().await.unwrap();
    assert_eq!(metrics.error_count, 1);
}

#[tokio::test]
async fn test_dangling_vault_is_inconsistent() {
    let t = Tenancy::new();
    let user = PrincipalId::new();
    let vault = Vault::new(OrganizationId::new(), "ghost", user);
    t.store.put_vault(vault.clone()).await;

    let decision = t
        .engine
        .check(&session(user), Operation::Read, EntityType::Vault, vault.id.0)
        .await;

    assert_eq!(decision.code(), "inconsistent_facts");
    assert_eq!(decision.denial_class(), Some(DenialClass::ServiceError));
}

#[tokio::test]
async fn test_conflicting_asset_organization_is_inconsistent() {
    let t = Tenancy::new();
    let user = PrincipalId::new();
    let org = t.organization("acme").await;
    let other = t.organization("other").await;
    t.join(&org, user, Role::Owner).await;
    let vault = t.vault(&org, user).await;
    let asset = Asset::new("split.pdf", user).with_organization(other.id);
    t.store.put_asset(asset.clone()).await;
    t.store.bind_asset(vault.id, asset.id).await.unwrap();

    let decision = t
        .engine
        .check(&session(user), Operation::Read, EntityType::Asset, asset.id.0)
        .await;

    assert_eq!(decision.code(), "inconsistent_facts");
}

struct SlowStore {
    inner: InMemoryTenancyStore,
    delay: Duration,
}

#[async_trait]
impl FactStore for SlowStore {
    async fn fetch_facts(
        &self,
        principal: &PrincipalId,
        entity: EntityType,
        row_id: Uuid,
    ) -> Result<Option<FactSnapshot>> {
        tokio::time::sleep(self.delay).await;
        self.inner.fetch_facts(principal, entity, row_id).await
    }

    async fn candidates(
        &self,
        entity: EntityType,
        scope: &ListScope,
        organizations: &[OrganizationId],
    ) -> Result<Vec<Uuid>> {
        self.inner.candidates(entity, scope, organizations).await
    }
}

#[tokio::test]
async fn test_slow_fact_read_times_out_closed() {
    let inner = InMemoryTenancyStore::new();
    let user = PrincipalId::new();
    let org = Organization::new("acme");
    let vault = Vault::new(org.id, "slow", user);
    inner.put_organization(org.clone()).await;
    inner.put_vault(vault.clone()).await;
    inner
        .add_membership(Membership::active(org.id, user, Role::Owner))
        .await
        .unwrap();

    let config = EngineConfig {
        fact_timeout_ms: 20,
        ..EngineConfig::default()
    };
    let slow = SlowStore {
        inner: inner.clone(),
        delay: Duration::from_millis(500),
    };
    let engine = AuthzEngine::new(config, Arc::new(slow), Arc::new(inner)).unwrap();

    let decision = engine
        .check(&session(user), Operation::Read, EntityType::Vault, vault.id.0)
        .await;

    assert_eq!(decision.code(), "fact_unavailable");
}

#[tokio::test]
async fn test_expired_session_cannot_list() {
    let t = Tenancy::new();
    let stale = Session::for_principal(PrincipalId::new(), ChronoDuration::minutes(-5));

    let result = t.engine.list_visible(&stale, EntityType::Vault, ListScope::All);

    assert!(matches!(result, Err(AuthzError::Unauthenticated(_))));
}

// ============================================================================
// ELEVATED PATH
// ============================================================================

#[tokio::test]
async fn test_elevated_job_reaches_deleted_rows() {
    let t = Tenancy::with_config(EngineConfig::default().with_elevated_job("retention-sweeper"));
    let org = t.organization("acme").await;
    let vault = t.vault(&org, PrincipalId::new()).await;
    let asset = Asset::new("expired.pdf", PrincipalId::new()).soft_delete(Utc::now());
    t.store.put_asset(asset.clone()).await;
    t.store.bind_asset(vault.id, asset.id).await.unwrap();

    let context = t.engine.elevate("retention-sweeper").unwrap();
    let decision = t
        .engine
        .check_elevated(&context, Operation::Delete, EntityType::Asset, asset.id.0)
        .await;

    assert!(decision.allowed);
    assert_eq!(
        decision.reason,
        DecisionReason::Elevated {
            job: "retention-sweeper".to_string()
        }
    );
}

#[tokio::test]
async fn test_elevated_path_still_fails_closed_on_bad_data() {
    let t = Tenancy::with_config(EngineConfig::default().with_elevated_job("storage-reconciler"));
    let vault = Vault::new(OrganizationId::new(), "ghost", PrincipalId::new());
    t.store.put_vault(vault.clone()).await;

    let context = t.engine.elevate("storage-reconciler").unwrap();
    let decision = t
        .engine
        .check_elevated(&context, Operation::Read, EntityType::Vault, vault.id.0)
        .await;

    assert_eq!(decision.code(), "inconsistent_facts");
}

#[tokio::test]
async fn test_unlisted_job_refused() {
    let t = Tenancy::new();
    assert!(t.engine.elevate("retention-sweeper").is_err());
}

// ============================================================================
// METRICS
// ============================================================================

#[tokio::test]
async fn test_metrics_track_decisions_and_listings() {
    let t = Tenancy::new();
    let user = PrincipalId::new();
    let org = t.organization("acme").await;
    t.join(&org, user, Role::Viewer).await;
    let open = Vault::new(org.id, "open", PrincipalId::new()).with_public(true);
    let closed = Vault::new(org.id, "closed", PrincipalId::new());
    t.store.put_vault(open.clone()).await;
    t.store.put_vault(closed.clone()).await;

    let s = session(user);
    t.engine.check(&s, Operation::Read, EntityType::Vault, open.id.0).await;
    t.engine.check(&s, Operation::Read, EntityType::Vault, closed.id.0).await;
    t.list(&s, EntityType::Vault, ListScope::All).await;

    let metrics = t.engine.get_metrics().await.unwrap();
    assert_eq!(metrics.total_requests, 2);
    assert_eq!(metrics.allowed_decisions, 1);
    assert_eq!(metrics.denied_decisions, 1);
    assert_eq!(metrics.rows_considered, 2);
    assert_eq!(metrics.rows_visible, 1);

    let collector = t.engine.metrics().unwrap();
    assert_eq!(collector.reason_count("no_matching_rule"), 1);
    assert!(collector
        .export_prometheus()
        .await
        .contains("authz_decisions_total{reason=\"rule_matched\"} 1"));
}
