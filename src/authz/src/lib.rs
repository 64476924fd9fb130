//! # DocVault Authorization Engine
//!
//! Row-level authorization over the organization → vault → asset tenancy
//! hierarchy, structured so that evaluation can never recurse.
//!
//! ## Features
//!
//! - **Precomputed facts**: rules never query other tables; every
//!   cross-entity lookup is gathered once into a [`FactBundle`]
//! - **Leaf membership index**: organization visibility depends only on the
//!   membership relation
//! - **Bounded inheritance**: rule-set references are validated as an
//!   acyclic graph at most one hop deep
//! - **Fail-closed evaluation** with distinguishable reason codes
//! - **Consistent listings**: every listed row passes the point check
//!
//! ## Example
//!
//! ```rust,no_run
//! use docvault_authz::{AuthzEngine, EngineConfig, EntityType, InMemoryTenancyStore, Operation, Session};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemoryTenancyStore::new());
//!     let engine = AuthzEngine::new(EngineConfig::default(), store.clone(), store)?;
//!
//!     let session = Session::for_principal(Default::default(), chrono::Duration::minutes(15));
//!     let decision = engine
//!         .check(&session, Operation::Read, EntityType::Vault, uuid::Uuid::new_v4())
//!         .await;
//!
//!     if !decision.allowed {
//!         println!("Denied: {}", decision.reason);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod facts;
pub mod membership;
pub mod policy;
pub mod principal;
pub mod types;

pub use config::EngineConfig;
pub use engine::{
    AuthzEngine, Decision, DecisionReason, DenialClass, ElevatedContext, EngineMetrics,
    MetricsCollector, PolicyEvaluator, VisibilityProjector,
};
pub use error::{AuthzError, Result};
pub use facts::{FactBundle, FactGatherer, FactSnapshot, FactStore, InMemoryTenancyStore, MembershipFact, VaultBinding};
#[cfg(feature = "postgres")]
pub use facts::PostgresFactStore;
pub use membership::{ActiveMemberships, MembershipIndex, MembershipSource};
pub use policy::{EntityPolicy, GraphError, Rule, RuleGraph, RuleInput, RuleSet, RuleSetBuilder};
pub use principal::{Principal, PrincipalResolver, Session};
pub use types::{EntityType, ListScope, Operation, Row};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
