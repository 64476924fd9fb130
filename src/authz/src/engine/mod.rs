//! Authorization engine
//!
//! Front door tying session resolution, fact gathering, evaluation,
//! listing and metrics together.
//!
//! # Architecture
//!
//! ```text
//! Session → PrincipalResolver → FactGatherer → PolicyEvaluator → Decision
//!                  ↓                                  ↑              ↓
//!           MembershipIndex → VisibilityProjector ────┘          [Metrics]
//! ```

pub mod decision;
pub mod evaluator;
pub mod metrics;
pub mod projector;

pub use decision::{Decision, DecisionReason, DenialClass};
pub use evaluator::{ElevatedContext, PolicyEvaluator};
pub use metrics::{EngineMetrics, MetricsCollector};
pub use projector::VisibilityProjector;

use crate::config::EngineConfig;
use crate::error::{AuthzError, Result};
use crate::facts::{FactGatherer, FactStore};
use crate::membership::{ActiveMemberships, MembershipIndex, MembershipSource};
use crate::policy::RuleSet;
use crate::principal::{Principal, PrincipalResolver, Session};
use crate::types::{EntityType, ListScope, Operation, Row};
use docvault_core::PrincipalId;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Main authorization engine
pub struct AuthzEngine {
    resolver: PrincipalResolver,

    index: MembershipIndex,

    /// Fact reads with a deadline
    gatherer: FactGatherer,

    evaluator: Arc<PolicyEvaluator>,

    projector: VisibilityProjector,

    metrics: Option<Arc<MetricsCollector>>,

    config: EngineConfig,
}

impl AuthzEngine {
    /// Engine with the standard tenancy rule set
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn FactStore>,
        memberships: Arc<dyn MembershipSource>,
    ) -> Result<Self> {
        Self::with_rules(config, RuleSet::standard(), store, memberships)
    }

    /// Engine with a custom, already validated rule set
    pub fn with_rules(
        config: EngineConfig,
        rules: RuleSet,
        store: Arc<dyn FactStore>,
        memberships: Arc<dyn MembershipSource>,
    ) -> Result<Self> {
        config.validate()?;

        let gatherer = FactGatherer::new(store, config.fact_timeout());
        let index = MembershipIndex::new(memberships);
        let evaluator = Arc::new(PolicyEvaluator::new(rules));

        let metrics = if config.enable_metrics {
            Some(Arc::new(MetricsCollector::new()))
        } else {
            None
        };

        let mut projector = VisibilityProjector::new(
            gatherer.clone(),
            index.clone(),
            Arc::clone(&evaluator),
            config.list_concurrency,
        );
        if let Some(metrics) = &metrics {
            projector = projector.with_metrics(Arc::clone(metrics));
        }

        info!(
            "AuthzEngine initialized with metrics={}, fact_timeout={}ms, list_concurrency={}, elevated_jobs={}",
            config.enable_metrics,
            config.fact_timeout_ms,
            config.list_concurrency,
            config.elevated_jobs.len()
        );

        Ok(Self {
            resolver: PrincipalResolver::new(),
            index,
            gatherer,
            evaluator,
            projector,
            metrics,
            config,
        })
    }

    /// Replace the session resolver (clock leeway)
    pub fn with_resolver(mut self, resolver: PrincipalResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Resolve a session, then check one row
    pub async fn check(
        &self,
        session: &Session,
        operation: Operation,
        entity: EntityType,
        row_id: Uuid,
    ) -> Decision {
        match self.resolver.resolve(session) {
            Ok(principal) => self.check_as(&principal, operation, entity, row_id).await,
            Err(e) => {
                let decision = Decision::deny(entity, operation, Self::unauthenticated(e));
                self.record(&decision, Instant::now()).await;
                decision
            }
        }
    }

    /// Check one row with entity and operation given by name
    pub async fn check_named(
        &self,
        session: &Session,
        operation: &str,
        entity: &str,
        row_id: Uuid,
    ) -> Decision {
        let parsed = operation
            .parse::<Operation>()
            .and_then(|op| entity.parse::<EntityType>().map(|entity| (op, entity)));

        match parsed {
            Ok((operation, entity)) => self.check(session, operation, entity, row_id).await,
            Err(e) => {
                warn!("Rejecting request for {}/{}: {}", entity, operation, e);
                let decision = Decision::reject(DecisionReason::UnknownEntityOrOperation {
                    detail: e.to_string(),
                });
                self.record(&decision, Instant::now()).await;
                decision
            }
        }
    }

    /// Check one row for an already resolved principal
    pub async fn check_as(
        &self,
        principal: &Principal,
        operation: Operation,
        entity: EntityType,
        row_id: Uuid,
    ) -> Decision {
        let start = Instant::now();

        debug!(
            "Authorization request: principal={}, entity={}, row={}, operation={}",
            principal, entity, row_id, operation
        );

        let decision = match self.gatherer.gather(&principal.id, entity, row_id).await {
            Ok(Some(snapshot)) => {
                self.evaluator
                    .evaluate(principal, operation, entity, &snapshot.row, &snapshot.facts)
            }
            Ok(None) => Decision::deny(entity, operation, DecisionReason::NotFound),
            Err(e) => self.failed_closed(entity, operation, e).await,
        };

        self.record(&decision, start).await;
        decision
    }

    /// Resolve a session, then stream the rows it may read
    pub fn list_visible(
        &self,
        session: &Session,
        entity: EntityType,
        scope: ListScope,
    ) -> Result<BoxStream<'_, Result<Row>>> {
        let principal = self.resolver.resolve(session)?;
        Ok(self.list_visible_as(principal, entity, scope))
    }

    /// Stream the rows an already resolved principal may read
    pub fn list_visible_as(
        &self,
        principal: Principal,
        entity: EntityType,
        scope: ListScope,
    ) -> BoxStream<'_, Result<Row>> {
        self.projector.list_visible(principal, entity, scope)
    }

    /// Active organizations for a session's principal
    pub async fn active_organizations(&self, session: &Session) -> Result<ActiveMemberships> {
        let principal = self.resolver.resolve(session)?;
        self.index.active_organizations_for(&principal.id).await
    }

    /// Mint an elevated context for an allow-listed background job
    pub fn elevate(&self, job: &str) -> Result<ElevatedContext> {
        if !self.config.allows_elevated(job) {
            warn!("Refusing elevated context for unlisted job '{}'", job);
            return Err(AuthzError::Unauthenticated(format!(
                "job '{}' is not allowed elevated access",
                job
            )));
        }

        warn!("Elevated context granted to job '{}'", job);
        Ok(ElevatedContext::new(job))
    }

    /// Check one row on the elevated path
    pub async fn check_elevated(
        &self,
        context: &ElevatedContext,
        operation: Operation,
        entity: EntityType,
        row_id: Uuid,
    ) -> Decision {
        let start = Instant::now();
        let nobody = PrincipalId::from_uuid(Uuid::nil());

        let decision = match self.gatherer.gather(&nobody, entity, row_id).await {
            Ok(Some(snapshot)) => {
                self.evaluator
                    .evaluate_elevated(context, operation, entity, &snapshot.row, &snapshot.facts)
            }
            Ok(None) => Decision::deny(entity, operation, DecisionReason::NotFound),
            Err(e) => self.failed_closed(entity, operation, e).await,
        };

        self.record(&decision, start).await;
        decision
    }

    pub fn evaluator(&self) -> &PolicyEvaluator {
        &self.evaluator
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get engine metrics
    pub async fn get_metrics(&self) -> Option<EngineMetrics> {
        match &self.metrics {
            Some(metrics) => Some(metrics.get_metrics().await),
            None => None,
        }
    }

    pub fn metrics(&self) -> Option<&MetricsCollector> {
        self.metrics.as_deref()
    }

    async fn failed_closed(&self, entity: EntityType, operation: Operation, error: AuthzError) -> Decision {
        warn!("Failing closed on {} {}: {}", operation, entity, error);

        if let Some(metrics) = &self.metrics {
            metrics.record_error().await;
        }

        let reason = match error {
            AuthzError::InconsistentFacts(detail) => DecisionReason::InconsistentFacts { detail },
            AuthzError::UnknownEntityOrOperation(detail) => {
                DecisionReason::UnknownEntityOrOperation { detail }
            }
            other => DecisionReason::FactUnavailable {
                detail: other.to_string(),
            },
        };
        Decision::deny(entity, operation, reason)
    }

    fn unauthenticated(error: AuthzError) -> DecisionReason {
        let detail = match error {
            AuthzError::Unauthenticated(detail) => detail,
            other => other.to_string(),
        };
        DecisionReason::Unauthenticated { detail }
    }

    async fn record(&self, decision: &Decision, start: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_decision(decision).await;
            metrics.record_latency(start.elapsed()).await;
        }
    }
}
