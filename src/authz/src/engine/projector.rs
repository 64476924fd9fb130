//! Visibility projector
//!
//! Bulk listing. Storage is asked only for candidate ids under the
//! principal's active organizations; every candidate is then re-fetched and
//! run through the same [`PolicyEvaluator::evaluate`] a point check uses, so
//! a listed row is always a row the point check would allow.

use super::evaluator::PolicyEvaluator;
use super::metrics::MetricsCollector;
use crate::error::{AuthzError, Result};
use crate::facts::FactGatherer;
use crate::membership::MembershipIndex;
use crate::principal::Principal;
use crate::types::{EntityType, ListScope, Operation, Row};
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Lazily lists the rows a principal may read
#[derive(Clone)]
pub struct VisibilityProjector {
    gatherer: FactGatherer,
    index: MembershipIndex,
    evaluator: Arc<PolicyEvaluator>,
    metrics: Option<Arc<MetricsCollector>>,
    concurrency: usize,
}

impl VisibilityProjector {
    pub fn new(
        gatherer: FactGatherer,
        index: MembershipIndex,
        evaluator: Arc<PolicyEvaluator>,
        concurrency: usize,
    ) -> Self {
        Self {
            gatherer,
            index,
            evaluator,
            metrics: None,
            concurrency: concurrency.max(1),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Rows of `entity` within `scope` that `principal` may read, in
    /// ascending id order.
    ///
    /// Nothing is cached between calls. A failure to enumerate candidates is
    /// yielded as the single error item; a row whose facts cannot be read is
    /// left out.
    pub fn list_visible(
        &self,
        principal: Principal,
        entity: EntityType,
        scope: ListScope,
    ) -> BoxStream<'_, Result<Row>> {
        let candidates = async move {
            let memberships = self.index.active_organizations_for(&principal.id).await?;
            if memberships.is_empty() {
                debug!("{} has no active memberships, nothing to list", principal);
                return Ok(Vec::new());
            }

            self.gatherer
                .candidates(entity, &scope, &memberships.organization_ids())
                .await
        };

        stream::once(candidates)
            .map(move |result| match result {
                Ok(ids) => {
                    debug!("Listing {} {} candidates for {}", ids.len(), entity, principal);
                    stream::iter(ids)
                        .map(move |id| self.admit(principal, entity, id))
                        .buffered(self.concurrency)
                        .filter_map(|row| future::ready(row.map(Ok::<Row, AuthzError>)))
                        .boxed()
                }
                Err(e) => {
                    warn!("Listing {} for {} failed: {}", entity, principal, e);
                    stream::once(future::ready(Err(e))).boxed()
                }
            })
            .flatten()
            .boxed()
    }

    /// Final filter: the row survives only if a point check would allow it
    async fn admit(&self, principal: Principal, entity: EntityType, id: Uuid) -> Option<Row> {
        let row = match self.gatherer.gather(&principal.id, entity, id).await {
            Ok(Some(snapshot)) => {
                let decision =
                    self.evaluator
                        .evaluate(&principal, Operation::Read, entity, &snapshot.row, &snapshot.facts);
                decision.allowed.then_some(snapshot.row)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Dropping {} {} from listing: {}", entity, id, e);
                if let Some(metrics) = &self.metrics {
                    metrics.record_error().await;
                }
                None
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_listing(1, u64::from(row.is_some())).await;
        }

        row
    }
}
