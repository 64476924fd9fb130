//! Policy evaluator
//!
//! Deterministic, total and side-effect free. Every input yields a decision
//! and every uncertainty yields a deny.
//!
//! Evaluation order:
//!
//! 1. row type matches the requested entity, rule table has an entry
//! 2. row soft-deleted or inactive → deny
//! 3. asset binding present and not orphaned
//! 4. required facts present and mutually consistent
//! 5. ancestors live (organization, and vault for assets)
//! 6. membership in the organization exists and is active
//! 7. inherited parent read rules (one hop at most)
//! 8. read-only vaults reject mutations
//! 9. the entity's own rule list

use super::decision::{Decision, DecisionReason};
use crate::facts::{FactBundle, MembershipFact, VaultBinding};
use crate::policy::{combine, Rule, RuleInput, RuleSet};
use crate::principal::Principal;
use crate::types::{EntityType, Operation, Row};
use docvault_core::{Organization, Role, Vault};
use std::sync::Arc;
use tracing::{debug, warn};

type Outcome<T> = std::result::Result<T, DecisionReason>;

/// Scoped grant for trusted background jobs. Minted only by
/// [`AuthzEngine::elevate`](super::AuthzEngine::elevate) for allow-listed job names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElevatedContext {
    job: String,
}

impl ElevatedContext {
    pub(crate) fn new(job: impl Into<String>) -> Self {
        Self { job: job.into() }
    }

    pub fn job(&self) -> &str {
        &self.job
    }
}

/// Evaluates a [`RuleSet`] against precomputed facts
#[derive(Debug, Clone)]
pub struct PolicyEvaluator {
    rules: Arc<RuleSet>,
}

impl PolicyEvaluator {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules: Arc::new(rules),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Decide whether `principal` may perform `operation` on `row`
    pub fn evaluate(
        &self,
        principal: &Principal,
        operation: Operation,
        entity: EntityType,
        row: &Row,
        facts: &FactBundle,
    ) -> Decision {
        let decision = match self.decide(principal, operation, entity, row, facts) {
            Ok(rule) => Decision::allow(entity, operation, DecisionReason::RuleMatched { rule }),
            Err(reason) => Decision::deny(entity, operation, reason),
        };

        debug!(
            "Decision: {} {} {} {} for {} ({})",
            if decision.allowed { "ALLOW" } else { "DENY" },
            operation,
            entity,
            row.id(),
            principal,
            decision.reason
        );

        if let DecisionReason::InconsistentFacts { detail } = &decision.reason {
            warn!("Data integrity: {} {} {}", entity, row.id(), detail);
        }

        decision
    }

    /// Elevated path for trusted background jobs. Skips membership and
    /// rules, but still refuses structurally inconsistent input.
    pub fn evaluate_elevated(
        &self,
        context: &ElevatedContext,
        operation: Operation,
        entity: EntityType,
        row: &Row,
        facts: &FactBundle,
    ) -> Decision {
        let checked = Self::check_entity(entity, row).and_then(|_| Self::check_consistency(None, row, facts));

        let decision = match checked {
            Ok(()) => Decision::allow(
                entity,
                operation,
                DecisionReason::Elevated {
                    job: context.job().to_string(),
                },
            ),
            Err(reason) => Decision::deny(entity, operation, reason),
        };

        warn!(
            "Elevated evaluation by job '{}': {} {} {} -> {}",
            context.job(),
            operation,
            entity,
            row.id(),
            decision.reason
        );

        decision
    }

    fn decide(
        &self,
        principal: &Principal,
        operation: Operation,
        entity: EntityType,
        row: &Row,
        facts: &FactBundle,
    ) -> Outcome<Rule> {
        Self::check_entity(entity, row)?;

        let rules = self.rules.rules_for(entity, operation).ok_or_else(|| {
            DecisionReason::UnknownEntityOrOperation {
                detail: format!("no rules configured for {}/{}", entity, operation),
            }
        })?;

        if row.is_deleted() {
            return Err(DecisionReason::Deleted);
        }
        if row.is_inactive() {
            return Err(DecisionReason::Inactive);
        }

        if let Row::Asset(_) = row {
            match require(&facts.binding, "binding")? {
                VaultBinding::Orphan => return Err(DecisionReason::Unreachable),
                VaultBinding::Bound(_) => {}
            }
        }

        let membership = require(&facts.membership, "membership")?;
        let (organization, vault) = match row {
            Row::Organization(org) => (org, None),
            Row::Vault(_) => (require(&facts.organization, "organization")?, None),
            Row::Asset(_) => (
                require(&facts.organization, "organization")?,
                Some(require(&facts.vault, "vault")?),
            ),
        };

        Self::check_consistency(Some(principal), row, facts)?;
        Self::check_ancestors(row, organization, vault)?;

        let role = Self::active_role(membership)?;

        if let Some(parent) = self.rules.inherits(entity) {
            self.check_parent(principal, parent, vault, role)?;
        }

        let input = RuleInput::for_row(principal, row, role);

        if operation.is_mutation() {
            // Mutation denials must not confirm rows the principal cannot read
            if !self.readable(entity, &input) {
                return Err(DecisionReason::NotFound);
            }
            if Self::is_read_only(row) || vault.is_some_and(Vault::is_read_only) {
                return Err(DecisionReason::ReadOnly);
            }
        }

        combine(operation, rules, &input).ok_or(DecisionReason::NoMatchingRule)
    }

    fn readable(&self, entity: EntityType, input: &RuleInput<'_>) -> bool {
        self.rules
            .rules_for(entity, Operation::Read)
            .is_some_and(|rules| combine(Operation::Read, rules, input).is_some())
    }

    fn check_entity(entity: EntityType, row: &Row) -> Outcome<()> {
        if row.entity_type() != entity {
            return Err(DecisionReason::InconsistentFacts {
                detail: format!("{} row evaluated as {}", row.entity_type(), entity),
            });
        }
        Ok(())
    }

    /// Cross-check every id the facts carry. Facts that are absent are not
    /// checked here; required ones were already demanded by the caller.
    fn check_consistency(principal: Option<&Principal>, row: &Row, facts: &FactBundle) -> Outcome<()> {
        let inconsistent = |detail: String| Err(DecisionReason::InconsistentFacts { detail });

        let organization_id = match row {
            Row::Organization(org) => Some(org.id),
            _ => facts.organization.as_ref().map(|org| org.id),
        };

        if let (Row::Organization(org), Some(fact)) = (row, &facts.organization) {
            if fact.id != org.id {
                return inconsistent(format!("organization fact {} for row {}", fact.id, org.id));
            }
        }

        if let (Row::Vault(vault), Some(org_id)) = (row, organization_id) {
            if vault.organization_id != org_id {
                return inconsistent(format!(
                    "vault {} belongs to {}, facts name {}",
                    vault.id, vault.organization_id, org_id
                ));
            }
        }

        if let Row::Asset(asset) = row {
            if let (Some(VaultBinding::Bound(binding)), Some(vault)) = (&facts.binding, &facts.vault) {
                if binding.asset_id != asset.id || binding.vault_id != vault.id {
                    return inconsistent(format!(
                        "binding {}/{} does not join asset {} to vault {}",
                        binding.vault_id, binding.asset_id, asset.id, vault.id
                    ));
                }
            }
            if let (Some(vault), Some(org_id)) = (&facts.vault, organization_id) {
                if vault.organization_id != org_id {
                    return inconsistent(format!(
                        "vault {} belongs to {}, facts name {}",
                        vault.id, vault.organization_id, org_id
                    ));
                }
            }
            if let (Some(direct), Some(org_id)) = (asset.organization_id, organization_id) {
                if direct != org_id {
                    return inconsistent(format!(
                        "asset {} carries organization {} but its vault belongs to {}",
                        asset.id, direct, org_id
                    ));
                }
            }
        }

        if let Some(MembershipFact::Member(membership)) = &facts.membership {
            if let Some(org_id) = organization_id {
                if membership.organization_id != org_id {
                    return inconsistent(format!(
                        "membership for {} supplied for organization {}",
                        membership.organization_id, org_id
                    ));
                }
            }
            if let Some(principal) = principal {
                if membership.principal_id != principal.id {
                    return inconsistent(format!(
                        "membership of {} supplied for {}",
                        membership.principal_id, principal.id
                    ));
                }
            }
        }

        Ok(())
    }

    fn check_ancestors(row: &Row, organization: &Organization, vault: Option<&Vault>) -> Outcome<()> {
        if let Some(vault) = vault {
            if vault.is_deleted() || vault.is_inactive() {
                return Err(DecisionReason::AncestorUnavailable {
                    entity: EntityType::Vault,
                });
            }
        }

        if !matches!(row, Row::Organization(_)) && !organization.is_live() {
            return Err(DecisionReason::AncestorUnavailable {
                entity: EntityType::Organization,
            });
        }

        Ok(())
    }

    fn active_role(membership: &MembershipFact) -> Outcome<Role> {
        match membership {
            MembershipFact::NonMember => Err(DecisionReason::NotMember),
            MembershipFact::Member(m) if !m.is_active() => Err(DecisionReason::MembershipInactive),
            MembershipFact::Member(m) => Ok(m.role),
        }
    }

    /// Parent read rules. The rule graph guarantees the parent inherits
    /// nothing itself, so this never recurses.
    fn check_parent(
        &self,
        principal: &Principal,
        parent: EntityType,
        vault: Option<&Vault>,
        role: Role,
    ) -> Outcome<()> {
        let rules = self.rules.rules_for(parent, Operation::Read).ok_or_else(|| {
            DecisionReason::UnknownEntityOrOperation {
                detail: format!("inherited rules missing for {}/read", parent),
            }
        })?;

        let input = match (parent, vault) {
            (EntityType::Vault, Some(vault)) => RuleInput::for_vault(principal, vault, role),
            (EntityType::Organization, _) => RuleInput {
                principal,
                owner: None,
                public: false,
                role,
            },
            _ => {
                return Err(DecisionReason::UnknownEntityOrOperation {
                    detail: format!("cannot inherit from {}", parent),
                })
            }
        };

        match combine(Operation::Read, rules, &input) {
            Some(_) => Ok(()),
            None => Err(DecisionReason::ParentDenied { entity: parent }),
        }
    }

    fn is_read_only(row: &Row) -> bool {
        matches!(row, Row::Vault(vault) if vault.is_read_only())
    }
}

impl Default for PolicyEvaluator {
    fn default() -> Self {
        Self::new(RuleSet::standard())
    }
}

fn require<'a, T>(fact: &'a Option<T>, field: &str) -> Outcome<&'a T> {
    fact.as_ref().ok_or_else(|| DecisionReason::MissingFact {
        field: field.to_string(),
    })
}
