//! Authorization decisions and reason codes

use crate::policy::Rule;
use crate::types::{EntityType, Operation};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// How a caller should present a denial to the end user.
///
/// Denials that would reveal the existence of a row the principal cannot
/// see are classed `NotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialClass {
    NotFound,
    Forbidden,
    ServiceError,
    /// Rule table is missing an entry; a programming error, not an access denial
    ConfigurationDefect,
}

/// Reason for an authorization decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum DecisionReason {
    /// A rule granted access
    RuleMatched { rule: Rule },

    /// Trusted background job on the elevated path
    Elevated { job: String },

    /// Row is soft-deleted
    Deleted,

    /// Row is inactive (inactive organization, suspended vault)
    Inactive,

    /// An ancestor of the row is deleted or inactive
    AncestorUnavailable { entity: EntityType },

    /// Row or its vault is archived
    ReadOnly,

    /// Asset has no vault binding
    Unreachable,

    /// Principal has no membership row for the organization
    NotMember,

    /// Membership exists but is pending or revoked
    MembershipInactive,

    /// Inherited rule set of the parent entity denied
    ParentDenied { entity: EntityType },

    /// No rule in the list held
    NoMatchingRule,

    /// Row does not exist
    NotFound,

    /// Required fact absent from the bundle
    MissingFact { field: String },

    /// Storage read failed
    FactUnavailable { detail: String },

    /// Rule table has no entry for this entity/operation
    UnknownEntityOrOperation { detail: String },

    /// Facts contradict each other
    InconsistentFacts { detail: String },

    /// Session could not be resolved
    Unauthenticated { detail: String },
}

impl DecisionReason {
    /// Stable snake_case reason code
    pub fn code(&self) -> &'static str {
        match self {
            DecisionReason::RuleMatched { .. } => "rule_matched",
            DecisionReason::Elevated { .. } => "elevated",
            DecisionReason::Deleted => "deleted",
            DecisionReason::Inactive => "inactive",
            DecisionReason::AncestorUnavailable { .. } => "ancestor_unavailable",
            DecisionReason::ReadOnly => "read_only",
            DecisionReason::Unreachable => "unreachable",
            DecisionReason::NotMember => "not_member",
            DecisionReason::MembershipInactive => "membership_inactive",
            DecisionReason::ParentDenied { .. } => "parent_denied",
            DecisionReason::NoMatchingRule => "no_matching_rule",
            DecisionReason::NotFound => "not_found",
            DecisionReason::MissingFact { .. } => "missing_fact",
            DecisionReason::FactUnavailable { .. } => "fact_unavailable",
            DecisionReason::UnknownEntityOrOperation { .. } => "unknown_entity_or_operation",
            DecisionReason::InconsistentFacts { .. } => "inconsistent_facts",
            DecisionReason::Unauthenticated { .. } => "unauthenticated",
        }
    }

    /// Presentation class; `None` for granting reasons. `NoMatchingRule`
    /// is classed as a mutation denial here; reads are reclassified by
    /// [`Decision::denial_class`].
    pub fn class(&self) -> Option<DenialClass> {
        match self {
            DecisionReason::RuleMatched { .. } | DecisionReason::Elevated { .. } => None,
            DecisionReason::Deleted
            | DecisionReason::Inactive
            | DecisionReason::AncestorUnavailable { .. }
            | DecisionReason::Unreachable
            | DecisionReason::NotMember
            | DecisionReason::MembershipInactive
            | DecisionReason::ParentDenied { .. }
            | DecisionReason::NotFound => Some(DenialClass::NotFound),
            DecisionReason::ReadOnly
            | DecisionReason::NoMatchingRule
            | DecisionReason::Unauthenticated { .. } => Some(DenialClass::Forbidden),
            DecisionReason::MissingFact { .. }
            | DecisionReason::FactUnavailable { .. }
            | DecisionReason::InconsistentFacts { .. } => Some(DenialClass::ServiceError),
            DecisionReason::UnknownEntityOrOperation { .. } => Some(DenialClass::ConfigurationDefect),
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionReason::RuleMatched { rule } => write!(f, "rule_matched({})", rule.name()),
            DecisionReason::Elevated { job } => write!(f, "elevated({})", job),
            DecisionReason::AncestorUnavailable { entity } | DecisionReason::ParentDenied { entity } => {
                write!(f, "{}({})", self.code(), entity)
            }
            DecisionReason::MissingFact { field } => write!(f, "missing_fact({})", field),
            DecisionReason::FactUnavailable { detail }
            | DecisionReason::UnknownEntityOrOperation { detail }
            | DecisionReason::InconsistentFacts { detail }
            | DecisionReason::Unauthenticated { detail } => write!(f, "{}: {}", self.code(), detail),
            _ => f.write_str(self.code()),
        }
    }
}

/// Authorization decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// Unique decision identifier
    pub id: String,

    /// Whether the request is allowed
    pub allowed: bool,

    pub reason: DecisionReason,

    /// Target entity type; `None` when the request named an unknown one
    pub entity: Option<EntityType>,

    pub operation: Option<Operation>,

    /// Decision timestamp (milliseconds since epoch)
    pub timestamp: i64,
}

impl Decision {
    fn new(
        allowed: bool,
        entity: Option<EntityType>,
        operation: Option<Operation>,
        reason: DecisionReason,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            allowed,
            reason,
            entity,
            operation,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Allow decision
    pub fn allow(entity: EntityType, operation: Operation, reason: DecisionReason) -> Self {
        Self::new(true, Some(entity), Some(operation), reason)
    }

    /// Deny decision
    pub fn deny(entity: EntityType, operation: Operation, reason: DecisionReason) -> Self {
        Self::new(false, Some(entity), Some(operation), reason)
    }

    /// Deny a request whose entity or operation could not be identified
    pub fn reject(reason: DecisionReason) -> Self {
        Self::new(false, None, None, reason)
    }

    pub fn code(&self) -> &'static str {
        self.reason.code()
    }

    /// Presentation class of a denial; `None` when allowed. A read that no
    /// rule grants looks the same as a missing row.
    pub fn denial_class(&self) -> Option<DenialClass> {
        if self.allowed {
            return None;
        }
        match (&self.reason, self.operation) {
            (DecisionReason::NoMatchingRule, Some(Operation::Read) | None) => Some(DenialClass::NotFound),
            (reason, _) => reason.class(),
        }
    }
}
