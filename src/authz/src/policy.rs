//! Policy rule set
//!
//! Each entity has one ordered rule list per operation. Rules are pure
//! predicates over the principal, the row's own columns and the
//! principal's role from the precomputed membership fact. No rule can query
//! another entity's table.
//!
//! Read lists are OR-combined. Write and delete lists are AND-combined: the
//! standard set carries the single owner-or-admin rule for both.

pub mod graph;

pub use graph::{GraphError, RuleGraph};

use crate::principal::Principal;
use crate::types::{EntityType, Operation, Row};
use docvault_core::{PrincipalId, Role, Vault};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A predicate over `{principal, row, facts}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// Any active membership in the row's organization
    ActiveMember,
    /// Principal captured as the row's owner
    Owner,
    /// Row carries the public flag
    Public,
    /// Active role at or above the given role
    MinimumRole(Role),
    /// Owner or admin role in the organization
    AdminRole,
    /// Row owner, or admin role in the organization
    OwnerOrAdmin,
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Rule::ActiveMember => "active_member",
            Rule::Owner => "owner",
            Rule::Public => "public",
            Rule::MinimumRole(_) => "minimum_role",
            Rule::AdminRole => "admin_role",
            Rule::OwnerOrAdmin => "owner_or_admin",
        }
    }

    pub fn holds(&self, input: &RuleInput<'_>) -> bool {
        let is_owner = input.owner == Some(input.principal.id);

        match self {
            Rule::ActiveMember => true,
            Rule::Owner => is_owner,
            Rule::Public => input.public,
            Rule::MinimumRole(min) => input.role >= *min,
            Rule::AdminRole => input.role.is_admin(),
            Rule::OwnerOrAdmin => is_owner || input.role.is_admin(),
        }
    }
}

/// Flattened view a rule is evaluated against. Only built once the
/// principal's membership in the row's organization is known to be active.
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    pub principal: &'a Principal,
    pub owner: Option<PrincipalId>,
    pub public: bool,
    pub role: Role,
}

impl<'a> RuleInput<'a> {
    pub fn for_row(principal: &'a Principal, row: &Row, role: Role) -> Self {
        Self {
            principal,
            owner: row.owner(),
            public: row.is_public(),
            role,
        }
    }

    pub fn for_vault(principal: &'a Principal, vault: &Vault, role: Role) -> Self {
        Self {
            principal,
            owner: Some(vault.created_by),
            public: vault.public,
            role,
        }
    }
}

/// Combine a rule list under the operation's semantics. Returns the rule
/// credited with the grant.
pub fn combine(operation: Operation, rules: &[Rule], input: &RuleInput<'_>) -> Option<Rule> {
    if operation.is_mutation() {
        if !rules.is_empty() && rules.iter().all(|rule| rule.holds(input)) {
            rules.first().copied()
        } else {
            None
        }
    } else {
        rules.iter().copied().find(|rule| rule.holds(input))
    }
}

/// Rules for one entity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityPolicy {
    /// Parent entity whose read rules must also hold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherits: Option<EntityType>,

    #[serde(default)]
    pub read: Option<Vec<Rule>>,

    #[serde(default)]
    pub write: Option<Vec<Rule>>,

    #[serde(default)]
    pub delete: Option<Vec<Rule>>,
}

impl EntityPolicy {
    fn rules(&self, operation: Operation) -> Option<&[Rule]> {
        match operation {
            Operation::Read => self.read.as_deref(),
            Operation::Write => self.write.as_deref(),
            Operation::Delete => self.delete.as_deref(),
        }
    }

    fn slot(&mut self, operation: Operation) -> &mut Option<Vec<Rule>> {
        match operation {
            Operation::Read => &mut self.read,
            Operation::Write => &mut self.write,
            Operation::Delete => &mut self.delete,
        }
    }
}

/// Validated, immutable rule table
#[derive(Debug, Clone)]
pub struct RuleSet {
    policies: BTreeMap<EntityType, EntityPolicy>,
    graph: RuleGraph,
}

impl RuleSet {
    pub fn builder() -> RuleSetBuilder {
        RuleSetBuilder::default()
    }

    /// Tenancy rules used by default
    pub fn standard() -> Self {
        let member_read = vec![Rule::Public, Rule::Owner, Rule::MinimumRole(Role::Member)];
        let mutation = vec![Rule::OwnerOrAdmin];

        let mut builder = RuleSet::builder()
            .rules(EntityType::Organization, Operation::Read, vec![Rule::ActiveMember])
            .rules(EntityType::Vault, Operation::Read, member_read.clone())
            .rules(EntityType::Asset, Operation::Read, member_read)
            .inherit(EntityType::Asset, EntityType::Vault);

        for entity in EntityType::ALL {
            for operation in [Operation::Write, Operation::Delete] {
                builder = builder.rules(entity, operation, mutation.clone());
            }
        }

        builder
            .build()
            .unwrap_or_else(|e| unreachable!("standard rule set is valid: {}", e))
    }

    /// Rule list for an entity/operation, `None` when unconfigured
    pub fn rules_for(&self, entity: EntityType, operation: Operation) -> Option<&[Rule]> {
        self.policies.get(&entity)?.rules(operation)
    }

    /// Parent entity whose read rules `entity` inherits
    pub fn inherits(&self, entity: EntityType) -> Option<EntityType> {
        self.graph.edge(entity)
    }

    pub fn graph(&self) -> &RuleGraph {
        &self.graph
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::standard()
    }
}

/// Builds and validates a [`RuleSet`]
#[derive(Debug, Clone, Default)]
pub struct RuleSetBuilder {
    policies: BTreeMap<EntityType, EntityPolicy>,
}

impl RuleSetBuilder {
    /// Set the rule list for an entity/operation, replacing any previous list
    pub fn rules(mut self, entity: EntityType, operation: Operation, rules: Vec<Rule>) -> Self {
        *self.policies.entry(entity).or_default().slot(operation) = Some(rules);
        self
    }

    /// Make `entity` require `parent`'s read rules
    pub fn inherit(mut self, entity: EntityType, parent: EntityType) -> Self {
        self.policies.entry(entity).or_default().inherits = Some(parent);
        self
    }

    /// Load entity policies from a serialized table
    pub fn with_policies(mut self, policies: BTreeMap<EntityType, EntityPolicy>) -> Self {
        self.policies.extend(policies);
        self
    }

    pub fn build(self) -> Result<RuleSet, GraphError> {
        let mut graph = RuleGraph::new();

        for (&entity, policy) in &self.policies {
            for operation in Operation::ALL {
                if matches!(policy.rules(operation), Some(rules) if rules.is_empty()) {
                    return Err(GraphError::EmptyRuleList {
                        entity: entity.to_string(),
                        operation: operation.to_string(),
                    });
                }
            }
            if let Some(parent) = policy.inherits {
                graph.add_edge(entity, parent);
            }
        }

        graph.validate()?;

        Ok(RuleSet {
            policies: self.policies,
            graph,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(principal: &Principal, owner: Option<PrincipalId>, public: bool, role: Role) -> RuleInput<'_> {
        RuleInput {
            principal,
            owner,
            public,
            role,
        }
    }

    #[test]
    fn test_standard_rule_set_shape() {
        let rules = RuleSet::standard();

        assert_eq!(
            rules.rules_for(EntityType::Organization, Operation::Read),
            Some(&[Rule::ActiveMember][..])
        );
        for entity in EntityType::ALL {
            assert_eq!(rules.rules_for(entity, Operation::Delete), Some(&[Rule::OwnerOrAdmin][..]));
        }
        assert_eq!(rules.inherits(EntityType::Asset), Some(EntityType::Vault));
        assert_eq!(rules.inherits(EntityType::Vault), None);
    }

    #[test]
    fn test_read_rules_are_permissive_union() {
        let me = Principal::new(PrincipalId::new());
        let rules = [Rule::Public, Rule::Owner, Rule::MinimumRole(Role::Member)];

        let viewer_public = input(&me, None, true, Role::Viewer);
        assert_eq!(combine(Operation::Read, &rules, &viewer_public), Some(Rule::Public));

        let viewer_owner = input(&me, Some(me.id), false, Role::Viewer);
        assert_eq!(combine(Operation::Read, &rules, &viewer_owner), Some(Rule::Owner));

        let viewer_private = input(&me, Some(PrincipalId::new()), false, Role::Viewer);
        assert_eq!(combine(Operation::Read, &rules, &viewer_private), None);
    }

    #[test]
    fn test_mutations_require_every_rule() {
        let me = Principal::new(PrincipalId::new());
        let rules = [Rule::OwnerOrAdmin, Rule::MinimumRole(Role::Member)];

        let owner_viewer = input(&me, Some(me.id), false, Role::Viewer);
        assert_eq!(combine(Operation::Write, &rules, &owner_viewer), None);

        let owner_member = input(&me, Some(me.id), false, Role::Member);
        assert_eq!(combine(Operation::Write, &rules, &owner_member), Some(Rule::OwnerOrAdmin));

        assert_eq!(combine(Operation::Delete, &[], &owner_member), None);
    }

    #[test]
    fn test_public_flag_never_grants_mutation() {
        let me = Principal::new(PrincipalId::new());
        let public_row = input(&me, Some(PrincipalId::new()), true, Role::Member);
        assert!(!Rule::OwnerOrAdmin.holds(&public_row));
    }

    #[test]
    fn test_builder_rejects_empty_lists() {
        let err = RuleSet::builder()
            .rules(EntityType::Vault, Operation::Write, vec![])
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            GraphError::EmptyRuleList {
                entity: "vault".to_string(),
                operation: "write".to_string(),
            }
        );
    }

    #[test]
    fn test_builder_rejects_deep_inheritance() {
        let err = RuleSet::builder()
            .rules(EntityType::Asset, Operation::Read, vec![Rule::Public])
            .inherit(EntityType::Asset, EntityType::Vault)
            .inherit(EntityType::Vault, EntityType::Organization)
            .build()
            .unwrap_err();

        assert!(matches!(err, GraphError::DepthExceeded(_)));
    }

    #[test]
    fn test_unconfigured_pair_is_absent() {
        let rules = RuleSet::builder()
            .rules(EntityType::Vault, Operation::Read, vec![Rule::ActiveMember])
            .build()
            .unwrap();

        assert!(rules.rules_for(EntityType::Vault, Operation::Write).is_none());
        assert!(rules.rules_for(EntityType::Asset, Operation::Read).is_none());
    }

    #[test]
    fn test_policies_deserialize_from_json() {
        let table: BTreeMap<EntityType, EntityPolicy> = serde_json::from_value(serde_json::json!({
            "vault": { "read": ["public", { "minimum_role": "admin" }] }
        }))
        .unwrap();

        let rules = RuleSet::builder().with_policies(table).build().unwrap();
        assert_eq!(
            rules.rules_for(EntityType::Vault, Operation::Read),
            Some(&[Rule::Public, Rule::MinimumRole(Role::Admin)][..])
        );
    }
}
