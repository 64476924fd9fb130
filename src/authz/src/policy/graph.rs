//! Inheritance graph between entity rule sets
//!
//! An entity may require its parent's read rules to hold before its own
//! are consulted. This module rejects any configuration where that
//! reference chain loops back on itself or runs more than one hop deep, so
//! evaluation depth is bounded by construction.

use crate::types::EntityType;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Rule-set validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// Inheritance loops back on itself
    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    /// A chain of inherited rule sets deeper than one hop
    #[error("Inheritance deeper than one hop: {0}")]
    DepthExceeded(String),

    /// Inheriting from an entity that is not the structural parent
    #[error("Invalid inheritance edge: {0}")]
    InvalidEdge(String),

    /// Operation configured with no rules
    #[error("Empty rule list for {entity}/{operation}")]
    EmptyRuleList { entity: String, operation: String },
}

/// Entity-level inheritance edges (`from` requires `to`)
#[derive(Debug, Clone, Default)]
pub struct RuleGraph {
    edges: BTreeMap<EntityType, EntityType>,
}

impl RuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `from` inherits `to`'s read rules
    pub fn add_edge(&mut self, from: EntityType, to: EntityType) {
        self.edges.insert(from, to);
    }

    pub fn edge(&self, from: EntityType) -> Option<EntityType> {
        self.edges.get(&from).copied()
    }

    /// Reject cycles, chains deeper than one hop and non-structural edges
    pub fn validate(&self) -> Result<(), GraphError> {
        self.detect_cycle()?;

        for (&from, &to) in &self.edges {
            if let Some(next) = self.edge(to) {
                return Err(GraphError::DepthExceeded(format!("{} -> {} -> {}", from, to, next)));
            }
            if from.parent() != Some(to) {
                return Err(GraphError::InvalidEdge(format!(
                    "{} cannot inherit from {}",
                    from, to
                )));
            }
        }

        Ok(())
    }

    /// Walk each chain, reporting the first loop with its full path
    fn detect_cycle(&self) -> Result<(), GraphError> {
        let mut finished: HashSet<EntityType> = HashSet::new();

        for &start in self.edges.keys() {
            if finished.contains(&start) {
                continue;
            }

            let mut path: Vec<EntityType> = Vec::new();
            let mut current = Some(start);

            while let Some(node) = current {
                if let Some(pos) = path.iter().position(|n| *n == node) {
                    let cycle: Vec<String> = path[pos..]
                        .iter()
                        .chain(std::iter::once(&node))
                        .map(|e| e.to_string())
                        .collect();
                    return Err(GraphError::CircularDependency(cycle.join(" -> ")));
                }
                if finished.contains(&node) {
                    break;
                }
                path.push(node);
                current = self.edge(node);
            }

            finished.extend(path);
        }

        Ok(())
    }
}
