//! Error types for the authorization engine
//!
//! None of these ever turn into access. The evaluator maps each of them to a
//! deny decision with a distinguishable reason code.

use crate::policy::GraphError;
use crate::types::EntityType;
use docvault_core::CoreError;
use thiserror::Error;

/// Authorization engine errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Storage read failed or timed out
    #[error("Fact unavailable for {entity} {row}: {detail}")]
    FactUnavailable {
        entity: EntityType,
        row: String,
        detail: String,
    },

    /// Rule table has no entry for the requested combination, or an
    /// entity/operation name did not parse
    #[error("Unknown entity or operation: {0}")]
    UnknownEntityOrOperation(String),

    /// Facts contradict each other (e.g. vault points at a different organization)
    #[error("Inconsistent facts: {0}")]
    InconsistentFacts(String),

    /// Session could not be resolved to a principal
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Rule set failed validation
    #[error("Invalid rule set: {0}")]
    RuleGraph(#[from] GraphError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Data-model violation
    #[error("Data model error: {0}")]
    Core(#[from] CoreError),

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthzError {
    /// Create a fact-unavailable error for a row
    pub fn fact_unavailable(entity: EntityType, row: impl ToString, detail: impl Into<String>) -> Self {
        AuthzError::FactUnavailable {
            entity,
            row: row.to_string(),
            detail: detail.into(),
        }
    }
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
