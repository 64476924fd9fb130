//! Error types for the tenancy data model

use crate::types::{MembershipStatus, OrganizationId, PrincipalId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Data-model violations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Membership status change not permitted by the state machine
    #[error("Invalid membership transition: {from} -> {to}")]
    InvalidTransition {
        from: MembershipStatus,
        to: MembershipStatus,
    },

    /// A membership row already exists for this (organization, principal)
    #[error("Duplicate membership: principal {principal} in organization {organization}")]
    DuplicateMembership {
        organization: OrganizationId,
        principal: PrincipalId,
    },

    /// Principal already has a primary membership elsewhere
    #[error("Principal {0} already has a primary membership")]
    DuplicatePrimary(PrincipalId),

    /// Referenced row does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input/state
    #[error("Invalid: {0}")]
    Invalid(String),
}

impl CoreError {
    /// Create a not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        CoreError::NotFound(msg.into())
    }

    /// Create an invalid error
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        CoreError::Invalid(msg.into())
    }
}
