//! Organization memberships and their status state machine
//!
//! ```text
//! pending ──► active ──► revoked
//!    │          ▲  │        │
//!    │          └──┘        │ (re-invitation)
//!    └──► revoked ◄─────────┘──► pending
//! ```
//!
//! Rows are never deleted. A revoked membership regains visibility only by
//! being re-invited (`revoked → pending`) and accepted again
//! (`pending → active`), so the audit trail keeps every transition.

use super::ids::{OrganizationId, PrincipalId};
use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role held inside an organization, ordered by privilege
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Member,
    Admin,
    Owner,
}

impl Role {
    /// Owner and admin roles may mutate any row in the organization
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::Owner)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Member => "member",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "viewer" => Ok(Role::Viewer),
            "member" => Ok(Role::Member),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            other => Err(CoreError::invalid(format!("unknown role '{}'", other))),
        }
    }
}

/// Membership lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Pending,
    Active,
    Revoked,
}

impl MembershipStatus {
    /// Whether the state machine permits moving from `self` to `to`
    pub fn can_transition_to(&self, to: MembershipStatus) -> bool {
        use MembershipStatus::*;
        matches!(
            (self, to),
            (Pending, Active) | (Pending, Revoked) | (Active, Active) | (Active, Revoked) | (Revoked, Pending)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Pending => "pending",
            MembershipStatus::Active => "active",
            MembershipStatus::Revoked => "revoked",
        }
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(MembershipStatus::Pending),
            "active" => Ok(MembershipStatus::Active),
            "revoked" => Ok(MembershipStatus::Revoked),
            other => Err(CoreError::invalid(format!("unknown membership status '{}'", other))),
        }
    }
}

/// A principal's durable relationship to one organization.
///
/// Unique per (organization, principal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub organization_id: OrganizationId,

    pub principal_id: PrincipalId,

    pub role: Role,

    pub status: MembershipStatus,

    /// The principal's default organization
    #[serde(default)]
    pub is_primary: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Membership {
    /// Record an invitation. Invitations start out `pending`.
    pub fn invite(organization_id: OrganizationId, principal_id: PrincipalId, role: Role) -> Self {
        let now = Utc::now();
        Self {
            organization_id,
            principal_id,
            role,
            status: MembershipStatus::Pending,
            is_primary: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Invite and immediately accept
    pub fn active(organization_id: OrganizationId, principal_id: PrincipalId, role: Role) -> Self {
        let mut membership = Self::invite(organization_id, principal_id, role);
        membership.status = MembershipStatus::Active;
        membership
    }

    /// Mark as the principal's primary organization
    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }

    /// Move to a new status, enforcing the state machine
    pub fn transition(&mut self, to: MembershipStatus) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Change role. Revoked memberships keep the role they were revoked with.
    pub fn change_role(&mut self, role: Role) -> Result<()> {
        if self.status == MembershipStatus::Revoked {
            return Err(CoreError::invalid("cannot change the role of a revoked membership"));
        }
        self.role = role;
        self.updated_at = Utc::now();
        Ok(())
    }
}
