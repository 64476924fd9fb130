//! Session → principal resolution
//!
//! Pure mapping from an already-authenticated session to a stable principal
//! identity. Performs no table lookups.

use crate::error::{AuthzError, Result};
use chrono::{DateTime, Duration, Utc};
use docvault_core::PrincipalId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Authenticated identity making a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
}

impl Principal {
    pub fn new(id: PrincipalId) -> Self {
        Self { id }
    }
}

impl From<PrincipalId> for Principal {
    fn from(id: PrincipalId) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user:{}", self.id)
    }
}

/// Session issued by the authentication collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Subject claim, either a bare UUID or `user:<uuid>`
    #[serde(rename = "sub")]
    pub subject: String,

    #[serde(rename = "iat")]
    pub issued_at: DateTime<Utc>,

    #[serde(rename = "exp")]
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Session for `principal` valid for `ttl` from now
    pub fn for_principal(principal: PrincipalId, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            subject: format!("user:{}", principal),
            issued_at: now,
            expires_at: now + ttl,
        }
    }
}

/// Maps sessions to principals
#[derive(Debug, Clone)]
pub struct PrincipalResolver {
    /// Tolerated clock drift between the issuer and this process
    leeway: Duration,
}

impl PrincipalResolver {
    pub fn new() -> Self {
        Self::with_leeway(Duration::seconds(30))
    }

    pub fn with_leeway(leeway: Duration) -> Self {
        Self { leeway }
    }

    /// Resolve against the current time
    pub fn resolve(&self, session: &Session) -> Result<Principal> {
        self.resolve_at(session, Utc::now())
    }

    /// Resolve against an explicit clock reading
    pub fn resolve_at(&self, session: &Session, now: DateTime<Utc>) -> Result<Principal> {
        let expires = session
            .expires_at
            .checked_add_signed(self.leeway)
            .ok_or_else(|| AuthzError::Unauthenticated("expiry out of range".to_string()))?;
        if expires <= now {
            return Err(AuthzError::Unauthenticated("session expired".to_string()));
        }

        let issued = session
            .issued_at
            .checked_sub_signed(self.leeway)
            .ok_or_else(|| AuthzError::Unauthenticated("issue time out of range".to_string()))?;
        if issued > now {
            return Err(AuthzError::Unauthenticated("session issued in the future".to_string()));
        }

        let raw = session.subject.trim();
        let raw = match raw.split_once(':') {
            Some(("user", id)) => id,
            Some((kind, _)) => {
                return Err(AuthzError::Unauthenticated(format!(
                    "unsupported subject type '{}'",
                    kind
                )))
            }
            None => raw,
        };

        if raw.is_empty() {
            return Err(AuthzError::Unauthenticated("missing subject".to_string()));
        }

        raw.parse::<PrincipalId>()
            .map(Principal::new)
            .map_err(|e| AuthzError::Unauthenticated(format!("malformed subject: {}", e)))
    }
}

impl Default for PrincipalResolver {
    fn default() -> Self {
        Self::new()
    }
}
