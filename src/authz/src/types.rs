//! Core authorization types

use crate::error::AuthzError;
use docvault_core::{Asset, Organization, OrganizationId, PrincipalId, Vault, VaultId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Operation being performed on a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Read,
    Write,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 3] = [Operation::Read, Operation::Write, Operation::Delete];

    /// Write and delete share the owner-or-admin requirement
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Operation::Read)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Write => "write",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Operation::Read),
            "write" => Ok(Operation::Write),
            "delete" => Ok(Operation::Delete),
            other => Err(AuthzError::UnknownEntityOrOperation(format!(
                "unknown operation '{}'",
                other
            ))),
        }
    }
}

/// Entity kinds covered by the rule set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Organization,
    Vault,
    Asset,
}

impl EntityType {
    pub const ALL: [EntityType; 3] = [EntityType::Organization, EntityType::Vault, EntityType::Asset];

    /// Structural owner in the tenancy hierarchy
    pub fn parent(&self) -> Option<EntityType> {
        match self {
            EntityType::Organization => None,
            EntityType::Vault => Some(EntityType::Organization),
            EntityType::Asset => Some(EntityType::Vault),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Organization => "organization",
            EntityType::Vault => "vault",
            EntityType::Asset => "asset",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "organization" => Ok(EntityType::Organization),
            "vault" => Ok(EntityType::Vault),
            "asset" => Ok(EntityType::Asset),
            other => Err(AuthzError::UnknownEntityOrOperation(format!(
                "unknown entity type '{}'",
                other
            ))),
        }
    }
}

/// Target row of an evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum Row {
    Organization(Organization),
    Vault(Vault),
    Asset(Asset),
}

impl Row {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Row::Organization(_) => EntityType::Organization,
            Row::Vault(_) => EntityType::Vault,
            Row::Asset(_) => EntityType::Asset,
        }
    }

    /// Raw row identifier
    pub fn id(&self) -> Uuid {
        match self {
            Row::Organization(org) => org.id.0,
            Row::Vault(vault) => vault.id.0,
            Row::Asset(asset) => asset.id.0,
        }
    }

    /// Principal captured as the row's owner, if the entity has one
    pub fn owner(&self) -> Option<PrincipalId> {
        match self {
            Row::Organization(_) => None,
            Row::Vault(vault) => Some(vault.created_by),
            Row::Asset(asset) => Some(asset.uploaded_by),
        }
    }

    /// Public flag; organizations are never public
    pub fn is_public(&self) -> bool {
        match self {
            Row::Organization(_) => false,
            Row::Vault(vault) => vault.public,
            Row::Asset(asset) => asset.public,
        }
    }

    pub fn is_deleted(&self) -> bool {
        match self {
            Row::Organization(org) => org.is_deleted(),
            Row::Vault(vault) => vault.is_deleted(),
            Row::Asset(asset) => asset.is_deleted(),
        }
    }

    /// Inactive organization or suspended vault. Assets carry no flag of their own.
    pub fn is_inactive(&self) -> bool {
        match self {
            Row::Organization(org) => !org.active,
            Row::Vault(vault) => vault.is_inactive(),
            Row::Asset(_) => false,
        }
    }
}

/// Bound on a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ListScope {
    /// Everything the principal can reach
    All,
    /// Rows inside one organization
    Organization(OrganizationId),
    /// One vault and the assets bound to it
    Vault(VaultId),
}
