//! User roles and the hierarchy between them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role carried by every user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Platform operator
    Owner,
    /// Reseller that onboards organizations
    Agent,
    /// Organization administrator
    Admin,
    /// Organization member that issues cards
    Staff,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Owner, Role::Agent, Role::Admin, Role::Staff];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Agent => "agent",
            Self::Admin => "admin",
            Self::Staff => "staff",
        }
    }

    /// Roles bound to a single organization.
    pub fn is_organization_member(&self) -> bool {
        matches!(self, Self::Admin | Self::Staff)
    }

    /// Admin or anything above it.
    pub fn is_at_least_admin(&self) -> bool {
        !matches!(self, Self::Staff)
    }

    /// Whether a user with this role may create, edit or delete accounts of `target`.
    ///
    /// Agent accounts are managed only through the agents endpoints, so no
    /// role may create one here.
    pub fn can_create(&self, target: Role) -> bool {
        match (self, target) {
            (Self::Owner, Self::Admin | Self::Staff) => true,
            (Self::Agent, Self::Admin | Self::Staff) => true,
            (Self::Admin, Self::Staff) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "agent" => Ok(Self::Agent),
            "admin" => Ok(Self::Admin),
            "staff" => Ok(Self::Staff),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
