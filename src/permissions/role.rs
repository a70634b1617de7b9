//! Role registry
//!
//! Closed set of console roles. `SUPER_ADMIN` is the only privileged role;
//! every other value, including roles this build does not know about, goes
//! through the grant table.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::str::FromStr;

/// Role of the current actor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// Bypasses every check
    SuperAdmin,
    Admin,
    Manager,
    Operator,
    Viewer,
    /// A role string this build does not recognize. Never privileged.
    Unrecognized(String),
}

impl Role {
    /// The roles this build knows about
    pub fn known() -> &'static [Role] {
        &[
            Role::SuperAdmin,
            Role::Admin,
            Role::Manager,
            Role::Operator,
            Role::Viewer,
        ]
    }

    /// Wire name of the role
    pub fn as_str(&self) -> &str {
        match self {
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::Operator => "OPERATOR",
            Role::Viewer => "VIEWER",
            Role::Unrecognized(name) => name,
        }
    }

    /// Check if this role bypasses all grant checks
    pub fn is_privileged(&self) -> bool {
        is_privileged(self)
    }
}

/// Check if a role bypasses all grant checks
///
/// Pure and total. Only `SUPER_ADMIN` is privileged.
pub fn is_privileged(role: &Role) -> bool {
    matches!(role, Role::SuperAdmin)
}

impl FromStr for Role {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let role = match s {
            "SUPER_ADMIN" => Role::SuperAdmin,
            "ADMIN" => Role::Admin,
            "MANAGER" => Role::Manager,
            "OPERATOR" => Role::Operator,
            "VIEWER" => Role::Viewer,
            other => Role::Unrecognized(other.to_string()),
        };
        Ok(role)
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(role) => role,
            Err(never) => match never {},
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
