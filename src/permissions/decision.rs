//! Access decision procedure
//!
//! Two ordered checks:
//!
//! 1. Privileged role → allow, before the store is even consulted. A slow or
//!    failed permission fetch never locks out `SUPER_ADMIN`.
//! 2. Everyone else is fail-closed: deny `NotReady` until the store is
//!    `Ready`, then allow exactly what the grant table says.

use serde::{Deserialize, Serialize};

use super::model::Action;
use super::role::{is_privileged, Role};
use super::store::PermissionView;

/// Why access was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Grants are not loaded (uninitialized, loading, or failed)
    NotReady,
    /// Grants are loaded and do not allow the action
    Forbidden,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::NotReady => write!(f, "permissions not ready"),
            DenyReason::Forbidden => write!(f, "forbidden"),
        }
    }
}

/// Outcome of an access check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub allow: bool,
    /// Set exactly when `allow` is false
    pub reason: Option<DenyReason>,
}

impl Decision {
    pub fn allow() -> Self {
        Self {
            allow: true,
            reason: None,
        }
    }

    pub fn deny(reason: DenyReason) -> Self {
        Self {
            allow: false,
            reason: Some(reason),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.allow
    }
}

/// Decide whether `role` may perform `action` on `module`
pub fn decide<V>(role: &Role, view: &V, module: &str, action: &Action) -> Decision
where
    V: PermissionView + ?Sized,
{
    if is_privileged(role) {
        return Decision::allow();
    }

    if !view.state().is_ready() {
        return Decision::deny(DenyReason::NotReady);
    }

    if view.grant(module, action) {
        Decision::allow()
    } else {
        Decision::deny(DenyReason::Forbidden)
    }
}

/// `decide` with the default `read` action
pub fn decide_read<V>(role: &Role, view: &V, module: &str) -> Decision
where
    V: PermissionView + ?Sized,
{
    decide(role, view, module, &Action::default())
}
