//! Boundary guard
//!
//! Sits at a protected entry point (route, action handler), asks `decide`
//! and either lets the region run or hands the host a redirect target. The
//! guard never writes to the store.

use serde::{Deserialize, Serialize};

use crate::permissions::{decide, Action, DenyReason, Module, PermissionView, Role};

/// Host-side navigation used when a guard denies
pub trait Navigator: Send + Sync {
    /// Send the actor to `target`
    fn redirect(&self, target: &str, reason: DenyReason);
}

/// Implement Navigator for closures
impl<F> Navigator for F
where
    F: Fn(&str, DenyReason) + Send + Sync,
{
    fn redirect(&self, target: &str, reason: DenyReason) {
        (self)(target, reason)
    }
}

/// Result of a guard check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardOutcome {
    /// The protected region may proceed
    Proceed,
    /// Access denied; the host should navigate to `target`
    Redirect {
        target: String,
        reason: DenyReason,
    },
}

impl GuardOutcome {
    pub fn is_proceed(&self) -> bool {
        matches!(self, GuardOutcome::Proceed)
    }

    /// Deny reason, if denied
    pub fn reason(&self) -> Option<DenyReason> {
        match self {
            GuardOutcome::Proceed => None,
            GuardOutcome::Redirect { reason, .. } => Some(*reason),
        }
    }
}

/// Guard for one protected entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryGuard {
    module: Module,
    #[serde(default)]
    action: Action,
    fallback: String,
}

impl BoundaryGuard {
    /// Create a guard requiring `action` on `module`
    pub fn new(
        module: impl Into<Module>,
        action: impl Into<Action>,
        fallback: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            action: action.into(),
            fallback: fallback.into(),
        }
    }

    /// Create a guard requiring `read` on `module`
    pub fn read(module: impl Into<Module>, fallback: impl Into<String>) -> Self {
        Self::new(module, Action::Read, fallback)
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Evaluate the guard for `role`
    pub fn check<V>(&self, role: &Role, view: &V) -> GuardOutcome
    where
        V: PermissionView + ?Sized,
    {
        let decision = decide(role, view, self.module.as_str(), &self.action);
        match decision.reason {
            None => {
                tracing::debug!(
                    "Guard allowed {} on {} for {}",
                    self.action,
                    self.module,
                    role
                );
                GuardOutcome::Proceed
            }
            Some(reason) => {
                tracing::warn!(
                    "Guard denied {} on {} for {} ({}), redirecting to {}",
                    self.action,
                    self.module,
                    role,
                    reason,
                    self.fallback
                );
                GuardOutcome::Redirect {
                    target: self.fallback.clone(),
                    reason,
                }
            }
        }
    }

    /// Run `region` if allowed, otherwise redirect through `navigator`
    pub fn enter<V, T, F>(
        &self,
        role: &Role,
        view: &V,
        navigator: &dyn Navigator,
        region: F,
    ) -> Option<T>
    where
        V: PermissionView + ?Sized,
        F: FnOnce() -> T,
    {
        match self.check(role, view) {
            GuardOutcome::Proceed => Some(region()),
            GuardOutcome::Redirect { target, reason } => {
                navigator.redirect(&target, reason);
                None
            }
        }
    }
}

/// Evaluate nested guards outermost first; the first deny wins
///
/// Pass a `StoreSnapshot` so every level sees the same grants.
pub fn check_nested<V>(guards: &[&BoundaryGuard], role: &Role, view: &V) -> GuardOutcome
where
    V: PermissionView + ?Sized,
{
    for guard in guards {
        let outcome = guard.check(role, view);
        if !outcome.is_proceed() {
            return outcome;
        }
    }
    GuardOutcome::Proceed
}
