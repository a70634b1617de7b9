//! Route table
//!
//! Maps navigation paths to boundary guards by regex pattern. The first
//! matching route wins; paths no route matches are public.
//!
//! Pattern examples:
//! - `"^/bookings(/.*)?$"` - the bookings section
//! - `"^/vehicle-contracts/new$"` - a single page

use regex::Regex;

use crate::config::AuthzConfig;
use crate::core::{AuthzError, AuthzResult};
use crate::permissions::{PermissionView, Role};

use super::boundary::{BoundaryGuard, GuardOutcome};

/// A route pattern and the guard mounted on it
pub struct RouteMatcher {
    pattern: Regex,
    guard: BoundaryGuard,
}

impl RouteMatcher {
    pub fn new(pattern: &str, guard: BoundaryGuard) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            guard,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }

    pub fn guard(&self) -> &BoundaryGuard {
        &self.guard
    }
}

impl std::fmt::Debug for RouteMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteMatcher")
            .field("pattern", &self.pattern.as_str())
            .field("guard", &self.guard)
            .finish()
    }
}

/// Ordered set of guarded routes
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<RouteMatcher>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from configuration
    pub fn from_config(config: &AuthzConfig) -> AuthzResult<Self> {
        let mut table = Self::new();
        for route in &config.routes {
            let fallback = route
                .fallback
                .clone()
                .unwrap_or_else(|| config.default_fallback.clone());
            let guard = BoundaryGuard::new(route.module.as_str(), route.action.clone(), fallback);
            table.add(&route.pattern, guard).map_err(|e| {
                AuthzError::invalid_config(format!("route pattern '{}': {}", route.pattern, e))
            })?;
        }
        tracing::debug!("Route table built with {} routes", table.len());
        Ok(table)
    }

    /// Add a guarded route
    pub fn add(&mut self, pattern: &str, guard: BoundaryGuard) -> Result<&mut Self, regex::Error> {
        self.routes.push(RouteMatcher::new(pattern, guard)?);
        Ok(self)
    }

    /// Guard mounted on `path`, if any
    pub fn resolve(&self, path: &str) -> Option<&BoundaryGuard> {
        self.routes
            .iter()
            .find(|route| route.matches(path))
            .map(RouteMatcher::guard)
    }

    /// Evaluate the guard for `path`; unguarded paths proceed
    pub fn check<V>(&self, path: &str, role: &Role, view: &V) -> GuardOutcome
    where
        V: PermissionView + ?Sized,
    {
        match self.resolve(path) {
            Some(guard) => guard.check(role, view),
            None => GuardOutcome::Proceed,
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
