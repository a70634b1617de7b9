//! Permission data model
//!
//! - `Module` - opaque functional area name ("bookings", "drivers", ...)
//! - `Action` - operation class inside a module, `read` by default
//! - `ModuleGrant` - action → allowed for one module
//! - `PermissionSet` - module → grant, the full picture for one actor
//!
//! Wire form of a permission set:
//!
//! ```json
//! { "bookings": { "read": true, "write": false }, "drivers": { "read": true } }
//! ```
//!
//! The service may also wrap it as `{ "permissions": { ... } }`.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::convert::Infallible;
use std::str::FromStr;

use crate::core::LoadError;

/// Name of a functional area under access control
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Module(String);

impl Module {
    /// Create a module identifier
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Module {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Module {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Module {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operation class checked within a module
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    #[default]
    Read,
    Write,
    Update,
    Delete,
    /// Any other action the server defines
    Other(String),
}

impl Action {
    /// Wire name of the action
    pub fn as_str(&self) -> &str {
        match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Other(name) => name,
        }
    }
}

impl FromStr for Action {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let action = match trimmed.to_ascii_lowercase().as_str() {
            "read" => Action::Read,
            "write" => Action::Write,
            "update" => Action::Update,
            "delete" => Action::Delete,
            _ => Action::Other(trimmed.to_string()),
        };
        Ok(action)
    }
}

impl From<&str> for Action {
    fn from(value: &str) -> Self {
        match value.parse() {
            Ok(action) => action,
            Err(never) => match never {},
        }
    }
}

impl From<String> for Action {
    fn from(value: String) -> Self {
        Action::from(value.as_str())
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_string()
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grants for the actions of one module
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleGrant {
    actions: HashMap<Action, bool>,
}

impl ModuleGrant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style grant
    pub fn with(mut self, action: impl Into<Action>, allowed: bool) -> Self {
        self.set(action, allowed);
        self
    }

    pub fn set(&mut self, action: impl Into<Action>, allowed: bool) {
        self.actions.insert(action.into(), allowed);
    }

    /// Whether the action is allowed. Absent and explicitly denied both
    /// resolve to `false`.
    pub fn allows(&self, action: &Action) -> bool {
        self.actions.get(action).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// The complete grant table for one actor
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet {
    modules: HashMap<Module, ModuleGrant>,
}

// A bare set is tried first: a module that happens to be named
// "permissions" must not swallow its siblings.
#[derive(Deserialize)]
#[serde(untagged)]
enum WirePermissions {
    Bare(PermissionSet),
    Envelope { permissions: PermissionSet },
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a module grant
    pub fn with_module(mut self, module: impl Into<Module>, grant: ModuleGrant) -> Self {
        self.insert(module, grant);
        self
    }

    pub fn insert(&mut self, module: impl Into<Module>, grant: ModuleGrant) {
        self.modules.insert(module.into(), grant);
    }

    /// Grant for one module, if the module is present
    pub fn module(&self, module: &str) -> Option<&ModuleGrant> {
        self.modules.get(module)
    }

    /// Whether `action` is allowed on `module`
    pub fn allows(&self, module: &str, action: &Action) -> bool {
        self.module(module)
            .map(|grant| grant.allows(action))
            .unwrap_or(false)
    }

    /// Module names, sorted
    pub fn modules(&self) -> Vec<&Module> {
        let mut names: Vec<_> = self.modules.keys().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Parse a permission service response body
    pub fn from_json(body: &str) -> Result<Self, LoadError> {
        match serde_json::from_str::<WirePermissions>(body) {
            Ok(WirePermissions::Bare(permissions)) => Ok(permissions),
            Ok(WirePermissions::Envelope { permissions }) => Ok(permissions),
            Err(e) => Err(LoadError::malformed(e.to_string())),
        }
    }
}
