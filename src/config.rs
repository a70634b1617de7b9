//! Configuration
//!
//! JSON configuration for the permission endpoint and the guarded routes.
//!
//! ```json
//! {
//!   "permissions_url": "https://console.example.com/api/permissions",
//!   "request_timeout_ms": 5000,
//!   "default_fallback": "/unauthorized",
//!   "routes": [
//!     { "pattern": "^/bookings/new$", "module": "bookings", "action": "write", "fallback": "/bookings" },
//!     { "pattern": "^/bookings(/.*)?$", "module": "bookings" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::core::{AuthzError, AuthzResult};
use crate::permissions::Action;

/// Environment variable holding the config file path
pub const CONFIG_ENV: &str = "FLEET_AUTHZ_CONFIG";

/// One guarded route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Regex matched against the navigation path
    pub pattern: String,

    /// Module the route belongs to
    pub module: String,

    /// Required action (defaults to read)
    #[serde(default)]
    pub action: Action,

    /// Where to send denied actors (defaults to `default_fallback`)
    pub fallback: Option<String>,
}

impl RouteConfig {
    /// Create a route requiring read access
    pub fn new(pattern: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            module: module.into(),
            action: Action::Read,
            fallback: None,
        }
    }

    /// Set the required action
    pub fn with_action(mut self, action: impl Into<Action>) -> Self {
        self.action = action.into();
        self
    }

    /// Set the fallback target
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }
}

fn default_fallback() -> String {
    "/unauthorized".to_string()
}

/// Authorization core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthzConfig {
    /// Endpoint returning the actor's permission set
    pub permissions_url: String,

    /// Optional bound on a permission load in milliseconds
    pub request_timeout_ms: Option<u64>,

    /// Redirect target for routes without their own fallback
    #[serde(default = "default_fallback")]
    pub default_fallback: String,

    /// Guarded routes, first match wins
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl AuthzConfig {
    /// Create a configuration with no routes
    pub fn new(permissions_url: impl Into<String>) -> Self {
        Self {
            permissions_url: permissions_url.into(),
            request_timeout_ms: None,
            default_fallback: default_fallback(),
            routes: Vec::new(),
        }
    }

    /// Add a route
    pub fn with_route(mut self, route: RouteConfig) -> Self {
        self.routes.push(route);
        self
    }

    /// Set the load timeout
    pub fn with_request_timeout(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = Some(timeout_ms);
        self
    }

    /// Set the default fallback target
    pub fn with_default_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.default_fallback = fallback.into();
        self
    }

    /// Get the load timeout as Duration
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> AuthzResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> AuthzResult<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading authz config from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load from the file named by `FLEET_AUTHZ_CONFIG`
    pub fn from_env() -> AuthzResult<Self> {
        let path = std::env::var(CONFIG_ENV).map_err(|_| {
            AuthzError::invalid_config(format!("{} is not set", CONFIG_ENV))
        })?;
        Self::from_file(path)
    }

    /// Check the configuration for values that cannot work
    ///
    /// Route regexes are checked when the route table is built.
    pub fn validate(&self) -> AuthzResult<()> {
        if self.permissions_url.trim().is_empty() {
            return Err(AuthzError::invalid_config("permissions_url is empty"));
        }
        if self.request_timeout_ms == Some(0) {
            return Err(AuthzError::invalid_config("request_timeout_ms must be > 0"));
        }
        for route in &self.routes {
            if route.module.trim().is_empty() {
                return Err(AuthzError::invalid_config(format!(
                    "route '{}' has an empty module",
                    route.pattern
                )));
            }
        }
        Ok(())
    }
}
