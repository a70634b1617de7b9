//! AuthzSession - the host application's entry point
//!
//! Owns one store, one loader and the route table for the current actor.
//! Boundary mounts go through `mount`, server-side action gates through
//! `can`.

use std::sync::Arc;
use std::time::Duration;

use crate::config::AuthzConfig;
use crate::core::{ActorContext, AuthzResult, LoadError};
use crate::guard::{GuardOutcome, RouteTable};
use crate::loader::{HttpPermissionFetcher, LoadOutcome, PermissionFetcher, PermissionLoader};
use crate::permissions::{decide, Action, Decision, PermissionStore, PermissionView, Role, StoreSnapshot};

/// Authorization state for one actor session
///
/// Cheap to clone; clones share the same store and loader.
#[derive(Clone)]
pub struct AuthzSession {
    store: Arc<PermissionStore>,
    loader: Arc<PermissionLoader>,
    routes: Arc<RouteTable>,
    load_timeout: Option<Duration>,
}

impl AuthzSession {
    /// Create a session with its own store
    pub fn new(actor: ActorContext, fetcher: Arc<dyn PermissionFetcher>, routes: RouteTable) -> Self {
        let store = Arc::new(PermissionStore::new());
        let loader = Arc::new(PermissionLoader::new(store.clone(), fetcher, actor));
        Self {
            store,
            loader,
            routes: Arc::new(routes),
            load_timeout: None,
        }
    }

    /// Create a session fetching over HTTP as configured
    pub fn from_config(config: &AuthzConfig, actor: ActorContext) -> AuthzResult<Self> {
        config.validate()?;
        let routes = RouteTable::from_config(config)?;
        let fetcher = Arc::new(HttpPermissionFetcher::new(config.permissions_url.as_str()));
        let mut session = Self::new(actor, fetcher, routes);
        session.load_timeout = config.request_timeout();
        Ok(session)
    }

    /// Bound every load issued through this session
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = Some(timeout);
        self
    }

    pub fn store(&self) -> &Arc<PermissionStore> {
        &self.store
    }

    pub fn loader(&self) -> &Arc<PermissionLoader> {
        &self.loader
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Role of the current actor
    pub fn role(&self) -> Role {
        self.loader.actor().role
    }

    /// Load permissions (coalesced with any in-flight load)
    pub async fn load(&self) -> Result<LoadOutcome, LoadError> {
        match self.load_timeout {
            Some(limit) => self.loader.load_within(limit).await,
            None => self.loader.load().await,
        }
    }

    /// Force a fresh load
    pub async fn refresh(&self) -> Result<LoadOutcome, LoadError> {
        self.loader.reload().await
    }

    /// Replace the actor (e.g. role change) and reload
    pub async fn switch_actor(&self, actor: ActorContext) -> Result<LoadOutcome, LoadError> {
        self.loader.switch_actor(actor).await
    }

    /// Drop all grants
    pub fn logout(&self) {
        tracing::info!("Clearing permissions for {}", self.loader.actor().actor_id);
        self.store.reset();
    }

    /// Boundary mount for `path`
    ///
    /// Unguarded paths and privileged actors proceed immediately. Everyone
    /// else waits for a (coalesced) load when the store is not settled or
    /// the last load failed, then the guard runs against one snapshot.
    pub async fn mount(&self, path: &str) -> GuardOutcome {
        let role = self.role();
        if self.routes.resolve(path).is_none() || role.is_privileged() {
            return self.check(path);
        }

        let state = self.store.state();
        if state.needs_load() || state.is_loading() {
            if let Err(err) = self.load().await {
                tracing::warn!("Permission load for mount of {} failed: {}", path, err);
            }
        }

        self.check(path)
    }

    /// Evaluate the guard for `path` now, without loading
    pub fn check(&self, path: &str) -> GuardOutcome {
        let snapshot = self.store.snapshot();
        self.routes
            .check(path, &self.role_in(&snapshot), snapshot.as_ref())
    }

    /// Action gate: may the current actor perform `action` on `module`?
    pub fn decide(&self, module: &str, action: &Action) -> Decision {
        let snapshot = self.store.snapshot();
        decide(&self.role_in(&snapshot), snapshot.as_ref(), module, action)
    }

    // The role a snapshot's grants belong to. A concurrent `switch_actor`
    // may already have published a newer actor.
    fn role_in(&self, snapshot: &StoreSnapshot) -> Role {
        snapshot.role().cloned().unwrap_or_else(|| self.role())
    }

    /// Shorthand for `decide(..).allow`
    pub fn can(&self, module: &str, action: impl Into<Action>) -> bool {
        self.decide(module, &action.into()).allow
    }
}

impl std::fmt::Debug for AuthzSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthzSession")
            .field("actor", &self.loader.actor())
            .field("state", &self.store.state())
            .field("routes", &self.routes.len())
            .field("load_timeout", &self.load_timeout)
            .finish()
    }
}
