//! Permission store
//!
//! Process-wide cache of the current actor's `PermissionSet` plus its
//! lifecycle. The whole picture (generation, state, grants) lives in one
//! immutable `StoreSnapshot` behind an `RwLock<Arc<..>>`: writers swap the
//! `Arc`, readers clone it, so no reader can observe grants from two
//! different loads. The snapshot also records the role its grants were
//! loaded for, so a role and its grants are always read together.
//!
//! Only the loader writes. Reads never block on I/O.

use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;

use crate::core::LifecycleState;

use super::model::{Action, PermissionSet};
use super::role::Role;

/// Token identifying one load. Bumped on every `mark_loading`, `replace`
/// and `reset`; a result is only applied under the generation that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    fn next(self) -> Self {
        Generation(self.0 + 1)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Read access needed by the decision procedure
///
/// Implemented by the live store and by frozen snapshots, so nested guards
/// can evaluate against one consistent view.
pub trait PermissionView {
    /// Current lifecycle state
    fn state(&self) -> LifecycleState;

    /// Whether `action` on `module` is granted. `false` when the module or
    /// action is absent, or when the lifecycle is not `Ready`.
    fn grant(&self, module: &str, action: &Action) -> bool;
}

/// Immutable view of the store at one point in time
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    generation: Generation,
    state: LifecycleState,
    permissions: PermissionSet,
    loaded_at: Option<DateTime<Utc>>,
    role: Option<Role>,
}

impl StoreSnapshot {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn lifecycle(&self) -> &LifecycleState {
        &self.state
    }

    /// Grants of the last successful load. Not consulted unless `Ready`.
    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    /// When the current grants were applied
    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    /// Role the store is bound to; grants in this snapshot belong to it
    pub fn role(&self) -> Option<&Role> {
        self.role.as_ref()
    }
}

impl PermissionView for StoreSnapshot {
    fn state(&self) -> LifecycleState {
        self.state.clone()
    }

    fn grant(&self, module: &str, action: &Action) -> bool {
        self.state.is_ready() && self.permissions.allows(module, action)
    }
}

/// Process-wide permission cache with lifecycle
pub struct PermissionStore {
    current: RwLock<Arc<StoreSnapshot>>,
    state_tx: watch::Sender<LifecycleState>,
}

impl PermissionStore {
    /// Create an uninitialized store
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(LifecycleState::Uninitialized);
        Self {
            current: RwLock::new(Arc::new(StoreSnapshot::default())),
            state_tx,
        }
    }

    /// Consistent view of generation, state and grants
    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Generation of the most recently issued write
    pub fn generation(&self) -> Generation {
        self.snapshot().generation
    }

    /// Subscribe to lifecycle changes
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state_tx.subscribe()
    }

    /// Wait until the store is `Ready` or `Failed`
    ///
    /// Optional for hosts that want to hold rendering until grants settle.
    /// Decisions never wait; they fail closed instead.
    pub async fn wait_until_settled(&self) -> LifecycleState {
        let mut rx = self.subscribe();
        let settled = match rx.wait_for(LifecycleState::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => self.snapshot().state.clone(),
        };
        settled
    }

    /// Replace the whole permission set and become `Ready`
    ///
    /// Supersedes any in-flight load.
    pub fn replace(&self, permissions: PermissionSet) {
        self.update(|current| {
            let generation = current.generation.next();
            tracing::info!(
                "Permission set replaced ({} modules, generation {})",
                permissions.len(),
                generation
            );
            Some(ready(current, generation, permissions))
        });
    }

    /// Enter `Loading` under a fresh generation
    pub fn mark_loading(&self) -> Generation {
        let mut issued = Generation::default();
        self.update(|current| {
            issued = current.generation.next();
            tracing::debug!("Permission store loading (generation {})", issued);
            Some(StoreSnapshot {
                generation: issued,
                state: LifecycleState::Loading,
                permissions: current.permissions.clone(),
                loaded_at: current.loaded_at,
                role: current.role.clone(),
            })
        });
        issued
    }

    /// Enter `Failed` regardless of generation
    pub fn mark_failed(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.update(|current| {
            tracing::warn!("Permission store failed: {}", reason);
            Some(StoreSnapshot {
                state: LifecycleState::failed(reason),
                ..current.clone()
            })
        });
    }

    /// Apply a load result if it is still the current load
    ///
    /// Returns `false` (and changes nothing) when a newer load was issued or
    /// the store left `Loading` in the meantime.
    pub fn commit(&self, generation: Generation, permissions: PermissionSet) -> bool {
        self.update(|current| {
            if !is_current(current, generation) {
                return None;
            }
            tracing::info!(
                "Permissions loaded ({} modules, generation {})",
                permissions.len(),
                generation
            );
            Some(ready(current, generation, permissions))
        })
    }

    /// Record a load failure if it is still the current load
    pub fn fail(&self, generation: Generation, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        self.update(|current| {
            if !is_current(current, generation) {
                return None;
            }
            tracing::warn!(
                "Permission load failed (generation {}): {}",
                generation,
                reason
            );
            Some(StoreSnapshot {
                state: LifecycleState::failed(reason.clone()),
                ..current.clone()
            })
        })
    }

    /// Drop all grants and return to `Uninitialized`
    ///
    /// Any in-flight load becomes stale. The bound role is kept.
    pub fn reset(&self) {
        self.update(|current| {
            let generation = current.generation.next();
            tracing::info!("Permission store reset (generation {})", generation);
            Some(StoreSnapshot {
                generation,
                role: current.role.clone(),
                ..StoreSnapshot::default()
            })
        });
    }

    /// Drop all grants and bind the store to `role`
    ///
    /// Like `reset`, but in the same swap the store starts belonging to a
    /// new role. Readers see either the old role with its grants or the new
    /// role with nothing.
    pub fn reset_for(&self, role: Role) {
        self.update(|current| {
            let generation = current.generation.next();
            tracing::info!(
                "Permission store reset for role {} (generation {})",
                role,
                generation
            );
            Some(StoreSnapshot {
                generation,
                role: Some(role),
                ..StoreSnapshot::default()
            })
        });
    }

    /// Swap in the snapshot produced by `f`, if any. Returns whether a swap
    /// happened.
    fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&StoreSnapshot) -> Option<StoreSnapshot>,
    {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match f(&guard) {
            Some(next) => {
                let state = next.state.clone();
                *guard = Arc::new(next);
                self.state_tx.send_replace(state);
                true
            }
            None => false,
        }
    }
}

fn is_current(snapshot: &StoreSnapshot, generation: Generation) -> bool {
    snapshot.generation == generation && snapshot.state.is_loading()
}

fn ready(current: &StoreSnapshot, generation: Generation, permissions: PermissionSet) -> StoreSnapshot {
    StoreSnapshot {
        generation,
        state: LifecycleState::Ready,
        permissions,
        loaded_at: Some(Utc::now()),
        role: current.role.clone(),
    }
}

impl Default for PermissionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PermissionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("PermissionStore")
            .field("generation", &snapshot.generation)
            .field("state", &snapshot.state)
            .field("role", &snapshot.role)
            .field("modules", &snapshot.permissions.len())
            .finish()
    }
}

impl PermissionView for PermissionStore {
    fn state(&self) -> LifecycleState {
        self.snapshot().state.clone()
    }

    fn grant(&self, module: &str, action: &Action) -> bool {
        self.snapshot().grant(module, action)
    }
}
