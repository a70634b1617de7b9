//! Permission store lifecycle

use serde::{Deserialize, Serialize};

/// Lifecycle of the permission store
///
/// `Uninitialized → Loading → Ready | Failed`. `Ready` and `Failed` stay put
/// until a reload moves the store back to `Loading`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Nothing has been loaded yet
    Uninitialized,

    /// A fetch is in flight
    Loading,

    /// Grants are confirmed and can be trusted
    Ready,

    /// The last load failed
    Failed {
        /// Why the load failed
        reason: String,
    },
}

impl LifecycleState {
    /// Create a failed state
    pub fn failed(reason: impl Into<String>) -> Self {
        LifecycleState::Failed {
            reason: reason.into(),
        }
    }

    /// Check if grants can be trusted
    pub fn is_ready(&self) -> bool {
        matches!(self, LifecycleState::Ready)
    }

    /// Check if a fetch is in flight
    pub fn is_loading(&self) -> bool {
        matches!(self, LifecycleState::Loading)
    }

    /// Check if the store is waiting for an explicit reload (Ready or Failed)
    pub fn is_settled(&self) -> bool {
        matches!(self, LifecycleState::Ready | LifecycleState::Failed { .. })
    }

    /// Check if a boundary mount should trigger a load
    pub fn needs_load(&self) -> bool {
        matches!(
            self,
            LifecycleState::Uninitialized | LifecycleState::Failed { .. }
        )
    }
}

impl Default for LifecycleState {
    fn default() -> Self {
        LifecycleState::Uninitialized
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Uninitialized => write!(f, "Uninitialized"),
            LifecycleState::Loading => write!(f, "Loading"),
            LifecycleState::Ready => write!(f, "Ready"),
            LifecycleState::Failed { reason } => write!(f, "Failed: {}", reason),
        }
    }
}
