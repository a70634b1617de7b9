//! Actor context
//!
//! Identity of the current actor as handed over by the authentication
//! subsystem. Read-only input to the authorization core.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::permissions::Role;

/// The authenticated actor a permission set is loaded for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    /// Stable identifier of the actor
    pub actor_id: String,

    /// Role assigned at authentication time
    pub role: Role,

    /// Bearer token forwarded to the permission service
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
}

impl ActorContext {
    /// Create a new actor context
    pub fn new(actor_id: impl Into<String>, role: Role) -> Self {
        Self {
            actor_id: actor_id.into(),
            role,
            access_token: None,
        }
    }

    /// Create an actor with a random id (useful for one-off checks and tests)
    pub fn anonymous(role: Role) -> Self {
        Self::new(Uuid::new_v4().to_string(), role)
    }

    /// Attach an access token
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Get the actor's role
    pub fn role(&self) -> &Role {
        &self.role
    }
}
