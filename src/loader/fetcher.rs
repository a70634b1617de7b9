//! Permission fetch service
//!
//! The loader only needs "give me the permission set for this actor". The
//! transport is up to the implementation:
//! - `HttpPermissionFetcher` for the console's REST endpoint
//! - `fetcher_fn` for closures (tests, in-process backends)
//!
//! # Example
//!
//! ```ignore
//! use fleet_authz::loader::fetcher_fn;
//!
//! let fetcher = fetcher_fn(|actor| async move {
//!     let grants = backend.grants_for(&actor.actor_id).await?;
//!     Ok(grants)
//! });
//! ```

use std::future::Future;

use crate::core::{ActorContext, LoadError};
use crate::permissions::PermissionSet;

/// Source of permission sets
#[async_trait::async_trait]
pub trait PermissionFetcher: Send + Sync {
    /// Fetch the complete permission set for `actor`
    async fn fetch(&self, actor: &ActorContext) -> Result<PermissionSet, LoadError>;
}

/// Wrapper to implement PermissionFetcher for async closures
pub struct FnFetcher<F> {
    func: F,
}

#[async_trait::async_trait]
impl<F, Fut> PermissionFetcher for FnFetcher<F>
where
    F: Fn(ActorContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<PermissionSet, LoadError>> + Send + 'static,
{
    async fn fetch(&self, actor: &ActorContext) -> Result<PermissionSet, LoadError> {
        (self.func)(actor.clone()).await
    }
}

/// Create a fetcher from an async closure
pub fn fetcher_fn<F, Fut>(func: F) -> FnFetcher<F>
where
    F: Fn(ActorContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<PermissionSet, LoadError>> + Send + 'static,
{
    FnFetcher { func }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{Action, ModuleGrant, Role};

    #[tokio::test]
    async fn test_fn_fetcher_receives_actor() {
        let fetcher = fetcher_fn(|actor: ActorContext| async move {
            let grant = ModuleGrant::new().with("write", actor.role == Role::Manager);
            Ok(PermissionSet::new().with_module("bookings", grant))
        });

        let manager = ActorContext::new("m-1", Role::Manager);
        let set = fetcher.fetch(&manager).await.unwrap();
        assert!(set.allows("bookings", &Action::Write));

        let viewer = ActorContext::new("v-1", Role::Viewer);
        let set = fetcher.fetch(&viewer).await.unwrap();
        assert!(!set.allows("bookings", &Action::Write));
    }
}
