//! Core types for the authorization core
//!
//! This module provides the fundamental types used throughout the crate:
//! - `ActorContext` - Who permissions are loaded for
//! - `LifecycleState` - Lifecycle of the permission store
//! - `LoadError` / `AuthzError` - Error types

pub mod context;
pub mod error;
pub mod state;

pub use context::ActorContext;
pub use error::{AuthzError, AuthzResult, LoadError};
pub use state::LifecycleState;
