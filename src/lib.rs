//! Authorization core for the fleet console
//!
//! Decides, per navigation attempt or server-side action, whether the
//! current actor may view or act on a functional module.
//!
//! - `permissions` - roles, grant model, store, `decide`
//! - `loader` - fetches grants and populates the store
//! - `guard` - boundary guards and the route table
//! - `session` - per-actor wiring for the host application

pub mod core;
pub mod permissions;
pub mod loader;
pub mod guard;
pub mod session;

pub mod config;
pub mod logging;
