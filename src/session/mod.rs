//! Session-level wiring
//!
//! `AuthzSession` bundles the store, loader and route table for one actor.

mod session;

pub use session::AuthzSession;
