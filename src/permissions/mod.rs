//! Permission model and access decisions
//!
//! - **Role registry** (`role`): closed set of roles, `SUPER_ADMIN` bypasses everything
//! - **Data model** (`model`): `Module`, `Action`, `ModuleGrant`, `PermissionSet`
//! - **Store** (`store`): process-wide cache with an explicit lifecycle
//! - **Decision** (`decision`): `decide(role, store, module, action)`
//!
//! ## Example
//!
//! ```rust
//! use fleet_authz::permissions::{decide, Action, DenyReason, ModuleGrant, PermissionSet, PermissionStore, Role};
//!
//! let store = PermissionStore::new();
//!
//! // Nothing loaded yet: everyone but SUPER_ADMIN is denied.
//! assert!(decide(&Role::SuperAdmin, &store, "bookings", &Action::Write).allow);
//! assert_eq!(
//!     decide(&Role::Admin, &store, "bookings", &Action::Read).reason,
//!     Some(DenyReason::NotReady)
//! );
//!
//! store.replace(PermissionSet::new().with_module(
//!     "bookings",
//!     ModuleGrant::new().with("read", true).with("write", false),
//! ));
//! assert!(decide(&Role::Admin, &store, "bookings", &Action::Read).allow);
//! assert_eq!(
//!     decide(&Role::Admin, &store, "bookings", &Action::Write).reason,
//!     Some(DenyReason::Forbidden)
//! );
//! ```

mod decision;
mod model;
mod role;
mod store;

pub use decision::{decide, decide_read, Decision, DenyReason};
pub use model::{Action, Module, ModuleGrant, PermissionSet};
pub use role::{is_privileged, Role};
pub use store::{Generation, PermissionStore, PermissionView, StoreSnapshot};
