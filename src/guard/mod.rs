//! Boundary guards
//!
//! The consumer-facing side of the authorization core: guards mounted at
//! protected entry points, and the route table that maps paths to them.
//!
//! # Example
//!
//! ```ignore
//! use fleet_authz::guard::{BoundaryGuard, GuardOutcome};
//!
//! let guard = BoundaryGuard::new("bookings", "write", "/bookings");
//! match guard.check(&role, store.snapshot().as_ref()) {
//!     GuardOutcome::Proceed => render_form(),
//!     GuardOutcome::Redirect { target, reason } => navigate(&target, reason),
//! }
//! ```

mod boundary;
mod routes;

pub use boundary::{check_nested, BoundaryGuard, GuardOutcome, Navigator};
pub use routes::{RouteMatcher, RouteTable};
