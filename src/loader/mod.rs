//! Permission loading
//!
//! - `PermissionFetcher` - where permission sets come from
//! - `HttpPermissionFetcher` - REST implementation
//! - `PermissionLoader` - coalescing, generation-checked writer of the store

mod fetcher;
mod http;
mod loader;

pub use fetcher::{fetcher_fn, FnFetcher, PermissionFetcher};
pub use http::{classify_status, HttpPermissionFetcher, ACTOR_ID_HEADER, ACTOR_ROLE_HEADER};
pub use loader::{LoadOutcome, PermissionLoader};
