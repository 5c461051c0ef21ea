//! Caching for the admin gateway.
//!
//! ## Backends
//!
//! - **Local (DashMap)**: In-memory, per-instance. Used when Redis is disabled
//!   or unreachable at startup.
//! - **Redis**: Shared across instances, so a session cached by one instance
//!   short-circuits lookups on all of them.
//!
//! Both implement [`warden_auth::SessionCache`]. The user statistics snapshot
//! is stored through the same byte-oriented interface.

pub mod backend;
pub mod stats;

pub use backend::{CacheBackend, CachedEntry};
pub use stats::UserStatsCache;
