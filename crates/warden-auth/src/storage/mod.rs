//! Storage traits for the authentication pipeline.
//!
//! This module defines the interfaces for:
//!
//! - The authoritative session source
//! - The shared session cache
//! - The admin user directory
//!
//! # Implementations
//!
//! - `warden-auth-postgres` - PostgreSQL session source and user directory
//! - `warden-server` - Redis and in-process cache backends
//! - [`crate::session::RemoteSessionSource`] - HTTP identity service client

pub mod cache;
pub mod session;
pub mod user;

pub use cache::{CacheError, CacheResult, SessionCache};
pub use session::SessionSource;
pub use user::{
    GrowthStats, SortOrder, User, UserDirectory, UserPage, UserQuery, UserQueryError, UserSortField,
    UserStats, UserStatus, percentage_growth,
};
