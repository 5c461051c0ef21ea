//! # warden-auth
//!
//! Request authentication and session validation for the Warden admin gateway.
//!
//! This crate provides:
//! - Bearer credential verification (HMAC-signed JWTs)
//! - Two-tier session resolution (shared cache, then the authoritative source)
//! - Best-effort activity event publishing
//! - Axum middleware for authentication and role-gated authorization
//!
//! ## Modules
//!
//! - [`config`] - Pipeline configuration
//! - [`token`] - Credential verification
//! - [`session`] - Session records, resolution and the remote session source
//! - [`storage`] - Traits for the session source, session cache and user directory
//! - [`activity`] - Activity events, message channels and the publisher
//! - [`middleware`] - Authentication gate, role gate and error responses
//! - [`deadline`] - Per-request deadline shared by external calls

pub mod activity;
pub mod config;
pub mod deadline;
pub mod error;
pub mod middleware;
pub mod session;
pub mod storage;
pub mod token;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use activity::{ActivityError, ActivityEvent, ActivityPublisher, MessageChannel};
pub use config::{ActivityConfig, AuthConfig, ConfigError, SessionConfig};
pub use deadline::Deadline;
pub use error::{AuthError, AuthResult, ErrorCategory};
pub use middleware::{
    AuthState, Authenticated, IdentityContext, RequiredRole, RouteAction,
    authentication_middleware, require_role,
};
pub use session::{RemoteSessionSource, SessionRecord, SessionResolver};
pub use storage::{CacheError, SessionCache, SessionSource, UserDirectory};
pub use token::{AccessTokenClaims, TokenError, TokenVerifier};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::activity::{ActivityEvent, ActivityPublisher, MessageChannel};
    pub use crate::config::AuthConfig;
    pub use crate::error::{AuthError, AuthResult};
    pub use crate::middleware::{AuthState, Authenticated, IdentityContext, RouteAction};
    pub use crate::session::{SessionRecord, SessionResolver};
    pub use crate::storage::{SessionCache, SessionSource, UserDirectory};
    pub use crate::token::{AccessTokenClaims, TokenVerifier};
}
