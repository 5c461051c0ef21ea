//! HTTP middleware for authentication and authorization.
//!
//! This module provides Axum middleware for:
//!
//! - Bearer credential verification and session resolution
//! - Identity context injection
//! - Role-gated authorization
//! - JSON error responses
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, middleware, routing::get};
//! use warden_auth::middleware::{
//!     AuthState, Authenticated, RequiredRole, authentication_middleware, require_role,
//! };
//!
//! async fn handler(Authenticated(identity): Authenticated) -> String {
//!     format!("Hello, {}!", identity.email)
//! }
//!
//! let app = Router::new()
//!     .route("/admin/users", get(handler))
//!     .route_layer(middleware::from_fn_with_state(RequiredRole::new("admin"), require_role))
//!     .route_layer(middleware::from_fn_with_state(auth_state, authentication_middleware));
//! ```

pub mod admin;
pub mod auth;
pub mod error;
pub mod types;

pub use admin::{RequiredRole, check_role, require_role};
pub use auth::{AuthState, authentication_middleware};
pub use types::{Authenticated, ClientInfo, IdentityContext, RouteAction};
