//! Role-gated authorization.
//!
//! Runs after the authentication gate and admits only callers whose identity
//! carries the required role.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, middleware, routing::get};
//! use warden_auth::middleware::{RequiredRole, require_role};
//!
//! let admin = Router::new()
//!     .route("/users", get(list_users))
//!     .route_layer(middleware::from_fn_with_state(RequiredRole::new("admin"), require_role));
//! ```

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::AuthError;

use super::types::IdentityContext;

/// The role a route group requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredRole(Arc<str>);

impl RequiredRole {
    #[must_use]
    pub fn new(role: impl AsRef<str>) -> Self {
        Self(Arc::from(role.as_ref()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Checks `identity` against `required`.
///
/// # Errors
///
/// Returns [`AuthError::AuthenticationRequired`] without an identity and
/// [`AuthError::Forbidden`] when the role does not match.
pub fn check_role(identity: Option<&IdentityContext>, required: &str) -> Result<(), AuthError> {
    let identity = identity.ok_or_else(|| {
        tracing::debug!(required_role = required, "Access denied: no authenticated identity");
        AuthError::AuthenticationRequired
    })?;

    if !identity.has_role(required) {
        tracing::debug!(
            user_id = %identity.user_id,
            role = %identity.role,
            required_role = required,
            "Access denied: missing role"
        );
        return Err(AuthError::forbidden(format!(
            "Access forbidden - {required} privileges required"
        )));
    }

    tracing::debug!(user_id = %identity.user_id, required_role = required, "Access granted");
    Ok(())
}

/// Middleware admitting only identities holding the [`RequiredRole`].
pub async fn require_role(State(required): State<RequiredRole>, req: Request, next: Next) -> Response {
    match check_role(req.extensions().get::<IdentityContext>(), required.as_str()) {
        Ok(()) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(role: &str) -> IdentityContext {
        IdentityContext {
            user_id: "user42".to_string(),
            session_id: "sess7".to_string(),
            email: "ops@example.com".to_string(),
            role: role.to_string(),
        }
    }

    #[test]
    fn test_matching_role_admitted() {
        assert!(check_role(Some(&identity("admin")), "admin").is_ok());
    }

    #[test]
    fn test_other_role_forbidden() {
        let err = check_role(Some(&identity("client")), "admin").unwrap_err();
        assert!(err.is_authorization_error());
        assert_eq!(
            err.to_string(),
            "Forbidden: Access forbidden - admin privileges required"
        );
    }

    #[test]
    fn test_missing_identity_requires_authentication() {
        assert!(matches!(
            check_role(None, "admin"),
            Err(AuthError::AuthenticationRequired)
        ));
    }

    #[test]
    fn test_role_comparison_is_exact() {
        assert!(check_role(Some(&identity("Admin")), "admin").is_err());
        assert_eq!(RequiredRole::new("admin").as_str(), "admin");
    }
}
