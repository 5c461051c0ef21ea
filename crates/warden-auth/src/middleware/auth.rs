//! The authentication gate.
//!
//! Every protected request moves through the same steps:
//!
//! ```text
//! Start ─► TokenExtracted ─► ClaimsVerified ─► SessionResolved ─► ActivityPublished ─► Authenticated
//!   │            │                 │                  │
//!   └────────────┴─────────────────┴──────────────────┴──► Rejected(reason)
//! ```
//!
//! Activity publishing is detached and cannot reject a request.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, middleware, routing::get};
//! use warden_auth::middleware::{AuthState, authentication_middleware};
//!
//! let app = Router::new()
//!     .route("/protected", get(handler))
//!     .route_layer(middleware::from_fn_with_state(auth_state, authentication_middleware));
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{Extensions, HeaderMap, header::AUTHORIZATION};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::activity::{ActivityEvent, ActivityPublisher, UNKNOWN_ACTION};
use crate::config::AuthConfig;
use crate::deadline::Deadline;
use crate::error::AuthError;
use crate::session::SessionResolver;
use crate::token::TokenVerifier;

use super::types::{ClientInfo, IdentityContext, RouteAction};

// =============================================================================
// Auth State
// =============================================================================

/// Shared collaborators of the authentication gate.
///
/// Cloned per request; every field is a cheap handle.
#[derive(Debug, Clone)]
pub struct AuthState {
    /// Verifies bearer credentials.
    pub verifier: Arc<TokenVerifier>,

    /// Decides whether the credential's session is usable.
    pub resolver: Arc<SessionResolver>,

    /// Emits activity events.
    pub publisher: ActivityPublisher,

    /// Service name stamped on activity events.
    pub service_name: Arc<str>,

    /// Budget for all external calls made while authenticating one request.
    pub request_timeout: Duration,
}

impl AuthState {
    /// Creates the gate state from its collaborators and the auth config.
    #[must_use]
    pub fn new(
        verifier: Arc<TokenVerifier>,
        resolver: Arc<SessionResolver>,
        publisher: ActivityPublisher,
        config: &AuthConfig,
    ) -> Self {
        Self {
            verifier,
            resolver,
            publisher,
            service_name: Arc::from(config.activity.service_name.as_str()),
            request_timeout: config.request_timeout,
        }
    }

    /// Authenticates a request from its headers and extensions.
    ///
    /// On success an activity event has been scheduled and the caller's
    /// identity is returned.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingCredential`] without a bearer header
    /// - [`AuthError::InvalidCredential`] if verification fails
    /// - [`AuthError::SessionLookupFailed`] if the session source fails
    /// - [`AuthError::SessionExpired`] if the session is not usable
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
        extensions: &Extensions,
    ) -> Result<IdentityContext, AuthError> {
        let deadline = Deadline::after(self.request_timeout);

        let token = bearer_token(headers).ok_or(AuthError::MissingCredential)?;

        let claims = self.verifier.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "Credential verification failed");
            AuthError::invalid_credential(e.to_string())
        })?;

        let usable = self
            .resolver
            .resolve(deadline, &claims.session_id, &claims.user_id)
            .await?;
        if !usable {
            tracing::debug!(
                user_id = %claims.user_id,
                session_id = %claims.session_id,
                "Session is not usable"
            );
            return Err(AuthError::SessionExpired);
        }

        let action = extensions
            .get::<RouteAction>()
            .map_or(UNKNOWN_ACTION, RouteAction::as_str);
        let client = ClientInfo::from_request(headers, extensions);
        let event = ActivityEvent::new(
            claims.user_id.as_str(),
            claims.session_id.as_str(),
            &*self.service_name,
            action,
        )
        .with_client(client.ip_address, client.user_agent);
        self.publisher.publish_detached(event);

        tracing::debug!(
            user_id = %claims.user_id,
            session_id = %claims.session_id,
            role = %claims.role,
            action,
            "Request authenticated"
        );

        Ok(IdentityContext::from(claims))
    }
}

/// Returns the token of a `Bearer` authorization header, if any.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// =============================================================================
// Middleware
// =============================================================================

/// Middleware that authenticates the request and attaches its [`IdentityContext`].
///
/// Rejected requests never reach the inner service.
pub async fn authentication_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let outcome = state.authenticate(req.headers(), req.extensions()).await;
    match outcome {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(e) => {
            if e.is_server_error() {
                tracing::warn!(
                    error = %e,
                    category = %e.category(),
                    path = %req.uri().path(),
                    "Authentication failed"
                );
            } else {
                tracing::debug!(
                    error = %e,
                    category = %e.category(),
                    path = %req.uri().path(),
                    "Request rejected"
                );
            }
            e.into_response()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
