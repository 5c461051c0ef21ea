//! Request-scoped context types.
//!
//! The authentication gate inserts an [`IdentityContext`] into the request
//! extensions. The route naming layer inserts a [`RouteAction`] before the
//! gate runs. Both are plain values, so concurrent requests never share them.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{Extensions, HeaderMap, header::USER_AGENT, request::Parts};

use crate::error::AuthError;
use crate::token::AccessTokenClaims;

// =============================================================================
// Identity Context
// =============================================================================

/// The authenticated caller, as established by the authentication gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityContext {
    pub user_id: String,
    pub session_id: String,
    pub email: String,
    pub role: String,
}

impl IdentityContext {
    /// Returns `true` if the caller holds `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}

impl From<AccessTokenClaims> for IdentityContext {
    fn from(claims: AccessTokenClaims) -> Self {
        Self {
            user_id: claims.user_id,
            session_id: claims.session_id,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Extractor for the identity attached by the authentication gate.
///
/// Rejects with [`AuthError::AuthenticationRequired`] when the gate did not
/// run for this route.
///
/// # Example
///
/// ```ignore
/// async fn handler(Authenticated(identity): Authenticated) -> String {
///     format!("Hello, {}!", identity.email)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Authenticated(pub IdentityContext);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<IdentityContext>()
            .cloned()
            .map(Self)
            .ok_or(AuthError::AuthenticationRequired)
    }
}

// =============================================================================
// Route Action
// =============================================================================

/// Logical name of the operation a route performs, recorded on activity events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteAction(Arc<str>);

impl RouteAction {
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Client Info
// =============================================================================

/// Caller address and user agent, best effort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: String,
    pub user_agent: String,
}

impl ClientInfo {
    /// Reads the client address from `X-Forwarded-For`, `X-Real-IP` or the
    /// socket peer, in that order. Missing values are empty strings.
    #[must_use]
    pub fn from_request(headers: &HeaderMap, extensions: &Extensions) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let ip_address = header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .or_else(|| header("x-real-ip"))
            .map(ToString::to_string)
            .or_else(|| {
                extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_default();

        let user_agent = headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Self {
            ip_address,
            user_agent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_for_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8.0"));

        let info = ClientInfo::from_request(&headers, &Extensions::new());
        assert_eq!(info.ip_address, "203.0.113.9");
        assert_eq!(info.user_agent, "curl/8.0");
    }

    #[test]
    fn test_falls_back_to_peer_address() {
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 4], 5555))));

        let info = ClientInfo::from_request(&HeaderMap::new(), &extensions);
        assert_eq!(info.ip_address, "192.0.2.4");
        assert!(info.user_agent.is_empty());
    }

    #[test]
    fn test_no_address_available() {
        let info = ClientInfo::from_request(&HeaderMap::new(), &Extensions::new());
        assert_eq!(info, ClientInfo::default());
    }

    #[test]
    fn test_identity_from_claims() {
        let claims = AccessTokenClaims {
            user_id: "user42".to_string(),
            session_id: "sess7".to_string(),
            email: "ops@example.com".to_string(),
            role: "admin".to_string(),
            token_type: "access".to_string(),
            sub: None,
            exp: 0,
            iat: None,
        };
        let identity = IdentityContext::from(claims);
        assert!(identity.has_role("admin"));
        assert!(!identity.has_role("client"));
        assert_eq!(identity.session_id, "sess7");
    }
}
