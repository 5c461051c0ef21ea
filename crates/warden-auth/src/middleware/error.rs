//! Error response handling for the authentication middleware.
//!
//! Rejections are rendered as `{"error": "...", "message": "..."}` with the
//! `message` field present only when it adds detail. Infrastructure failures
//! never leak their cause to the client.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::AuthError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

// =============================================================================
// IntoResponse Implementation
// =============================================================================

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, bearer_error, error, message) = error_details(&self);

        let mut headers = HeaderMap::new();
        if status == StatusCode::UNAUTHORIZED {
            let www_auth = build_www_authenticate_header(bearer_error);
            if let Ok(value) = HeaderValue::from_str(&www_auth) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }

        (status, headers, Json(ErrorBody { error, message })).into_response()
    }
}

/// Extracts error details from an AuthError.
///
/// Returns (HTTP status, RFC 6750 error code, public error, optional detail).
fn error_details(error: &AuthError) -> (StatusCode, Option<&'static str>, String, Option<String>) {
    match error {
        AuthError::MissingCredential => (
            StatusCode::UNAUTHORIZED,
            None,
            "Authorization token is required".to_string(),
            None,
        ),
        AuthError::InvalidCredential { message } => (
            StatusCode::UNAUTHORIZED,
            Some("invalid_token"),
            "Invalid or expired token".to_string(),
            Some(message.clone()),
        ),
        AuthError::SessionExpired => (
            StatusCode::UNAUTHORIZED,
            Some("invalid_token"),
            "Session expired - please login again".to_string(),
            None,
        ),
        AuthError::SessionLookupFailed { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            None,
            "Session validation error".to_string(),
            None,
        ),
        AuthError::AuthenticationRequired => (
            StatusCode::UNAUTHORIZED,
            None,
            "Authentication required".to_string(),
            None,
        ),
        AuthError::Forbidden { message } => (
            StatusCode::FORBIDDEN,
            Some("insufficient_scope"),
            message.clone(),
            None,
        ),
        AuthError::Storage { .. } | AuthError::Configuration { .. } | AuthError::Internal { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            None,
            "Internal server error".to_string(),
            None,
        ),
    }
}

/// Builds the WWW-Authenticate header value for 401 responses.
///
/// Format: `Bearer realm="warden", error="invalid_token"`. The error code is
/// omitted when the request carried no credential.
fn build_www_authenticate_header(error: Option<&str>) -> String {
    match error {
        Some(error) => format!("Bearer realm=\"warden\", error=\"{error}\""),
        None => "Bearer realm=\"warden\"".to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_missing_credential_response() {
        let response = AuthError::MissingCredential.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let www_auth = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap();
        assert_eq!(www_auth, "Bearer realm=\"warden\"");

        assert_eq!(
            body_json(response).await,
            serde_json::json!({"error": "Authorization token is required"})
        );
    }

    #[tokio::test]
    async fn test_invalid_credential_carries_detail() {
        let response = AuthError::invalid_credential("Token expired").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(
            response
                .headers()
                .get(header::WWW_AUTHENTICATE)
                .unwrap()
                .to_str()
                .unwrap()
                .contains("error=\"invalid_token\"")
        );

        let json = body_json(response).await;
        assert_eq!(json["error"], "Invalid or expired token");
        assert_eq!(json["message"], "Token expired");
    }

    #[tokio::test]
    async fn test_session_expired_response() {
        let response = AuthError::SessionExpired.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await["error"],
            "Session expired - please login again"
        );
    }

    #[tokio::test]
    async fn test_lookup_failure_hides_cause() {
        let response = AuthError::session_lookup_failed("pg: connection refused").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!response.headers().contains_key(header::WWW_AUTHENTICATE));

        let json = body_json(response).await;
        assert_eq!(json, serde_json::json!({"error": "Session validation error"}));
    }

    #[tokio::test]
    async fn test_forbidden_response() {
        let response =
            AuthError::forbidden("Access forbidden - admin privileges required").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(!response.headers().contains_key(header::WWW_AUTHENTICATE));
        assert_eq!(
            body_json(response).await["error"],
            "Access forbidden - admin privileges required"
        );
    }

    #[tokio::test]
    async fn test_server_error_response() {
        let response = AuthError::internal("boom").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "Internal server error");
    }
}
