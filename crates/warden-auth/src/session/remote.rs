//! Identity service client used as the authoritative session source.
//!
//! Sessions are read with `GET {base_url}/session/{id}`. The service learns
//! about activity from the published activity events, so
//! [`update_activity`](SessionSource::update_activity) is not sent over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::error::{AuthError, AuthResult};
use crate::session::SessionRecord;
use crate::storage::SessionSource;

#[derive(Debug, Deserialize)]
struct SessionEnvelope {
    session: Option<SessionRecord>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

/// HTTP client for the identity service's session endpoint.
#[derive(Debug, Clone)]
pub struct RemoteSessionSource {
    http_client: reqwest::Client,
    base_url: Url,
}

impl RemoteSessionSource {
    /// Creates a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if `base_url` is not an absolute
    /// http(s) URL or the HTTP client cannot be built.
    pub fn new(base_url: impl AsRef<str>, request_timeout: Duration) -> AuthResult<Self> {
        let base_url = Url::parse(base_url.as_ref())
            .map_err(|e| AuthError::configuration(format!("session service URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AuthError::configuration(format!(
                "session service URL cannot carry a path: {base_url}"
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AuthError::configuration(format!("session service client: {e}")))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// `{base_url}/session/{session_id}` with the id percent-encoded as one segment.
    fn session_url(&self, session_id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("session").push(session_id);
        }
        url
    }
}

#[async_trait]
impl SessionSource for RemoteSessionSource {
    async fn find_by_id(&self, session_id: &str) -> AuthResult<Option<SessionRecord>> {
        let response = self
            .http_client
            .get(self.session_url(session_id))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, session_id, "Failed to call session service");
                AuthError::session_lookup_failed(format!("session service unreachable: {e}"))
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            StatusCode::OK => {}
            status => {
                return Err(AuthError::session_lookup_failed(format!(
                    "session service returned status {}",
                    status.as_u16()
                )));
            }
        }

        let envelope: SessionEnvelope = response.json().await.map_err(|e| {
            tracing::warn!(error = %e, session_id, "Failed to decode session service response");
            AuthError::session_lookup_failed(format!("invalid session service response: {e}"))
        })?;

        tracing::debug!(
            session_id,
            status = %envelope.status,
            message = %envelope.message,
            found = envelope.session.is_some(),
            "Session service answered"
        );

        Ok(envelope.session)
    }

    async fn update_activity(&self, session_id: &str, _at: OffsetDateTime) -> AuthResult<()> {
        tracing::trace!(session_id, "Session activity is delivered through activity events");
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer) -> RemoteSessionSource {
        RemoteSessionSource::new(server.uri(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_find_existing_session() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "session": {
                "session_id": "sess7",
                "user_id": "user42",
                "is_active": true,
                "expires_at": "2099-01-01T00:00:00Z",
                "created_at": "2024-01-01T00:00:00Z",
                "last_active_at": "2024-01-01T00:00:00Z"
            },
            "status": "success",
            "message": "Session found"
        });
        Mock::given(method("GET"))
            .and(path("/session/sess7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let record = source(&server).find_by_id("sess7").await.unwrap().unwrap();
        assert_eq!(record.user_id, "user42");
        assert!(record.is_usable_at(OffsetDateTime::now_utc()));
    }

    #[tokio::test]
    async fn test_not_found_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/session/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(source(&server).find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_server_error_fails_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = source(&server).find_by_id("sess7").await.unwrap_err();
        assert!(matches!(err, AuthError::SessionLookupFailed { .. }));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_garbage_body_fails_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        assert!(source(&server).find_by_id("sess7").await.is_err());
    }

    #[tokio::test]
    async fn test_trailing_slash_in_base_url() {
        let source = RemoteSessionSource::new("http://auth.local/", Duration::from_secs(1)).unwrap();
        assert_eq!(source.session_url("abc").as_str(), "http://auth.local/session/abc");
        assert_eq!(source.kind(), "remote");
    }

    #[test]
    fn test_session_id_is_one_encoded_segment() {
        let source = RemoteSessionSource::new("http://auth.local/api", Duration::from_secs(1)).unwrap();
        assert_eq!(
            source.session_url("../admin?x=1 y").as_str(),
            "http://auth.local/api/session/..%2Fadmin%3Fx=1%20y"
        );
    }

    #[test]
    fn test_relative_base_url_is_rejected() {
        let err = RemoteSessionSource::new("auth.local", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
    }
}
