//! Activity events and best-effort publishing.
//!
//! Every authenticated request emits one [`ActivityEvent`]. Events are handed
//! to a [`MessageChannel`] by the [`ActivityPublisher`], usually from a
//! detached task so that audit delivery never delays or fails a request.
//!
//! ```text
//! AuthenticationGate ──► ActivityPublisher ──► MessageChannel ──► broker
//!                         (detached task)       (exchange, routing key)
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ActivityConfig;

/// Action recorded when a route carries no name.
pub const UNKNOWN_ACTION: &str = "unknown_action";

// ============================================================================
// Event
// ============================================================================

/// Audit record of an authenticated action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub user_id: String,
    pub session_id: String,
    pub service_name: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip_address: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_agent: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl ActivityEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        service_name: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            service_name: service_name.into(),
            action: action.into(),
            ip_address: String::new(),
            user_agent: String::new(),
            metadata: BTreeMap::new(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Sets the client address and user agent.
    #[must_use]
    pub fn with_client(mut self, ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        self.ip_address = ip_address.into();
        self.user_agent = user_agent.into();
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

// ============================================================================
// Channel
// ============================================================================

/// Errors produced while publishing activity.
#[derive(Debug, thiserror::Error)]
pub enum ActivityError {
    /// The event could not be encoded.
    #[error("Failed to serialize activity event: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The channel refused or failed the publish.
    #[error("Message channel error: {0}")]
    Channel(String),

    /// The publish did not finish within the publish timeout.
    #[error("Activity publish timed out after {0:?}")]
    Timeout(Duration),
}

impl ActivityError {
    /// Creates a new `Channel` error.
    #[must_use]
    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel(message.into())
    }
}

/// Transport that delivers encoded events to a broker.
///
/// Implementations route by `exchange` and `routing_key` the way the broker
/// understands them. No retry is expected.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Publishes one message.
    ///
    /// # Errors
    ///
    /// Returns [`ActivityError::Channel`] if the broker cannot accept it.
    async fn publish(&self, exchange: &str, routing_key: &str, body: Vec<u8>)
    -> Result<(), ActivityError>;
}

// ============================================================================
// Publisher
// ============================================================================

/// Serializes activity events and hands them to a [`MessageChannel`].
#[derive(Clone)]
pub struct ActivityPublisher {
    channel: Arc<dyn MessageChannel>,
    exchange: Arc<str>,
    routing_key: Arc<str>,
    enabled: bool,
    timeout: Duration,
}

impl fmt::Debug for ActivityPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityPublisher")
            .field("exchange", &self.exchange)
            .field("routing_key", &self.routing_key)
            .field("enabled", &self.enabled)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ActivityPublisher {
    /// Creates a publisher routing events as configured.
    #[must_use]
    pub fn new(channel: Arc<dyn MessageChannel>, config: &ActivityConfig) -> Self {
        Self {
            channel,
            exchange: Arc::from(config.exchange.as_str()),
            routing_key: Arc::from(config.routing_key.as_str()),
            enabled: config.enabled,
            timeout: config.publish_timeout,
        }
    }

    /// Builds and publishes an event for an authenticated action.
    ///
    /// # Errors
    ///
    /// Returns [`ActivityError`] if the event cannot be encoded or delivered.
    pub async fn publish(
        &self,
        user_id: &str,
        session_id: &str,
        service_name: &str,
        action: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<(), ActivityError> {
        let event = ActivityEvent::new(user_id, session_id, service_name, action)
            .with_client(ip_address, user_agent);
        self.publish_event(&event).await
    }

    /// Publishes a prepared event. Failures are logged and returned; there is no retry.
    ///
    /// # Errors
    ///
    /// Returns [`ActivityError`] if the event cannot be encoded or delivered.
    pub async fn publish_event(&self, event: &ActivityEvent) -> Result<(), ActivityError> {
        if !self.enabled {
            debug!(user_id = %event.user_id, action = %event.action, "Activity publishing disabled");
            return Ok(());
        }

        let result = self.send(event).await;
        match &result {
            Ok(()) => debug!(
                user_id = %event.user_id,
                session_id = %event.session_id,
                action = %event.action,
                "Published activity event"
            ),
            Err(e) => warn!(
                error = %e,
                user_id = %event.user_id,
                session_id = %event.session_id,
                action = %event.action,
                exchange = %self.exchange,
                routing_key = %self.routing_key,
                "Failed to publish activity event"
            ),
        }
        result
    }

    /// Publishes `event` on a detached task.
    ///
    /// The outcome is only logged. The returned handle may be dropped.
    pub fn publish_detached(&self, event: ActivityEvent) -> JoinHandle<()> {
        let publisher = self.clone();
        tokio::spawn(async move {
            let _ = publisher.publish_event(&event).await;
        })
    }

    async fn send(&self, event: &ActivityEvent) -> Result<(), ActivityError> {
        let body = serde_json::to_vec(event)?;
        tokio::time::timeout(
            self.timeout,
            self.channel.publish(&self.exchange, &self.routing_key, body),
        )
        .await
        .map_err(|_| ActivityError::Timeout(self.timeout))?
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingChannel {
        messages: Mutex<Vec<(String, String, Vec<u8>)>>,
    }

    #[async_trait]
    impl MessageChannel for RecordingChannel {
        async fn publish(
            &self,
            exchange: &str,
            routing_key: &str,
            body: Vec<u8>,
        ) -> Result<(), ActivityError> {
            self.messages
                .lock()
                .unwrap()
                .push((exchange.to_string(), routing_key.to_string(), body));
            Ok(())
        }
    }

    struct BrokenChannel;

    #[async_trait]
    impl MessageChannel for BrokenChannel {
        async fn publish(&self, _: &str, _: &str, _: Vec<u8>) -> Result<(), ActivityError> {
            Err(ActivityError::channel("connection reset"))
        }
    }

    struct StuckChannel;

    #[async_trait]
    impl MessageChannel for StuckChannel {
        async fn publish(&self, _: &str, _: &str, _: Vec<u8>) -> Result<(), ActivityError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_publish_routes_and_encodes() {
        let channel = Arc::new(RecordingChannel::default());
        let publisher = ActivityPublisher::new(channel.clone(), &ActivityConfig::default());

        publisher
            .publish(
                "user42",
                "sess7",
                "admin.middleware.auth",
                "getUsersList",
                "10.0.0.1",
                "curl/8.0",
            )
            .await
            .unwrap();

        let messages = channel.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        let (exchange, routing_key, body) = &messages[0];
        assert_eq!(exchange, "warden.events");
        assert_eq!(routing_key, "user.activity");

        let json: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(json["user_id"], "user42");
        assert_eq!(json["session_id"], "sess7");
        assert_eq!(json["action"], "getUsersList");
        assert_eq!(json["ip_address"], "10.0.0.1");
        assert!(json.get("metadata").is_none());
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_empty_client_fields_are_omitted() {
        let event = ActivityEvent::new("u", "s", "svc", UNKNOWN_ACTION);
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("ip_address").is_none());
        assert!(json.get("user_agent").is_none());
        assert_eq!(json["action"], "unknown_action");
    }

    #[tokio::test]
    async fn test_channel_failure_is_returned() {
        let publisher = ActivityPublisher::new(Arc::new(BrokenChannel), &ActivityConfig::default());
        let err = publisher
            .publish("u", "s", "svc", "a", "", "")
            .await
            .unwrap_err();
        assert!(matches!(err, ActivityError::Channel(_)));
    }

    #[tokio::test]
    async fn test_publish_times_out() {
        let config = ActivityConfig {
            publish_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let publisher = ActivityPublisher::new(Arc::new(StuckChannel), &config);
        let err = publisher
            .publish_event(&ActivityEvent::new("u", "s", "svc", "a"))
            .await
            .unwrap_err();
        assert!(matches!(err, ActivityError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_detached_failure_does_not_propagate() {
        let publisher = ActivityPublisher::new(Arc::new(BrokenChannel), &ActivityConfig::default());
        let handle = publisher.publish_detached(ActivityEvent::new("u", "s", "svc", "a"));
        assert!(handle.await.is_ok());
    }

    #[tokio::test]
    async fn test_disabled_publisher_skips_channel() {
        let channel = Arc::new(RecordingChannel::default());
        let config = ActivityConfig {
            enabled: false,
            ..Default::default()
        };
        let publisher = ActivityPublisher::new(channel.clone(), &config);
        publisher
            .publish_event(&ActivityEvent::new("u", "s", "svc", "a"))
            .await
            .unwrap();
        assert!(channel.messages.lock().unwrap().is_empty());
    }
}
