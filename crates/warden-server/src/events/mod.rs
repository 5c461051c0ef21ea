//! Activity event channels.
//!
//! The pipeline publishes activity events through
//! [`warden_auth::MessageChannel`]. With Redis enabled, events go out over
//! Redis pub/sub on the channel `{exchange}.{routing_key}`; consumers such as
//! the identity service subscribe there. Without Redis, events are written to
//! the log so the trail is not silently dropped.
//!
//! ```text
//! AuthenticationGate ──► ActivityPublisher ──► RedisMessageChannel ──► Redis
//!                                                    (PUBLISH warden.events.user.activity)
//! ```

use async_trait::async_trait;
use deadpool_redis::{Pool, redis::AsyncCommands};
use tracing::{debug, info};
use warden_auth::{ActivityError, MessageChannel};

/// Redis channel name for an exchange and routing key.
pub fn channel_name(exchange: &str, routing_key: &str) -> String {
    format!("{exchange}.{routing_key}")
}

/// Publishes activity events to Redis pub/sub.
///
/// Pooled connections are multiplexed safely across concurrent publishers.
///
/// # Example
///
/// ```ignore
/// let channel = RedisMessageChannel::new(redis_pool.clone());
/// let publisher = ActivityPublisher::new(Arc::new(channel), &config.auth.activity);
/// ```
#[derive(Clone)]
pub struct RedisMessageChannel {
    pool: Pool,
}

impl RedisMessageChannel {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageChannel for RedisMessageChannel {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: Vec<u8>,
    ) -> Result<(), ActivityError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| ActivityError::channel(format!("Redis pool error: {e}")))?;

        let channel = channel_name(exchange, routing_key);
        let receivers: i64 = conn
            .publish(&channel, body)
            .await
            .map_err(|e| ActivityError::channel(format!("Redis publish error: {e}")))?;

        debug!(channel = %channel, receivers, "Published activity event to Redis");
        Ok(())
    }
}

/// Writes activity events to the log instead of a broker.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMessageChannel;

#[async_trait]
impl MessageChannel for LogMessageChannel {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: Vec<u8>,
    ) -> Result<(), ActivityError> {
        info!(
            channel = %channel_name(exchange, routing_key),
            event = %String::from_utf8_lossy(&body),
            "activity"
        );
        Ok(())
    }
}
