//! Authentication pipeline configuration.
//!
//! Covers the credential signing secret, the per-request deadline, the
//! session cache lifetime and where activity events are routed.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the authentication pipeline.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// jwt_secret = "change-me"
/// request_timeout = "10s"
/// admin_role = "admin"
///
/// [auth.session]
/// cache_ttl = "30m"
///
/// [auth.activity]
/// exchange = "warden.events"
/// routing_key = "user.activity"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Symmetric secret shared with the identity provider for HS256/384/512 tokens.
    pub jwt_secret: String,

    /// Upper bound for every external call made while authenticating a request.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Role required by the admin route group.
    pub admin_role: String,

    /// Session cache settings.
    pub session: SessionConfig,

    /// Activity event routing.
    pub activity: ActivityConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            request_timeout: Duration::from_secs(10),
            admin_role: "admin".to_string(),
            session: SessionConfig::default(),
            activity: ActivityConfig::default(),
        }
    }
}

/// Session cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum lifetime of a cached session entry.
    /// The effective TTL is further capped by the session's own expiry.
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(30 * 60),
        }
    }
}

/// Activity event publishing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// When disabled, events are dropped without touching the channel.
    pub enabled: bool,

    /// Exchange (topic namespace) events are published to.
    pub exchange: String,

    /// Routing key for user activity events.
    pub routing_key: String,

    /// Service name stamped on events emitted by the authentication gate.
    pub service_name: String,

    /// Bound on a single detached publish.
    #[serde(with = "humantime_serde")]
    pub publish_timeout: Duration,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            exchange: "warden.events".to_string(),
            routing_key: "user.activity".to_string(),
            service_name: "admin.middleware.auth".to_string(),
            publish_timeout: Duration::from_secs(5),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the signing secret is empty, and
    /// `ConfigError::InvalidValue` if:
    /// - the request timeout or cache TTL is zero
    /// - the admin role is empty
    /// - activity is enabled without an exchange or routing key
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::Missing("auth.jwt_secret".to_string()));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "auth.request_timeout must be greater than zero".to_string(),
            ));
        }

        if self.session.cache_ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "auth.session.cache_ttl must be greater than zero".to_string(),
            ));
        }

        if self.admin_role.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "auth.admin_role cannot be empty".to_string(),
            ));
        }

        if self.activity.enabled {
            if self.activity.exchange.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "auth.activity.exchange cannot be empty".to_string(),
                ));
            }
            if self.activity.routing_key.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "auth.activity.routing_key cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}
