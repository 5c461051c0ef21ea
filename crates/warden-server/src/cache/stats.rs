//! Cached snapshot of the admin user statistics.
//!
//! Statistics are an aggregate over the whole user table, so the stats route
//! serves a snapshot for a short TTL. Failures are logged and treated as a
//! miss.

use std::sync::Arc;
use std::time::Duration;

use warden_auth::storage::{SessionCache, UserStats};

#[derive(Clone)]
pub struct UserStatsCache {
    cache: Arc<dyn SessionCache>,
    key: Arc<str>,
    ttl: Duration,
}

impl std::fmt::Debug for UserStatsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserStatsCache")
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl UserStatsCache {
    pub fn new(cache: Arc<dyn SessionCache>, key: impl AsRef<str>, ttl: Duration) -> Self {
        Self {
            cache,
            key: Arc::from(key.as_ref()),
            ttl,
        }
    }

    /// Returns the cached snapshot, if any.
    pub async fn get(&self) -> Option<UserStats> {
        let bytes = match self.cache.get(&self.key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Failed to read user stats from cache");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Cached user stats are undecodable");
                None
            }
        }
    }

    /// Stores a snapshot. Errors are logged.
    pub async fn save(&self, stats: &UserStats) {
        let body = match serde_json::to_vec(stats) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize user stats");
                return;
            }
        };
        if let Err(e) = self.cache.set(&self.key, body, self.ttl).await {
            tracing::warn!(key = %self.key, error = %e, "Failed to cache user stats");
        }
    }
}
