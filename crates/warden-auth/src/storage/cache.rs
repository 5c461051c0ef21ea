//! Session cache trait.
//!
//! A plain byte-oriented key/value store with per-entry TTL. It is never the
//! source of truth: any error is treated by callers as a miss.

use std::time::Duration;

use async_trait::async_trait;

/// Errors returned by cache backends.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backend could not be reached (pool exhausted, connection refused).
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected or failed a command.
    #[error("Cache command failed: {0}")]
    Command(String),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Shared key/value cache used to short-circuit authoritative session lookups.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Returns the bytes stored under `key`, or `None` if absent or expired.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Stores `value` under `key` for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()>;
}
