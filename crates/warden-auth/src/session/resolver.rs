//! Two-tier session resolution.
//!
//! The resolver answers "is this session usable right now?" by reading the
//! shared cache first and falling back to the authoritative source. Cache
//! failures degrade to a miss; authoritative failures fail the request.
//!
//! Cache hits are trusted without re-checking the session, so a revoked
//! session stays usable until its cache entry expires. The entry TTL never
//! exceeds the configured cache lifetime or the session's own expiry.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::deadline::Deadline;
use crate::error::{AuthError, AuthResult};
use crate::session::record::{SessionRecord, session_cache_key};
use crate::storage::{SessionCache, SessionSource};

/// Bound for detached cache and activity updates.
const BACKGROUND_TIMEOUT: Duration = Duration::from_secs(10);

/// Computes the TTL for caching `record` at `now`.
///
/// Returns `None` when the session has no lifetime left.
#[must_use]
pub fn cache_ttl_for(record: &SessionRecord, configured: Duration, now: OffsetDateTime) -> Option<Duration> {
    let remaining = record.expires_at - now;
    if !remaining.is_positive() {
        return None;
    }
    let remaining = Duration::try_from(remaining).ok()?;
    Some(remaining.min(configured))
}

/// Resolves sessions through the cache and the authoritative source.
#[derive(Clone)]
pub struct SessionResolver {
    cache: Arc<dyn SessionCache>,
    source: Arc<dyn SessionSource>,
    cache_ttl: Duration,
}

impl fmt::Debug for SessionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionResolver")
            .field("source", &self.source.kind())
            .field("cache_ttl", &self.cache_ttl)
            .finish_non_exhaustive()
    }
}

impl SessionResolver {
    /// Creates a resolver caching entries for at most `cache_ttl`.
    #[must_use]
    pub fn new(
        cache: Arc<dyn SessionCache>,
        source: Arc<dyn SessionSource>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            cache,
            source,
            cache_ttl,
        }
    }

    /// Returns `true` if the session exists and is usable.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SessionLookupFailed`] if the authoritative source
    /// fails or does not answer before `deadline`.
    pub async fn resolve(&self, deadline: Deadline, session_id: &str, user_id: &str) -> AuthResult<bool> {
        let key = session_cache_key(user_id, session_id);

        if let Some(record) = self.lookup_cached(deadline, &key).await {
            debug!(session_id, user_id, "Session resolved from cache");
            self.refresh_detached(key, record);
            return Ok(true);
        }

        let found = deadline
            .run(self.source.find_by_id(session_id))
            .await
            .map_err(|_| {
                warn!(session_id, source = self.source.kind(), "Session lookup exceeded request deadline");
                AuthError::session_lookup_failed("session lookup exceeded request deadline")
            })?
            .map_err(|e| {
                warn!(error = %e, session_id, source = self.source.kind(), "Session lookup failed");
                AuthError::session_lookup_failed(e.to_string())
            })?;

        let Some(record) = found else {
            debug!(session_id, user_id, "Session not found");
            return Ok(false);
        };

        let now = OffsetDateTime::now_utc();
        if let Some(reason) = record.rejection_at(now) {
            debug!(session_id, user_id, reason = reason.as_str(), "Session not usable");
            return Ok(false);
        }

        self.store(deadline, &key, &record, now).await;
        self.touch_source_detached(record.session_id.clone(), now);
        Ok(true)
    }

    async fn lookup_cached(&self, deadline: Deadline, key: &str) -> Option<SessionRecord> {
        let bytes = match deadline.run(self.cache.get(key)).await {
            Ok(Ok(Some(bytes))) => bytes,
            Ok(Ok(None)) => return None,
            Ok(Err(e)) => {
                warn!(error = %e, key, "Session cache read failed, falling back to source");
                return None;
            }
            Err(_) => {
                warn!(key, "Session cache read exceeded request deadline, falling back to source");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, key, "Discarding undecodable session cache entry");
                None
            }
        }
    }

    async fn store(&self, deadline: Deadline, key: &str, record: &SessionRecord, now: OffsetDateTime) {
        let Some(ttl) = cache_ttl_for(record, self.cache_ttl, now) else {
            return;
        };
        let body = match serde_json::to_vec(record) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, key, "Failed to encode session for cache");
                return;
            }
        };
        match deadline.run(self.cache.set(key, body, ttl)).await {
            Ok(Ok(())) => debug!(key, ttl_secs = ttl.as_secs(), "Session cached"),
            Ok(Err(e)) => warn!(error = %e, key, "Failed to cache session"),
            Err(_) => warn!(key, "Session cache write exceeded request deadline"),
        }
    }

    /// Re-writes a cache hit with a fresh activity time and TTL, then tells the source.
    fn refresh_detached(&self, key: String, mut record: SessionRecord) {
        let resolver = self.clone();
        tokio::spawn(async move {
            let now = OffsetDateTime::now_utc();
            record.last_active_at = now;
            let deadline = Deadline::after(BACKGROUND_TIMEOUT);
            resolver.store(deadline, &key, &record, now).await;
            resolver.update_source_activity(&record.session_id, now).await;
        });
    }

    fn touch_source_detached(&self, session_id: String, at: OffsetDateTime) {
        let resolver = self.clone();
        tokio::spawn(async move {
            resolver.update_source_activity(&session_id, at).await;
        });
    }

    async fn update_source_activity(&self, session_id: &str, at: OffsetDateTime) {
        let result = tokio::time::timeout(
            BACKGROUND_TIMEOUT,
            self.source.update_activity(session_id, at),
        )
        .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, session_id, "Failed to update session activity"),
            Err(_) => warn!(session_id, "Session activity update timed out"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryCache, InMemorySessionSource, session};

    const TTL: Duration = Duration::from_secs(300);

    fn resolver(cache: &Arc<InMemoryCache>, source: &Arc<InMemorySessionSource>) -> SessionResolver {
        SessionResolver::new(cache.clone(), source.clone(), TTL)
    }

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_cache_hit_skips_source() {
        let cache = Arc::new(InMemoryCache::default());
        let source = Arc::new(InMemorySessionSource::default());
        let now = OffsetDateTime::now_utc();
        cache.insert("session:user42:sess7", &session("sess7", "user42", now));

        let ok = resolver(&cache, &source)
            .resolve(deadline(), "sess7", "user42")
            .await
            .unwrap();

        assert!(ok);
        assert_eq!(source.find_calls(), 0);
    }

    #[tokio::test]
    async fn test_single_source_call_within_ttl() {
        let cache = Arc::new(InMemoryCache::default());
        let source = Arc::new(InMemorySessionSource::default());
        source.insert(session("sess7", "user42", OffsetDateTime::now_utc()));
        let resolver = resolver(&cache, &source);

        for _ in 0..5 {
            assert!(resolver.resolve(deadline(), "sess7", "user42").await.unwrap());
        }

        assert_eq!(source.find_calls(), 1);
        assert!(cache.contains("session:user42:sess7"));
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let cache = Arc::new(InMemoryCache::default());
        let source = Arc::new(InMemorySessionSource::default());
        let original = session("sess7", "user42", OffsetDateTime::now_utc());
        source.insert(original.clone());
        let resolver = resolver(&cache, &source);

        assert!(resolver.resolve(deadline(), "sess7", "user42").await.unwrap());
        assert!(resolver.resolve(deadline(), "sess7", "user42").await.unwrap());

        let stored = source.get("sess7").unwrap();
        assert_eq!(stored.is_active, original.is_active);
        assert_eq!(stored.expires_at, original.expires_at);
        assert_eq!(stored.logout_at, original.logout_at);
    }

    #[tokio::test]
    async fn test_logged_out_session_rejected() {
        let cache = Arc::new(InMemoryCache::default());
        let source = Arc::new(InMemorySessionSource::default());
        let now = OffsetDateTime::now_utc();
        let mut record = session("sess7", "user42", now);
        record.logout_at = Some(now - time::Duration::minutes(1));
        source.insert(record);

        let ok = resolver(&cache, &source)
            .resolve(deadline(), "sess7", "user42")
            .await
            .unwrap();

        assert!(!ok);
        assert!(!cache.contains("session:user42:sess7"));
    }

    #[tokio::test]
    async fn test_session_expiring_now_rejected() {
        let cache = Arc::new(InMemoryCache::default());
        let source = Arc::new(InMemorySessionSource::default());
        let mut record = session("sess7", "user42", OffsetDateTime::now_utc());
        record.expires_at = OffsetDateTime::now_utc();
        source.insert(record);

        assert!(
            !resolver(&cache, &source)
                .resolve(deadline(), "sess7", "user42")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_unknown_session_rejected() {
        let cache = Arc::new(InMemoryCache::default());
        let source = Arc::new(InMemorySessionSource::default());

        assert!(
            !resolver(&cache, &source)
                .resolve(deadline(), "missing", "user42")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_source_error_fails_lookup() {
        let cache = Arc::new(InMemoryCache::default());
        let source = Arc::new(InMemorySessionSource::default());
        source.fail_with("connection refused");

        let err = resolver(&cache, &source)
            .resolve(deadline(), "sess7", "user42")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::SessionLookupFailed { .. }));
    }

    #[tokio::test]
    async fn test_source_past_deadline_fails_lookup() {
        let cache = Arc::new(InMemoryCache::default());
        let source = Arc::new(InMemorySessionSource::default());
        source.insert(session("sess7", "user42", OffsetDateTime::now_utc()));
        source.delay_by(Duration::from_secs(5));

        let err = resolver(&cache, &source)
            .resolve(Deadline::after(Duration::from_millis(50)), "sess7", "user42")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::SessionLookupFailed { .. }));
    }

    #[tokio::test]
    async fn test_cache_failure_falls_back_to_source() {
        let cache = Arc::new(InMemoryCache::default());
        cache.set_failing(true);
        let source = Arc::new(InMemorySessionSource::default());
        source.insert(session("sess7", "user42", OffsetDateTime::now_utc()));

        assert!(
            resolver(&cache, &source)
                .resolve(deadline(), "sess7", "user42")
                .await
                .unwrap()
        );
        assert_eq!(source.find_calls(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let cache = Arc::new(InMemoryCache::default());
        cache.insert_raw("session:user42:sess7", b"not json".to_vec());
        let source = Arc::new(InMemorySessionSource::default());

        assert!(
            !resolver(&cache, &source)
                .resolve(deadline(), "sess7", "user42")
                .await
                .unwrap()
        );
        assert_eq!(source.find_calls(), 1);
    }

    #[tokio::test]
    async fn test_activity_reported_to_source() {
        let cache = Arc::new(InMemoryCache::default());
        let source = Arc::new(InMemorySessionSource::default());
        source.insert(session("sess7", "user42", OffsetDateTime::now_utc()));

        resolver(&cache, &source)
            .resolve(deadline(), "sess7", "user42")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(source.activity_calls(), 1);
    }

    async fn wait_for_activity(source: &InMemorySessionSource) -> usize {
        for _ in 0..50 {
            if source.activity_calls() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        source.activity_calls()
    }

    #[tokio::test]
    async fn test_cache_hit_refreshes_entry_and_reports_activity() {
        let cache = Arc::new(InMemoryCache::default());
        let source = Arc::new(InMemorySessionSource::default());
        let stale = OffsetDateTime::now_utc() - time::Duration::minutes(10);
        let mut record = session("sess7", "user42", OffsetDateTime::now_utc());
        record.last_active_at = stale;
        cache.insert("session:user42:sess7", &record);
        assert_eq!(cache.ttl_of("session:user42:sess7"), Some(Duration::from_secs(60)));

        assert!(
            resolver(&cache, &source)
                .resolve(deadline(), "sess7", "user42")
                .await
                .unwrap()
        );

        assert_eq!(wait_for_activity(&source).await, 1);
        assert_eq!(source.find_calls(), 0);
        assert_eq!(cache.ttl_of("session:user42:sess7"), Some(TTL));

        let body = cache.get("session:user42:sess7").await.unwrap().unwrap();
        let refreshed: SessionRecord = serde_json::from_slice(&body).unwrap();
        assert!(refreshed.last_active_at > stale);
    }

    #[tokio::test]
    async fn test_miss_writes_configured_ttl() {
        let cache = Arc::new(InMemoryCache::default());
        let source = Arc::new(InMemorySessionSource::default());
        source.insert(session("sess7", "user42", OffsetDateTime::now_utc()));

        assert!(
            resolver(&cache, &source)
                .resolve(deadline(), "sess7", "user42")
                .await
                .unwrap()
        );

        assert_eq!(cache.ttl_of("session:user42:sess7"), Some(TTL));
        assert_eq!(wait_for_activity(&source).await, 1);
    }

    #[tokio::test]
    async fn test_miss_ttl_never_outlives_session() {
        let cache = Arc::new(InMemoryCache::default());
        let source = Arc::new(InMemorySessionSource::default());
        let mut record = session("sess7", "user42", OffsetDateTime::now_utc());
        record.expires_at = OffsetDateTime::now_utc() + time::Duration::seconds(90);
        source.insert(record);

        assert!(
            resolver(&cache, &source)
                .resolve(deadline(), "sess7", "user42")
                .await
                .unwrap()
        );

        let ttl = cache.ttl_of("session:user42:sess7").unwrap();
        assert!(ttl <= Duration::from_secs(90));
        assert!(ttl > Duration::from_secs(80));
    }

    #[test]
    fn test_cache_ttl_capped_by_expiry() {
        let now = OffsetDateTime::now_utc();
        let mut record = session("s", "u", now);

        record.expires_at = now + time::Duration::seconds(60);
        assert_eq!(cache_ttl_for(&record, TTL, now), Some(Duration::from_secs(60)));

        record.expires_at = now + time::Duration::hours(2);
        assert_eq!(cache_ttl_for(&record, TTL, now), Some(TTL));

        record.expires_at = now;
        assert_eq!(cache_ttl_for(&record, TTL, now), None);
    }
}
