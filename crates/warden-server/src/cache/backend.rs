//! Cache backend implementation with local (DashMap) and Redis variants.

use async_trait::async_trait;
use dashmap::DashMap;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::{Duration, Instant};
use warden_auth::storage::{CacheError, CacheResult, SessionCache};

/// A cached entry with TTL support.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub data: Arc<Vec<u8>>,
    pub cached_at: Instant,
    pub ttl: Duration,
}

impl CachedEntry {
    /// Create a new cached entry.
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data: Arc::new(data),
            cached_at: Instant::now(),
            ttl,
        }
    }

    /// Check if this entry has expired.
    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() >= self.ttl
    }

    /// The instant the entry stops being served.
    pub fn expires_at(&self) -> Instant {
        self.cached_at + self.ttl
    }
}

/// Cache backend.
///
/// ## Cache Modes
///
/// - **Local**: Single-instance mode using only DashMap
/// - **Redis**: Multi-instance mode, every read and write goes to Redis
#[derive(Clone)]
pub enum CacheBackend {
    /// Single-instance: local DashMap only
    Local {
        map: Arc<DashMap<String, CachedEntry>>,
        max_entries: usize,
    },

    /// Multi-instance: shared Redis
    Redis { redis: Pool },
}

impl std::fmt::Debug for CacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheBackend")
            .field("mode", &self.mode())
            .finish()
    }
}

impl CacheBackend {
    /// Create a new local-only cache backend.
    pub fn new_local(max_entries: usize) -> Self {
        CacheBackend::Local {
            map: Arc::new(DashMap::new()),
            max_entries,
        }
    }

    /// Create a new Redis-backed cache backend.
    pub fn new_redis(redis_pool: Pool) -> Self {
        CacheBackend::Redis { redis: redis_pool }
    }

    /// `"local"` or `"redis"`.
    pub fn mode(&self) -> &'static str {
        match self {
            CacheBackend::Local { .. } => "local",
            CacheBackend::Redis { .. } => "redis",
        }
    }

    /// The Redis pool, when running in Redis mode.
    pub fn redis_pool(&self) -> Option<&Pool> {
        match self {
            CacheBackend::Local { .. } => None,
            CacheBackend::Redis { redis } => Some(redis),
        }
    }

    fn local_get(map: &DashMap<String, CachedEntry>, key: &str) -> Option<Vec<u8>> {
        if let Some(entry) = map.get(key)
            && !entry.is_expired()
        {
            return Some(entry.data.as_ref().clone());
        }
        // Only drop the entry if it is still the expired one.
        map.remove_if(key, |_, entry| entry.is_expired());
        None
    }

    /// Inserts an entry, keeping the map at or below `max_entries`.
    ///
    /// When full, expired entries are purged first; if that frees nothing,
    /// the entries closest to expiry are evicted.
    fn local_set(
        map: &DashMap<String, CachedEntry>,
        max_entries: usize,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) {
        let capacity = max_entries.max(1);
        if !map.contains_key(key) && map.len() >= capacity {
            map.retain(|_, entry| !entry.is_expired());
            while map.len() >= capacity {
                let victim = map
                    .iter()
                    .min_by_key(|entry| entry.expires_at())
                    .map(|entry| entry.key().clone());
                let Some(victim) = victim else {
                    break;
                };
                map.remove(&victim);
                tracing::debug!(key = %victim, "evicted local cache entry");
            }
        }
        map.insert(key.to_string(), CachedEntry::new(value, ttl));
    }
}

#[async_trait]
impl SessionCache for CacheBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        match self {
            CacheBackend::Local { map, .. } => Ok(Self::local_get(map, key)),
            CacheBackend::Redis { redis } => {
                let mut conn = redis
                    .get()
                    .await
                    .map_err(|e| CacheError::Unavailable(e.to_string()))?;
                let value = conn
                    .get::<_, Option<Vec<u8>>>(key)
                    .await
                    .map_err(|e| CacheError::Command(e.to_string()))?;
                tracing::debug!(key = %key, hit = value.is_some(), "cache get (redis)");
                Ok(value)
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        match self {
            CacheBackend::Local { map, max_entries } => {
                Self::local_set(map, *max_entries, key, value, ttl);
                Ok(())
            }
            CacheBackend::Redis { redis } => {
                let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
                let mut conn = redis
                    .get()
                    .await
                    .map_err(|e| CacheError::Unavailable(e.to_string()))?;
                conn.pset_ex::<_, _, ()>(key, value, ttl_ms)
                    .await
                    .map_err(|e| CacheError::Command(e.to_string()))?;
                tracing::debug!(key = %key, ttl_ms, "cache set (redis)");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_len(cache: &CacheBackend) -> usize {
        match cache {
            CacheBackend::Local { map, .. } => map.len(),
            CacheBackend::Redis { .. } => 0,
        }
    }

    #[tokio::test]
    async fn test_local_get_set() {
        let cache = CacheBackend::new_local(100);
        assert_eq!(cache.get("k").await.unwrap(), None);

        cache
            .set("k", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(local_len(&cache), 1);
        assert_eq!(cache.mode(), "local");
    }

    #[tokio::test]
    async fn test_local_entry_expires() {
        let cache = CacheBackend::new_local(100);
        cache
            .set("k", b"v".to_vec(), Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.get("k").await.unwrap(), None);
        assert_eq!(local_len(&cache), 0);
    }

    #[tokio::test]
    async fn test_expired_read_keeps_refilled_entry() {
        let cache = CacheBackend::new_local(100);
        cache
            .set("k", b"old".to_vec(), Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let writer = {
            let cache = cache.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    cache
                        .set("k", b"new".to_vec(), Duration::from_secs(60))
                        .await
                        .unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };
        for _ in 0..200 {
            let _ = cache.get("k").await.unwrap();
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();

        assert_eq!(cache.get("k").await.unwrap(), Some(b"new".to_vec()));
    }

    #[tokio::test]
    async fn test_local_purges_expired_when_full() {
        let cache = CacheBackend::new_local(2);
        cache
            .set("old", b"1".to_vec(), Duration::from_millis(10))
            .await
            .unwrap();
        cache
            .set("live", b"2".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        cache
            .set("new", b"3".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(local_len(&cache), 2);
        assert!(cache.get("live").await.unwrap().is_some());
        assert!(cache.get("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_local_has_no_redis() {
        let cache = CacheBackend::new_local(10);
        assert!(cache.redis_pool().is_none());
    }

    #[tokio::test]
    async fn test_local_never_exceeds_max_entries() {
        let cache = CacheBackend::new_local(2);
        for i in 0..50 {
            cache
                .set(&format!("k{i}"), vec![1], Duration::from_secs(600))
                .await
                .unwrap();
            assert!(local_len(&cache) <= 2);
        }
        assert!(cache.get("k49").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_full_cache_evicts_soonest_expiry() {
        let cache = CacheBackend::new_local(2);
        cache
            .set("short", vec![1], Duration::from_secs(30))
            .await
            .unwrap();
        cache
            .set("long", vec![2], Duration::from_secs(600))
            .await
            .unwrap();
        cache
            .set("new", vec![3], Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(cache.get("short").await.unwrap(), None);
        assert!(cache.get("long").await.unwrap().is_some());
        assert!(cache.get("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_overwrite_when_full_keeps_other_entries() {
        let cache = CacheBackend::new_local(2);
        cache.set("a", vec![1], Duration::from_secs(60)).await.unwrap();
        cache.set("b", vec![2], Duration::from_secs(60)).await.unwrap();
        cache.set("a", vec![9], Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.get("a").await.unwrap(), Some(vec![9]));
        assert!(cache.get("b").await.unwrap().is_some());
    }
}
