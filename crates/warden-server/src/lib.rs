pub mod admin;
pub mod cache;
pub mod config;
pub mod events;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod server;

use std::sync::Arc;

pub use admin::AdminState;
pub use cache::{CacheBackend, CachedEntry, UserStatsCache};
pub use config::{
    AppConfig, CacheConfig, DatabaseConfig, RedisConfig, ServerConfig, SessionSourceConfig,
    SessionSourceKind,
};
pub use handlers::{HealthProbe, HealthState};
pub use observability::init_tracing;
pub use server::{AppState, ServerBuilder, WardenServer, build_app};

use warden_auth::{RemoteSessionSource, SessionSource};
use warden_auth_postgres::PostgresAuthStorage;

/// Create a cache backend based on configuration.
///
/// ## Cache Modes
///
/// - **Redis disabled**: Returns local-only cache (DashMap)
/// - **Redis enabled**: Attempts to connect to Redis, falls back to local on failure
///
/// ## Graceful Degradation
///
/// If Redis connection fails, the system automatically falls back to local-only mode.
/// This allows the server to start and run even if Redis is unavailable.
pub async fn create_cache_backend(config: &RedisConfig, cache: &CacheConfig) -> CacheBackend {
    use std::time::Duration;

    let local = || CacheBackend::new_local(cache.local_cache_max_entries);

    if !config.enabled {
        tracing::info!("Redis disabled, using local cache only");
        return local();
    }

    tracing::info!(url = %config.url, "Connecting to Redis");

    // Create Redis pool configuration
    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
    pool_config.timeouts.wait = Some(Duration::from_millis(config.timeout_ms));
    pool_config.timeouts.create = Some(Duration::from_millis(config.timeout_ms));
    pool_config.timeouts.recycle = Some(Duration::from_millis(config.timeout_ms));
    redis_config.pool = Some(pool_config);

    // Create pool
    let pool = match redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to create Redis pool. Falling back to local cache."
            );
            return local();
        }
    };

    // Test connection
    match pool.get().await {
        Ok(_) => {
            tracing::info!("Connected to Redis");
            CacheBackend::new_redis(pool)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to connect to Redis. Falling back to local cache."
            );
            local()
        }
    }
}

/// Create the authoritative session source selected by configuration.
///
/// # Errors
///
/// Returns an error if the remote variant is selected without a usable base
/// URL or its HTTP client cannot be built.
pub fn create_session_source(
    config: &SessionSourceConfig,
    storage: &PostgresAuthStorage,
) -> anyhow::Result<Arc<dyn SessionSource>> {
    match config.kind {
        SessionSourceKind::Postgres => Ok(Arc::new(storage.session_source())),
        SessionSourceKind::Remote => {
            let base_url = config
                .base_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("session_source.base_url is required"))?;
            let source = RemoteSessionSource::new(base_url, config.timeout)?;
            Ok(Arc::new(source))
        }
    }
}
