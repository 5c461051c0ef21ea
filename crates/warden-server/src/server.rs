use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::FromRef,
    http::{Method, header},
    middleware,
    routing::{MethodRouter, get, patch},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use warden_auth::{
    ActivityPublisher, AuthState, MessageChannel, RequiredRole, SessionCache, SessionResolver,
    SessionSource, TokenVerifier, authentication_middleware, require_role,
};
use warden_auth_postgres::PostgresAuthStorage;

use crate::{
    admin::{self, AdminState},
    cache::UserStatsCache,
    config::{AppConfig, ServerConfig},
    create_cache_backend, create_session_source,
    events::{LogMessageChannel, RedisMessageChannel},
    handlers::{self, HealthProbe, HealthState},
    middleware as app_middleware,
};

// =============================================================================
// Application State
// =============================================================================

/// Everything the router needs.
#[derive(Clone, Debug)]
pub struct AppState {
    pub auth: AuthState,
    pub required_role: RequiredRole,
    pub admin: AdminState,
    pub health: HealthState,
}

impl FromRef<AppState> for AdminState {
    fn from_ref(state: &AppState) -> Self {
        state.admin.clone()
    }
}

impl FromRef<AppState> for HealthState {
    fn from_ref(state: &AppState) -> Self {
        state.health.clone()
    }
}

/// Wraps a route with the auth pipeline.
///
/// Layers run outermost first: route name, authentication, role check.
fn protected(route: MethodRouter<AppState>, action: &str, state: &AppState) -> MethodRouter<AppState> {
    route
        .layer::<_, Infallible>(middleware::from_fn_with_state(
            state.required_role.clone(),
            require_role,
        ))
        .layer::<_, Infallible>(middleware::from_fn_with_state(
            state.auth.clone(),
            authentication_middleware,
        ))
        .layer::<_, Infallible>(app_middleware::route_name(action))
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

pub fn build_app(state: AppState, server: &ServerConfig) -> Router {
    let admin_routes = Router::new()
        .route(
            "/users",
            protected(get(admin::list_users), "getUsersList", &state),
        )
        .route(
            "/users/stats",
            protected(get(admin::user_stats), "getUsersStats", &state),
        )
        .route(
            "/users/{id}/activate",
            protected(patch(admin::activate_user), "activateUser", &state),
        )
        .route(
            "/users/{id}/deactivate",
            protected(patch(admin::deactivate_user), "deactivateUser", &state),
        )
        .route(
            "/users/{id}/suspend",
            protected(patch(admin::suspend_user), "suspendUser", &state),
        );

    Router::new()
        // Health and info endpoints
        .route("/health", get(handlers::health))
        .route("/health/detailed", get(handlers::health_detailed))
        .route("/api/v1/status", get(handlers::api_status))
        .nest("/api/v1/admin", admin_routes)
        .with_state(state)
        // Middleware stack, innermost first: body limit -> trace -> cors -> request id.
        // The request id runs outermost so the trace span can read it.
        .layer(axum::extract::DefaultBodyLimit::max(server.body_limit_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let req_id = app_middleware::request_id_of(req.headers());
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = tracing::field::Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: std::time::Duration, span: &tracing::Span| {
                        span.record("http.status_code", tracing::field::display(res.status().as_u16()));
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(cors())
        .layer(middleware::from_fn(app_middleware::request_id))
}

// =============================================================================
// Server
// =============================================================================

pub struct WardenServer {
    addr: SocketAddr,
    app: Router,
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Connects to every dependency and assembles the router.
    ///
    /// Redis is optional: without it the session cache is local and activity
    /// events are logged. PostgreSQL is required.
    pub async fn build(self) -> anyhow::Result<WardenServer> {
        let cfg = &self.config;

        let cache = create_cache_backend(&cfg.redis, &cfg.cache).await;

        let storage = PostgresAuthStorage::connect(&cfg.database.url, cfg.database.max_connections)
            .await
            .context("failed to connect to PostgreSQL")?;
        if cfg.database.ensure_schema {
            storage
                .ensure_schema()
                .await
                .context("failed to ensure database schema")?;
        }

        let source: Arc<dyn SessionSource> = create_session_source(&cfg.session_source, &storage)?;
        tracing::info!(kind = source.kind(), "Session source configured");

        let channel: Arc<dyn MessageChannel> = match cache.redis_pool() {
            Some(pool) => Arc::new(RedisMessageChannel::new(pool.clone())),
            None => {
                tracing::info!("Redis unavailable, activity events will be logged only");
                Arc::new(LogMessageChannel)
            }
        };

        let session_cache: Arc<dyn SessionCache> = Arc::new(cache.clone());
        let resolver = SessionResolver::new(
            Arc::clone(&session_cache),
            Arc::clone(&source),
            cfg.auth.session.cache_ttl,
        );
        let publisher = ActivityPublisher::new(channel, &cfg.auth.activity);
        let auth = AuthState::new(
            Arc::new(TokenVerifier::new(&cfg.auth.jwt_secret)),
            Arc::new(resolver),
            publisher,
            &cfg.auth,
        );

        let admin = AdminState::new(
            Arc::new(storage.user_directory()),
            UserStatsCache::new(session_cache, &cfg.cache.stats_key, cfg.cache.stats_ttl),
            cfg.auth.request_timeout,
        );

        let probes: Vec<Arc<dyn HealthProbe>> = vec![Arc::new(storage), Arc::new(cache)];
        let health = HealthState::new(&cfg.server.name, source.kind(), probes);

        let state = AppState {
            auth,
            required_role: RequiredRole::new(&cfg.auth.admin_role),
            admin,
            health,
        };

        Ok(WardenServer {
            addr: self.addr,
            app: build_app(state, &cfg.server),
        })
    }
}

impl WardenServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(
            listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
