use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use warden_auth_postgres::PostgresAuthStorage;

use crate::cache::CacheBackend;

/// Upper bound for a single dependency check.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

// ---- Dependency probes ----

/// A dependency whose reachability is reported by the health endpoints.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Key under which the probe is reported.
    fn name(&self) -> &'static str;

    /// `Ok` if the dependency answered.
    async fn check(&self) -> Result<(), String>;
}

#[async_trait]
impl HealthProbe for PostgresAuthStorage {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn check(&self) -> Result<(), String> {
        self.ping().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl HealthProbe for CacheBackend {
    fn name(&self) -> &'static str {
        match self {
            CacheBackend::Local { .. } => "local_cache",
            CacheBackend::Redis { .. } => "redis",
        }
    }

    async fn check(&self) -> Result<(), String> {
        match self.redis_pool() {
            None => Ok(()),
            Some(pool) => pool.get().await.map(|_| ()).map_err(|e| e.to_string()),
        }
    }
}

async fn run_probe(probe: &dyn HealthProbe) -> Result<(), String> {
    match tokio::time::timeout(PROBE_TIMEOUT, probe.check()).await {
        Ok(result) => result,
        Err(_) => Err("timed out".to_string()),
    }
}

// ---- State ----

/// State for the health and status endpoints.
#[derive(Clone)]
pub struct HealthState {
    pub service: Arc<str>,
    pub session_source: &'static str,
    pub probes: Arc<[Arc<dyn HealthProbe>]>,
}

impl std::fmt::Debug for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthState")
            .field("service", &self.service)
            .field("session_source", &self.session_source)
            .field("probes", &self.probes.iter().map(|p| p.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl HealthState {
    pub fn new(
        service: impl AsRef<str>,
        session_source: &'static str,
        probes: Vec<Arc<dyn HealthProbe>>,
    ) -> Self {
        Self {
            service: Arc::from(service.as_ref()),
            session_source,
            probes: probes.into(),
        }
    }
}

// ---- Handlers ----

/// GET /health
///
/// Always 200. `status` is `degraded` when any dependency fails its probe.
pub async fn health(State(state): State<HealthState>) -> impl IntoResponse {
    tracing::debug!("Health check requested");

    let mut body = Map::new();
    let mut healthy = true;
    for probe in state.probes.iter() {
        let status = match run_probe(probe.as_ref()).await {
            Ok(()) => "ok".to_string(),
            Err(e) => {
                healthy = false;
                format!("error: {e}")
            }
        };
        body.insert(probe.name().to_string(), Value::String(status));
    }

    body.insert(
        "status".into(),
        json!(if healthy { "ok" } else { "degraded" }),
    );
    body.insert("service".into(), json!(state.service.as_ref()));
    body.insert("version".into(), json!(env!("CARGO_PKG_VERSION")));
    body.insert(
        "timestamp".into(),
        json!(OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()),
    );

    (StatusCode::OK, Json(Value::Object(body)))
}

/// GET /health/detailed
pub async fn health_detailed(State(state): State<HealthState>) -> impl IntoResponse {
    tracing::debug!("Detailed health check requested");

    let mut dependencies = Map::new();
    for probe in state.probes.iter() {
        let connected = run_probe(probe.as_ref()).await.is_ok();
        dependencies.insert(
            probe.name().to_string(),
            json!(if connected { "connected" } else { "disconnected" }),
        );
    }

    let body = json!({
        "status": "operational",
        "service": state.service.as_ref(),
        "version": env!("CARGO_PKG_VERSION"),
        "components": {
            "dependencies": dependencies,
            "services": {
                "auth": "operational",
                "session": state.session_source,
                "cache": "operational",
            },
        },
    });
    (StatusCode::OK, Json(body))
}

/// GET /api/v1/status
pub async fn api_status(State(state): State<HealthState>) -> impl IntoResponse {
    let body = json!({
        "api_version": "v1",
        "status": "operational",
        "service": state.service.as_ref(),
    });
    (StatusCode::OK, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Down;

    #[async_trait]
    impl HealthProbe for Down {
        fn name(&self) -> &'static str {
            "postgres"
        }

        async fn check(&self) -> Result<(), String> {
            Err("connection refused".into())
        }
    }

    async fn body_json(res: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn state(probes: Vec<Arc<dyn HealthProbe>>) -> HealthState {
        HealthState::new("warden-admin", "postgres", probes)
    }

    #[tokio::test]
    async fn test_health_all_ok() {
        let res = health(State(state(vec![Arc::new(CacheBackend::new_local(10))])))
            .await
            .into_response();
        assert_eq!(res.status(), StatusCode::OK);

        let body = body_json(res).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["local_cache"], "ok");
        assert_eq!(body["service"], "warden-admin");
        assert!(body["timestamp"].as_str().is_some_and(|t| !t.is_empty()));
    }

    #[tokio::test]
    async fn test_health_reports_failed_dependency() {
        let res = health(State(state(vec![Arc::new(Down)])))
            .await
            .into_response();
        assert_eq!(res.status(), StatusCode::OK);

        let body = body_json(res).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["postgres"], "error: connection refused");
    }

    #[tokio::test]
    async fn test_detailed_health() {
        let res = health_detailed(State(state(vec![Arc::new(Down)])))
            .await
            .into_response();
        let body = body_json(res).await;
        assert_eq!(body["status"], "operational");
        assert_eq!(body["components"]["dependencies"]["postgres"], "disconnected");
        assert_eq!(body["components"]["services"]["session"], "postgres");
    }

    #[tokio::test]
    async fn test_api_status() {
        let res = api_status(State(state(vec![]))).await.into_response();
        let body = body_json(res).await;
        assert_eq!(
            body,
            json!({"api_version": "v1", "status": "operational", "service": "warden-admin"})
        );
    }
}
