//! Operational endpoints. None of them need a token, and the probes are
//! exempt from rate limiting.

use std::time::{Duration, Instant};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::state::AppState;

const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// GET /readyz
///
/// Ready once the pool hands out a connection that answers `SELECT 1`.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let started = Instant::now();
    let probe = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&state.db);
    let (status, database) = match tokio::time::timeout(READY_TIMEOUT, probe).await {
        Ok(Ok(_)) => (StatusCode::OK, "ok"),
        Ok(Err(e)) => {
            tracing::warn!("Readiness probe failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
        Err(_) => {
            tracing::warn!("Readiness probe timed out after {:?}", READY_TIMEOUT);
            (StatusCode::SERVICE_UNAVAILABLE, "timeout")
        }
    };
    let body = json!({
        "status": if status == StatusCode::OK { "ready" } else { "not ready" },
        "database": database,
        "latency_ms": started.elapsed().as_millis() as u64,
    });
    (status, Json(body))
}

/// GET /metrics
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.get_snapshot())
}

/// GET /metrics/prometheus
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.get_snapshot().to_prometheus(),
    )
}

/// GET /version
pub async fn version(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "environment": state.config.environment,
        "build": if cfg!(debug_assertions) { "debug" } else { "release" },
    }))
}
