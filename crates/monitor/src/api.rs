//! HTTP API for health checks, Prometheus metrics and course statistics

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use monitor_lib::{
    courses::CourseDirectory,
    health::{ComponentStatus, HealthRegistry},
    observability::MonitorMetrics,
    stats::{daily_metrics, material_usage, monitor_counts, StudentFilter},
    telemetry::schema,
};
use prometheus::{Encoder, TextEncoder};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: MonitorMetrics,
    pub courses: Arc<dyn CourseDirectory>,
    pub data_root: PathBuf,
    pub artefact_min_len: usize,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: MonitorMetrics,
        courses: Arc<dyn CourseDirectory>,
        data_root: impl Into<PathBuf>,
        artefact_min_len: usize,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            courses,
            data_root: data_root.into(),
            artefact_min_len,
        }
    }

    fn filter_for(&self, course: &str) -> StudentFilter {
        StudentFilter::new(self.courses.staff(course), self.artefact_min_len)
    }

    /// A course exists if it is declared or has accumulated telemetry
    fn knows_course(&self, course: &str) -> bool {
        schema::course_raw_dir(&self.data_root, course).is_dir()
            || self.courses.list_courses().iter().any(|c| c == course)
    }
}

/// Health check response - returns 200 if healthy, 503 if degraded/unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder.encode(&metric_families, &mut buffer).unwrap();

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Daily unique/new students and notebooks for one course
async fn course_daily(
    State(state): State<Arc<AppState>>,
    Path(course): Path<String>,
) -> impl IntoResponse {
    if !state.knows_course(&course) {
        return (StatusCode::NOT_FOUND, Json(serde_json::Value::Null));
    }
    let events = schema::events_path(&state.data_root, &course);
    let filter = state.filter_for(&course);
    match tokio::task::spawn_blocking(move || daily_metrics(&events, &filter)).await {
        Ok(metrics) => (StatusCode::OK, Json(serde_json::json!(metrics))),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::Value::Null)),
    }
}

/// Replayed monitor counters for one course
async fn course_counts(
    State(state): State<Arc<AppState>>,
    Path(course): Path<String>,
) -> impl IntoResponse {
    if !state.knows_course(&course) {
        return (StatusCode::NOT_FOUND, Json(serde_json::Value::Null));
    }
    let counts = schema::counts_path(&state.data_root, &course);
    match tokio::task::spawn_blocking(move || monitor_counts(&counts)).await {
        Ok(replay) => (StatusCode::OK, Json(serde_json::json!(replay))),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::Value::Null)),
    }
}

/// Notebook/student cross-usage for one course
async fn course_usage(
    State(state): State<Arc<AppState>>,
    Path(course): Path<String>,
) -> impl IntoResponse {
    if !state.knows_course(&course) {
        return (StatusCode::NOT_FOUND, Json(serde_json::Value::Null));
    }
    let events = schema::events_path(&state.data_root, &course);
    let filter = state.filter_for(&course);
    match tokio::task::spawn_blocking(move || material_usage(&events, &filter)).await {
        Ok(usage) => (StatusCode::OK, Json(serde_json::json!(usage))),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::Value::Null)),
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/courses/:course/stats/daily", get(course_daily))
        .route("/courses/:course/stats/counts", get(course_counts))
        .route("/courses/:course/stats/usage", get(course_usage))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
