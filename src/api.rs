use crate::{
    dispatcher::receive_event,
    jobs::{EnrichmentJobs, JobInfo},
    models::ApiMessage,
    providers::ProductCatalog,
};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use once_cell::sync::Lazy;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

static OPENAPI: Lazy<Value> = Lazy::new(|| {
    serde_yaml::from_str(include_str!("../docs/openapi.yaml"))
        .unwrap_or_else(|_| json!({ "openapi": "3.0.3" }))
});

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn ProductCatalog>,
    pub jobs: EnrichmentJobs,
    pub prometheus: Option<PrometheusHandle>,
}

pub fn build_router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/event", post(receive_event))
        .route("/health", get(health))
        .route("/jobs/{process_id}", get(get_job))
        .route("/metrics", get(metrics_endpoint))
        .route("/openapi.json", get(openapi_json))
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
}

/// Liveness check. Always `{"status":"ok","service":"pixelphraser-event"}`.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "pixelphraser-event",
    }))
}

/// Outcome of an enrichment started by `/event`, keyed by its process id.
async fn get_job(
    State(state): State<AppState>,
    Path(process_id): Path<String>,
) -> Result<Json<JobInfo>, (StatusCode, Json<ApiMessage>)> {
    crate::metrics::inc_requests("/jobs/{process_id}");
    let not_found = || {
        (
            StatusCode::NOT_FOUND,
            Json(ApiMessage::new("Job not found.")),
        )
    };
    let id = Uuid::parse_str(&process_id).map_err(|_| not_found())?;
    state.jobs.get(id).await.map(Json).ok_or_else(not_found)
}

async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    let body = state
        .prometheus
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default();
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

async fn openapi_json() -> Json<Value> {
    Json(OPENAPI.clone())
}

async fn not_found() -> (StatusCode, Json<ApiMessage>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiMessage::new("Path not found.")),
    )
}
