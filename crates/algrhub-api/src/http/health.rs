//! Status, health, and diagnostics endpoints.

use std::sync::Arc;

use algrhub_intake::TrackerSnapshot;
use axum::{Json, body::Body, extract::State, http::StatusCode, response::Response};
use tracing::error;

use crate::http::errors::ApiError;
use crate::models::{HealthResponse, LanguagesResponse};
use crate::state::ApiState;

pub(crate) async fn status(State(state): State<Arc<ApiState>>) -> Json<TrackerSnapshot> {
    Json(state.orchestrator.tracker().snapshot())
}

pub(crate) async fn languages(State(state): State<Arc<ApiState>>) -> Json<LanguagesResponse> {
    Json(LanguagesResponse {
        languages: state.orchestrator.config().languages.clone(),
    })
}

pub(crate) async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    state.sync_storage_health();
    let degraded = state.current_health_degraded();
    let status = if degraded.is_empty() {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthResponse {
        status,
        degraded,
        service: state.orchestrator.tracker().current_status(),
        metrics: state.telemetry.snapshot(),
    })
}

pub(crate) async fn metrics(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    match state.telemetry.render() {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )
            .body(Body::from(body))
            .map_err(|err| {
                error!(error = %err, "failed to build metrics response");
                ApiError::internal("failed to build metrics response")
            }),
        Err(err) => {
            error!(error = %err, "failed to render metrics");
            Err(ApiError::internal("failed to render metrics"))
        }
    }
}
