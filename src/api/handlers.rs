// HTTP handlers

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;
use tracing::error;

use crate::api::form::{read_face_swap_form, read_generate_form};
use crate::core::errors::{ApiError, ApiResult};
use crate::core::types::{AppState, FaceSwapResult, GenerationResult, SessionId, StatsReport};

pub async fn root() -> &'static str {
    "StoryMaker API - story image generation backed by fal.ai"
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.metrics.record_endpoint_request("/health");
    Json(serde_json::json!({
        "status": "healthy",
        "message": "StoryMaker API is running",
        "fal_api_configured": state.config.fal_api_configured(),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Local::now().to_rfc3339(),
    }))
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<StatsReport>> {
    state.metrics.record_endpoint_request("/stats");
    state
        .orchestrator
        .stats(state.config.fal_api_configured())
        .await
        .map(Json)
        .map_err(|e| ApiError::Internal(format!("Failed to read stats: {}", e)))
}

/// Stored result images, newest first
pub async fn gallery(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    state.metrics.record_endpoint_request("/gallery");
    let images = state
        .orchestrator
        .gallery()
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to read gallery: {}", e)))?;
    Ok(Json(serde_json::json!({ "images": images })))
}

/// `POST /generate`: 200 with the result on success, 500 with the same body shape on
/// adapter failure, 4xx on validation failure.
pub async fn generate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<GenerationResult>)> {
    state.metrics.record_endpoint_request("/generate");
    let request = read_generate_form(multipart)
        .await
        .inspect_err(|_| state.metrics.record_validation_rejection())?;

    let session_id = SessionId::new();
    let orchestrator = Arc::clone(&state.orchestrator);

    // Spawned so a dropped connection does not cancel the remote call or the cleanup
    let result = tokio::spawn(async move { orchestrator.generate(session_id, request).await })
        .await
        .map_err(|e| {
            error!("Generation task failed: {}", e);
            ApiError::Internal(format!("Generation failed: {}", e))
        })??;

    Ok((status_for(result.success), Json(result)))
}

/// `POST /face-swap`
pub async fn face_swap(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<FaceSwapResult>)> {
    state.metrics.record_endpoint_request("/face-swap");
    let request = read_face_swap_form(multipart)
        .await
        .inspect_err(|_| state.metrics.record_validation_rejection())?;

    let session_id = SessionId::new();
    let orchestrator = Arc::clone(&state.orchestrator);

    let result = tokio::spawn(async move { orchestrator.face_swap(session_id, request).await })
        .await
        .map_err(|e| {
            error!("Face swap task failed: {}", e);
            ApiError::Internal(format!("Face swap failed: {}", e))
        })??;

    Ok((status_for(result.success), Json(result)))
}

fn status_for(success: bool) -> StatusCode {
    if success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}
