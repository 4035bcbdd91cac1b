//! Validator HTTP endpoints
//!
//! `POST /validator/process` starts background research and returns
//! immediately; the caller never waits on the pipeline.

use crate::error::AppError;
use crate::handlers::AppState;
use crate::middleware::RequestId;
use axum::{Extension, Json, extract::State};
use serde::Deserialize;

/// Request body for POST /validator/process
#[derive(Debug, Deserialize)]
pub struct ValidatorRequest {
    pub query: String,
    #[serde(default)]
    pub reference: String,
}

/// POST /validator/process handler
pub async fn process(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<ValidatorRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if request.query.trim().is_empty() {
        return Err(AppError::Validation("query cannot be empty".to_string()));
    }

    tracing::info!(
        request_id = %request_id,
        query = %request.query,
        "Background research requested"
    );

    state
        .enricher()
        .dispatch(request.query, request.reference);

    Ok(Json(serde_json::json!({
        "message": "Research has started",
    })))
}

/// GET /validator/health handler
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "wayfarer-validator",
    }))
}

/// GET /validator/ handler
pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Travel query validator",
        "endpoints": {
            "process": "/validator/process (POST)",
            "health": "/validator/health (GET)",
        },
    }))
}
