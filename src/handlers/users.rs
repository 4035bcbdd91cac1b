//! Memory-store user management endpoints

use crate::error::AppError;
use crate::handlers::AppState;
use crate::memory::NewUser;
use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct DeleteUserParams {
    pub user_id: String,
}

/// POST /create_user handler
pub async fn create_handler(
    State(state): State<AppState>,
    Json(user): Json<NewUser>,
) -> Result<Json<serde_json::Value>, AppError> {
    if user.user_id.trim().is_empty() {
        return Err(AppError::Validation("user_id cannot be empty".to_string()));
    }

    state.memory().create_user(&user).await?;
    Ok(Json(serde_json::json!({
        "message": "User created successfully",
    })))
}

/// GET /delete_user handler
pub async fn delete_handler(
    State(state): State<AppState>,
    Query(params): Query<DeleteUserParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    if params.user_id.trim().is_empty() {
        return Err(AppError::Validation("user_id cannot be empty".to_string()));
    }

    state.memory().delete_user(&params.user_id).await?;
    Ok(Json(serde_json::json!({
        "message": format!("User {} deleted successfully", params.user_id),
    })))
}
