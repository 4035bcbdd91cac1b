//! Prometheus metrics endpoint

use crate::error::AppError;
use crate::handlers::AppState;
use axum::extract::State;

/// GET /metrics handler
///
/// Returns the Prometheus text exposition of the process registry.
pub async fn handler(State(state): State<AppState>) -> Result<String, AppError> {
    state.metrics().encode()
}
