//! Error types for Wayfarer
//!
//! `AppError` covers the synchronous request path and implements
//! `IntoResponse` for Axum handlers. Failures contained inside background
//! work (enrichment, research sub-queries) have their own local error types
//! and never surface here.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    /// The guardrail agent errored or returned unparseable output.
    ///
    /// Distinct from a `false` verdict: a rejected query is a normal
    /// response, an unavailable classifier is a 500.
    #[error("Classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    /// A structured-extraction agent failed. No partial object is returned.
    #[error("Agent error: {0}")]
    Extraction(String),

    /// The conversational-memory service rejected an operation that was
    /// required to complete the request (user create/delete).
    #[error("Memory service error: {0}")]
    Memory(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            Self::ClassifierUnavailable(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            Self::Extraction(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            Self::Memory(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;
