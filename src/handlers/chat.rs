//! Chat endpoint handler
//!
//! Handles POST /chat: thread setup, guardrail classification, response
//! strategy selection, then dispatch to the streaming or structured
//! responder (or the streamed policy rejection).

use crate::agents::classifier;
use crate::agents::{explore, trip};
use crate::error::AppError;
use crate::handlers::{AppState, streaming};
use crate::memory::Role;
use crate::middleware::RequestId;
use crate::router::{Extraction, ResponsePlan, RouteMode, select_response};
use axum::{Extension, Json, extract::State, response::{IntoResponse, Response}};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Instant;

/// Maximum allowed message length in characters
const MAX_MESSAGE_LENGTH: usize = 100_000;

/// Chat request from client
///
/// Validation is enforced during deserialization - invalid instances cannot exist.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    message: String,
    user_id: String,
    reference: String,
    param: String,
    #[serde(rename = "threadId", skip_serializing_if = "Option::is_none")]
    thread_id: Option<String>,
}

impl ChatRequest {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn param(&self) -> &str {
        &self.param
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }
}

impl<'de> Deserialize<'de> for ChatRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawChatRequest {
            message: String,
            user_id: String,
            #[serde(default)]
            reference: String,
            #[serde(default)]
            param: String,
            #[serde(rename = "threadId", default)]
            thread_id: Option<String>,
        }

        let raw = RawChatRequest::deserialize(deserializer)?;

        if raw.message.trim().is_empty() {
            return Err(serde::de::Error::custom(
                "message cannot be empty or contain only whitespace",
            ));
        }

        let char_count = raw.message.chars().count();
        if char_count > MAX_MESSAGE_LENGTH {
            return Err(serde::de::Error::custom(format!(
                "message exceeds maximum length of {} characters (got {})",
                MAX_MESSAGE_LENGTH, char_count
            )));
        }

        if raw.user_id.trim().is_empty() {
            return Err(serde::de::Error::custom("user_id cannot be empty"));
        }

        Ok(ChatRequest {
            message: raw.message,
            user_id: raw.user_id,
            reference: raw.reference,
            param: raw.param,
            thread_id: raw.thread_id,
        })
    }
}

/// Timing metadata attached to every structured response
#[derive(Debug, Serialize)]
pub struct TimingInfo {
    pub param: String,
    #[serde(rename = "threadId")]
    pub thread_id: Option<String>,
    pub total_time: String,
    pub response_type: &'static str,
}

#[derive(Debug, Serialize)]
struct StructuredBody<T: Serialize> {
    result: T,
    timing: TimingInfo,
}

/// The non-streaming response envelope
#[derive(Debug, Serialize)]
struct StructuredEnvelope<T: Serialize> {
    response: StructuredBody<T>,
    #[serde(rename = "type")]
    kind: &'static str,
}

/// POST /chat handler
pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, AppError> {
    let mode = RouteMode::from_param(request.param());

    tracing::debug!(
        request_id = %request_id,
        message_length = request.message().len(),
        mode = mode.as_str(),
        "Received chat request"
    );

    // Thread setup is best-effort: a memory outage must not block the answer.
    let thread_id = match state
        .memory()
        .ensure_thread(request.user_id(), request.thread_id().map(String::from))
        .await
    {
        Ok(thread_id) => Some(thread_id),
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Thread setup failed; continuing stateless");
            None
        }
    };

    // The guardrail sees only the raw user text.
    let verdict = match mode {
        RouteMode::Explore => classifier::classify_fine(state.agents(), request.message()).await,
        RouteMode::Default => classifier::classify(state.agents(), request.message()).await,
    };
    let verdict = match verdict {
        Ok(verdict) => verdict,
        Err(e) => {
            state.metrics().record_chat(mode.as_str(), "error");
            return Err(e);
        }
    };

    let plan = select_response(&verdict, mode);
    tracing::info!(
        request_id = %request_id,
        mode = mode.as_str(),
        plan = ?plan,
        is_valid = verdict.is_valid,
        "Routing decision made"
    );

    match plan {
        ResponsePlan::Reject { reason, solution } => {
            state.metrics().record_chat(mode.as_str(), "rejected");
            Ok(streaming::rejection_response(reason, solution))
        }
        ResponsePlan::Structured(Extraction::TripPlan) => {
            state.metrics().record_chat(mode.as_str(), "structured");
            let started = Instant::now();
            let result = trip::extract(state.agents(), request.message()).await?;
            Ok(structured_reply(&state, result, thread_id, request.param(), started).await)
        }
        ResponsePlan::Structured(Extraction::ExploreFilter) => {
            state.metrics().record_chat(mode.as_str(), "structured");
            // Specific searches also grow the knowledge base out of band.
            state.enricher().dispatch(
                request.message().to_string(),
                request.reference().to_string(),
            );
            let started = Instant::now();
            let result = explore::extract(state.agents(), request.message()).await?;
            Ok(structured_reply(&state, result, thread_id, request.param(), started).await)
        }
        ResponsePlan::Stream => {
            state.metrics().record_chat(mode.as_str(), "stream");
            Ok(streaming::conversation_response(
                state.clone(),
                thread_id,
                request.message().to_string(),
                request.reference().to_string(),
                request_id,
            ))
        }
    }
}

/// Assemble the non-streaming envelope and persist the assistant output
/// best-effort.
async fn structured_reply<T: Serialize>(
    state: &AppState,
    result: T,
    thread_id: Option<String>,
    param: &str,
    started: Instant,
) -> Response {
    if let Some(tid) = &thread_id {
        if let Ok(text) = serde_json::to_string(&result) {
            if let Err(e) = state.memory().append(tid, Role::Assistant, &text).await {
                tracing::warn!(thread_id = %tid, error = %e, "Failed to persist structured response");
            }
        }
    }

    let timing = TimingInfo {
        param: param.to_string(),
        thread_id,
        total_time: format!("{:.2} seconds", started.elapsed().as_secs_f64()),
        response_type: "non_streaming",
    };

    Json(StructuredEnvelope {
        response: StructuredBody { result, timing },
        kind: "non-streaming",
    })
    .into_response()
}
