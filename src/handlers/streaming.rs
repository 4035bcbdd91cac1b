//! Streaming responder
//!
//! Emits the SSE frame sequence `started -> ttfb (once) -> content* -> done`
//! over the conversational agent's token stream. The policy-rejection
//! response reuses the same frame shape so clients handle both uniformly.

use crate::agents::AgentKind;
use crate::agents::classifier::SafetyReason;
use crate::handlers::AppState;
use crate::memory::Role;
use crate::middleware::RequestId;
use axum::response::{
    IntoResponse, Response,
    sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// One server-sent-event payload.
///
/// Serialized untagged so each frame carries exactly the keys consumers
/// expect; consumers tolerate unknown extra keys.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StreamFrame {
    Started {
        start_time: f64,
        status: &'static str,
        #[serde(rename = "threadId", skip_serializing_if = "Option::is_none")]
        thread_id: Option<String>,
    },
    FirstByte {
        time_to_first_byte: f64,
    },
    Content {
        content: String,
    },
    Done {
        done: bool,
        total_time: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        blocked: Option<bool>,
    },
    Error {
        error: String,
    },
}

impl StreamFrame {
    fn started(start_time: f64, thread_id: Option<String>) -> Self {
        Self::Started {
            start_time,
            status: "started",
            thread_id,
        }
    }

    fn done(total_time: f64, blocked: bool) -> Self {
        Self::Done {
            done: true,
            total_time,
            blocked: if blocked { Some(true) } else { None },
        }
    }
}

fn frame(payload: &StreamFrame) -> Result<Event, Infallible> {
    Ok(Event::default().data(serde_json::to_string(payload).unwrap_or_default()))
}

fn unix_now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn sse_response<S>(stream: S) -> Response
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text(":\n\n"),
        )
        .into_response()
}

fn compose_conversation_input(context: &str, message: &str, reference: &str) -> String {
    if context.is_empty() {
        format!("Question : {message}\n\nReference : {reference}")
    } else {
        format!("{context}\n\nQuestion : {message}\n\nReference : {reference}")
    }
}

/// Persist the accumulated assistant text after the stream is over.
///
/// Detached and best-effort: completion of the response never waits on this,
/// and a failure is logged only.
fn persist_transcript(state: AppState, thread_id: Option<String>, text: String) {
    let Some(thread_id) = thread_id else { return };
    if text.is_empty() {
        return;
    }
    tokio::spawn(async move {
        if let Err(e) = state.memory().append(&thread_id, Role::Assistant, &text).await {
            tracing::warn!(
                thread_id = %thread_id,
                error = %e,
                "Failed to persist streamed response"
            );
        }
    });
}

/// Streamed conversational response for one chat request
pub fn conversation_response(
    state: AppState,
    thread_id: Option<String>,
    message: String,
    reference: String,
    request_id: RequestId,
) -> Response {
    let stream = async_stream::stream! {
        let start = Instant::now();
        let start_time = unix_now_seconds();

        // Thread bookkeeping is best-effort; a memory outage degrades the
        // conversation to stateless rather than failing it.
        let mut context = String::new();
        if let Some(tid) = &thread_id {
            if let Err(e) = state.memory().append(tid, Role::User, &message).await {
                tracing::warn!(request_id = %request_id, error = %e, "Failed to append user message");
            }
            match state.memory().context(tid).await {
                Ok(c) => context = c,
                Err(e) => {
                    tracing::warn!(request_id = %request_id, error = %e, "Failed to fetch thread context");
                }
            }
        }

        // Deepen the knowledge base out of band; never awaited.
        let enrichment_query = if context.is_empty() {
            message.clone()
        } else {
            context.clone()
        };
        state.enricher().dispatch(enrichment_query, reference.clone());

        let input = compose_conversation_input(&context, &message, &reference);
        let mut tokens = match state.agents().run_streamed(AgentKind::Conversation, &input).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Failed to start conversation stream");
                yield frame(&StreamFrame::Error { error: e.to_string() });
                return;
            }
        };

        yield frame(&StreamFrame::started(start_time, thread_id.clone()));

        let mut ttfb: Option<f64> = None;
        let mut full_response = String::new();

        while let Some(chunk) = tokens.next().await {
            match chunk {
                Ok(text) => {
                    if ttfb.is_none() {
                        let elapsed = start.elapsed().as_secs_f64();
                        ttfb = Some(elapsed);
                        state.metrics().observe_ttfb(elapsed);
                        yield frame(&StreamFrame::FirstByte { time_to_first_byte: elapsed });
                    }
                    full_response.push_str(&text);
                    yield frame(&StreamFrame::Content { content: text });
                }
                Err(e) => {
                    // One error frame, then stop. No retry: retrying a
                    // partially streamed response would duplicate visible
                    // content at the client.
                    tracing::error!(
                        request_id = %request_id,
                        error = %e,
                        bytes_streamed = full_response.len(),
                        "Stream error; terminating"
                    );
                    yield frame(&StreamFrame::Error { error: e.to_string() });
                    persist_transcript(state.clone(), thread_id.clone(), full_response.clone());
                    return;
                }
            }
        }

        yield frame(&StreamFrame::done(start.elapsed().as_secs_f64(), false));
        persist_transcript(state.clone(), thread_id.clone(), full_response.clone());
    };

    sse_response(stream)
}

/// Word-level chunks of the policy-rejection message
fn rejection_chunks(reason: SafetyReason, solution: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    for (i, word) in "Your message was blocked by our content policy because it was flagged as inappropriate."
        .split_whitespace()
        .enumerate()
    {
        if i == 0 {
            chunks.push(word.to_string());
        } else {
            chunks.push(format!(" {word}"));
        }
    }
    chunks.push(format!("\n\nReason: {reason}"));
    chunks.push(format!("\n\nSolution: {solution}"));
    chunks
}

/// Streamed policy rejection.
///
/// Same envelope as a successful stream regardless of the mode the request
/// asked for, with `blocked: true` on the terminal frame.
pub fn rejection_response(reason: SafetyReason, solution: String) -> Response {
    let stream = async_stream::stream! {
        let start = Instant::now();
        yield frame(&StreamFrame::started(unix_now_seconds(), None));
        yield frame(&StreamFrame::FirstByte {
            time_to_first_byte: start.elapsed().as_secs_f64(),
        });
        for chunk in rejection_chunks(reason, &solution) {
            yield frame(&StreamFrame::Content { content: chunk });
        }
        yield frame(&StreamFrame::done(start.elapsed().as_secs_f64(), true));
    };

    sse_response(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_started_frame_shape() {
        let json = serde_json::to_value(StreamFrame::started(12.5, Some("t1".to_string()))).unwrap();
        assert_eq!(json["status"], "started");
        assert_eq!(json["threadId"], "t1");
        assert_eq!(json["start_time"], 12.5);
    }

    #[test]
    fn test_started_frame_omits_missing_thread() {
        let json = serde_json::to_value(StreamFrame::started(1.0, None)).unwrap();
        assert!(json.get("threadId").is_none());
    }

    #[test]
    fn test_done_frame_omits_blocked_on_success() {
        let json = serde_json::to_value(StreamFrame::done(3.5, false)).unwrap();
        assert_eq!(json["done"], true);
        assert!(json.get("blocked").is_none());

        let blocked = serde_json::to_value(StreamFrame::done(3.5, true)).unwrap();
        assert_eq!(blocked["blocked"], true);
    }

    #[test]
    fn test_rejection_chunks_carry_reason_and_solution() {
        let chunks = rejection_chunks(SafetyReason::Toxicity, "rephrase politely");
        let text: String = chunks.concat();
        assert!(text.starts_with("Your message was blocked"));
        assert!(text.contains("Reason: TOXICITY"));
        assert!(text.contains("Solution: rephrase politely"));
    }

    #[test]
    fn test_compose_input_with_and_without_context() {
        let with = compose_conversation_input("history", "where to?", "ref");
        assert!(with.starts_with("history"));
        assert!(with.contains("Question : where to?"));

        let without = compose_conversation_input("", "where to?", "ref");
        assert!(without.starts_with("Question :"));
        assert!(without.contains("Reference : ref"));
    }
}
