//! Shared test support: a scriptable agent runtime and config helpers.
//!
//! Integration tests mock the agent runtime in-process (no model calls) and
//! point every HTTP collaborator at a wiremock server.

// Each test binary compiles this module separately and uses a subset of it.
#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wayfarer::agents::{AgentError, AgentKind, AgentResult, AgentRuntime, TokenStream};
use wayfarer::config::Config;
use wayfarer::handlers::AppState;

/// Scriptable agent runtime: canned responses per agent kind, optional
/// per-kind latency, and a scripted token stream for the conversation agent.
#[derive(Default)]
pub struct MockRuntime {
    responses: HashMap<AgentKind, String>,
    delays: HashMap<AgentKind, Duration>,
    stream_chunks: Vec<String>,
    stream_error: Option<String>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, kind: AgentKind, response: &str) -> Self {
        self.responses.insert(kind, response.to_string());
        self
    }

    pub fn with_delay(mut self, kind: AgentKind, delay: Duration) -> Self {
        self.delays.insert(kind, delay);
        self
    }

    pub fn with_stream_chunks(mut self, chunks: &[&str]) -> Self {
        self.stream_chunks = chunks.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Terminate the scripted stream with an error after the chunks
    pub fn with_stream_error(mut self, message: &str) -> Self {
        self.stream_error = Some(message.to_string());
        self
    }
}

#[async_trait]
impl AgentRuntime for MockRuntime {
    async fn run(&self, kind: AgentKind, _input: &str) -> AgentResult<String> {
        if let Some(delay) = self.delays.get(&kind) {
            tokio::time::sleep(*delay).await;
        }
        match self.responses.get(&kind) {
            Some(response) => Ok(response.clone()),
            None => Err(AgentError::Query {
                agent: kind.name(),
                details: "no scripted response".to_string(),
            }),
        }
    }

    async fn run_streamed(&self, kind: AgentKind, _input: &str) -> AgentResult<TokenStream> {
        if let Some(delay) = self.delays.get(&kind) {
            tokio::time::sleep(*delay).await;
        }
        let mut items: Vec<AgentResult<String>> =
            self.stream_chunks.iter().cloned().map(Ok).collect();
        if let Some(ref message) = self.stream_error {
            items.push(Err(AgentError::Stream {
                agent: kind.name(),
                bytes_received: 0,
                details: message.clone(),
            }));
        }
        Ok(futures::stream::iter(items).boxed())
    }
}

/// Config with every collaborator pointed at `base` (one wiremock server;
/// collaborators are separated by path prefix).
pub fn test_config(base: &str) -> Config {
    let toml = format!(
        r#"
[server]
host = "127.0.0.1"
port = 0

[agents]
base_url = "{base}/v1"

[agents.guardrail]
model = "guard"
temperature = 0.0

[agents.travel_guardrail]
model = "guard"
temperature = 0.0

[agents.conversation]
model = "chat"
max_tokens = 4096
temperature = 0.7

[agents.trip_extraction]
model = "extract"
temperature = 0.0

[agents.explore_extraction]
model = "extract"
temperature = 0.0

[agents.research_classifier]
model = "guard"
temperature = 0.0

[agents.synthesis]
model = "chat"

[agents.conversion]
model = "extract"

[memory]
base_url = "{base}"
timeout_seconds = 5

[rag]
base_url = "{base}/rag"
timeout_seconds = 5

[research]
source_timeout_seconds = 5

[[research.sources]]
name = "alpha"
base_url = "{base}/src-alpha"

[[research.sources]]
name = "beta"
base_url = "{base}/src-beta"

[[research.sources]]
name = "gamma"
base_url = "{base}/src-gamma"

[geocode]
base_url = "{base}"
timeout_seconds = 5

[insights]
base_url = "{base}"
timeout_seconds = 5
"#
    );
    Config::from_toml(&toml).expect("test config should parse")
}

/// Build an AppState over the mock runtime
pub fn test_state(base: &str, runtime: MockRuntime) -> AppState {
    AppState::with_runtime(Arc::new(test_config(base)), Arc::new(runtime))
        .expect("test state should build")
}

/// Parse an SSE body into its JSON frame payloads
pub fn sse_frames(body: &str) -> Vec<serde_json::Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .filter(|data| !data.trim().is_empty())
        .map(|data| serde_json::from_str(data).expect("frame should be JSON"))
        .collect()
}

/// Canned guardrail verdicts
pub mod verdicts {
    pub const CLEAN_TRAVEL: &str =
        r#"{"isValid": true, "reason": "CLEAN", "solution": "", "isTravelRelated": true}"#;

    pub const CLEAN_NOT_TRAVEL: &str =
        r#"{"isValid": true, "reason": "CLEAN", "solution": "", "isTravelRelated": false}"#;

    pub const TOXIC: &str = r#"{"isValid": false, "reason": "TOXICITY", "solution": "Please rephrase your message respectfully.", "isTravelRelated": false}"#;

    pub const FINE_SPECIFIC_SEARCH: &str = r#"{"isValid": true, "reason": "CLEAN", "solution": "", "isTravelRelated": true, "isPlanRelated": false, "travel_type": "specific-search-query"}"#;

    pub const FINE_PLAN_AND_SEARCH: &str = r#"{"isValid": true, "reason": "CLEAN", "solution": "", "isTravelRelated": true, "isPlanRelated": true, "travel_type": "specific-search-query"}"#;

    pub const FINE_GENERAL: &str = r#"{"isValid": true, "reason": "CLEAN", "solution": "", "isTravelRelated": true, "isPlanRelated": false, "travel_type": "general-travel-query"}"#;
}
