//! Explore-filter extraction
//!
//! Converts a specific search query ("best vegan restaurants in London")
//! into the filter shape the explore UI consumes.

use crate::agents::{AgentKind, AgentRuntime, parse_structured};
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Which explore screen the query maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Dine,
    Stay,
    Play,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dine => "dine",
            Self::Stay => "stay",
            Self::Play => "play",
        }
    }
}

/// Feedback sub-object driving the client-side search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExploreFeedback {
    #[serde(default = "default_action")]
    pub action: String,
    pub view: String,
    #[serde(default)]
    pub filters: Vec<String>,
}

fn default_action() -> String {
    "fetch-search-results".to_string()
}

/// Structured explore-query result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExploreResult {
    #[serde(default = "default_category")]
    pub category: String,
    pub intent: Intent,
    pub destination: String,
    pub feedback: ExploreFeedback,
}

fn default_category() -> String {
    "specific-search-query".to_string()
}

/// Run explore-filter extraction over the raw message only.
pub async fn extract(runtime: &dyn AgentRuntime, message: &str) -> AppResult<ExploreResult> {
    let raw = runtime
        .run(AgentKind::ExploreExtraction, message)
        .await
        .map_err(|e| AppError::Extraction(e.to_string()))?;

    parse_structured(&raw).map_err(|e| AppError::Extraction(e.to_string()))
}
