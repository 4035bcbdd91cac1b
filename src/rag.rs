//! RAG chat webhook client
//!
//! The knowledge store answers a query with arrays of already-known content.
//! A non-empty array marks content as known; research still proceeds, the
//! known bundle is only excluded from later synthesis. Retrieved content is
//! data, never instructions — it is passed downstream as a labeled exclusion
//! block and never fed to a guardrail or spliced into agent instructions.

use crate::config::RagConfig;
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the knowledge store already holds for a query.
///
/// Unknown extra keys are tolerated; absent arrays read as empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagAnswer {
    #[serde(default)]
    pub entities: Vec<serde_json::Value>,
    #[serde(default)]
    pub chunks: Vec<serde_json::Value>,
    #[serde(default)]
    pub audience: Vec<serde_json::Value>,
    #[serde(default)]
    pub travel_style: Vec<serde_json::Value>,
}

impl RagAnswer {
    /// Content counts as already known if any array is non-empty
    pub fn has_answer(&self) -> bool {
        !self.entities.is_empty()
            || !self.chunks.is_empty()
            || !self.audience.is_empty()
            || !self.travel_style.is_empty()
    }
}

#[derive(Debug, Serialize)]
struct RagQuery<'a> {
    query: &'a str,
    reference: &'a str,
}

/// Client for the RAG chat webhook
pub struct RagClient {
    http: reqwest::Client,
    base_url: String,
}

impl RagClient {
    pub fn new(config: &RagConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Config(format!("RAG HTTP client build failed: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Query the knowledge store
    pub async fn query(&self, query: &str, reference: &str) -> AppResult<RagAnswer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation("query cannot be empty".to_string()));
        }

        let response = self
            .http
            .post(format!("{}/chat", self.base_url))
            .json(&RagQuery { query, reference })
            .send()
            .await
            .map_err(|e| AppError::Memory(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AppError::Memory(format!(
                "RAG webhook returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Memory(e.to_string()))
    }
}
