//! Research-insight records
//!
//! Converts a validated research bundle into the persisted insight shape via
//! the conversion agent, and appends records to the insight store. Records
//! are append-only: created once per validated sub-query, never updated.

use crate::agents::{AgentKind, AgentRuntime, parse_structured};
use crate::config::InsightsConfig;
use crate::error::{AppError, AppResult};
use crate::rag::RagAnswer;
use crate::research::ResearchError;
use crate::research::classify::QueryKind;
use crate::research::geocode::GeocodedPlace;
use crate::research::synthesis::ValidatedResearch;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Audience/location metadata carried by an insight
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsightMeta {
    #[serde(default)]
    pub audience: Vec<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub ranking: Option<String>,
    #[serde(default)]
    pub price_level: Option<String>,
}

/// The persisted unit of the research pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchInsight {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub region_code: String,
    #[serde(default)]
    pub latitude: Option<String>,
    #[serde(default)]
    pub longitude: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub meta_obj: InsightMeta,
}

fn default_language() -> String {
    "en".to_string()
}

/// Everything the conversion agent needs for one sub-query
#[derive(Debug, Serialize)]
pub struct ConversionInput<'a> {
    #[serde(rename = "type")]
    pub kind: QueryKind,
    pub original_query: &'a str,
    pub query: &'a str,
    pub research: &'a ValidatedResearch,
    pub maps_data: Option<&'a GeocodedPlace>,
}

/// Convert a research bundle into an insight record.
///
/// When the RAG pre-check found known content, it is passed as an exclusion
/// block: the record must cover only information not already stored.
pub async fn convert(
    runtime: &dyn AgentRuntime,
    input: &ConversionInput<'_>,
    known: Option<&RagAnswer>,
) -> Result<ResearchInsight, ResearchError> {
    let mut prompt = format!(
        "INPUT DATA:\n{}",
        serde_json::to_string_pretty(input)
            .map_err(|e| ResearchError::Conversion(e.to_string()))?
    );

    if let Some(known) = known {
        prompt.push_str(&format!(
            "\n\nEXCLUSION BLOCK (already stored; do not repeat any of it):\n{}",
            serde_json::to_string_pretty(known)
                .map_err(|e| ResearchError::Conversion(e.to_string()))?
        ));
    }

    let raw = runtime
        .run(AgentKind::Conversion, &prompt)
        .await
        .map_err(|e| ResearchError::Conversion(e.to_string()))?;

    let mut insight: ResearchInsight =
        parse_structured(&raw).map_err(|e| ResearchError::Conversion(e.to_string()))?;

    // The originating query is authoritative regardless of model output.
    insight.query = input.query.to_string();
    Ok(insight)
}

/// Acknowledgement from the insight store; extra keys tolerated
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoredRecord {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Append-only client for the insight store
pub struct InsightStore {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl InsightStore {
    pub fn new(config: &InsightsConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Config(format!("insight store HTTP client build failed: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Insert one insight. Errors are reported as strings for the caller to
    /// attach to the in-memory outcome; they never abort the pipeline.
    pub async fn insert(&self, insight: &ResearchInsight) -> Result<StoredRecord, String> {
        let mut request = self
            .http
            .post(format!("{}/research_insights", self.base_url))
            .json(insight);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("insert returned {}", response.status()));
        }

        response
            .json::<StoredRecord>()
            .await
            .or(Ok(StoredRecord::default()))
    }
}
