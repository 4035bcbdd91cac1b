//! External research backends
//!
//! Three independent web-research providers behind one normalized interface:
//! `query -> {content, citations[]}`. Provider-specific request shapes are a
//! deployment concern; each backend here speaks the normalized shape at its
//! configured base URL. Backends fail independently; the caller tolerates
//! partial failure.

use crate::config::ResearchSourceConfig;
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// One backend's answer for one sub-query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceReport {
    pub source: String,
    pub content: String,
    #[serde(default)]
    pub citations: Vec<String>,
}

/// Failure of a single backend call; tolerated by the pipeline
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{source} request failed: {details}")]
    Request { source: String, details: String },

    #[error("{source} returned status {status}")]
    Status { source: String, status: u16 },

    #[error("{source} returned no content")]
    EmptyContent { source: String },
}

#[derive(Debug, Serialize)]
struct SearchBody<'a> {
    query: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchWire {
    #[serde(default)]
    content: String,
    #[serde(default)]
    citations: Vec<String>,
}

/// Client for one research backend
pub struct ResearchSource {
    name: String,
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ResearchSource {
    pub fn new(config: &ResearchSourceConfig, timeout_seconds: u64) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::Config(format!("research source HTTP client build failed: {e}"))
            })?;

        Ok(Self {
            name: config.name.clone(),
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run one search. Success requires non-empty content.
    pub async fn search(&self, query: &str) -> Result<SourceReport, SourceError> {
        let mut request = self
            .http
            .post(format!("{}/search", self.base_url))
            .json(&SearchBody { query });
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| SourceError::Request {
            source: self.name.clone(),
            details: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                source: self.name.clone(),
                status: response.status().as_u16(),
            });
        }

        let wire: SearchWire = response.json().await.map_err(|e| SourceError::Request {
            source: self.name.clone(),
            details: e.to_string(),
        })?;

        if wire.content.trim().is_empty() {
            return Err(SourceError::EmptyContent {
                source: self.name.clone(),
            });
        }

        Ok(SourceReport {
            source: self.name.clone(),
            content: wire.content,
            citations: wire.citations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer, name: &str) -> ResearchSource {
        ResearchSource::new(
            &ResearchSourceConfig {
                name: name.to_string(),
                base_url: server.uri(),
                api_key: None,
            },
            5,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_search_returns_report() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_json_string(r#"{"query":"top beaches in Karachi"}"#))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": "Clifton Beach is the most visited.",
                "citations": ["https://example.com/beaches"]
            })))
            .mount(&server)
            .await;

        let source = source_for(&server, "alpha");
        let report = source.search("top beaches in Karachi").await.unwrap();
        assert_eq!(report.source, "alpha");
        assert_eq!(report.citations.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_content_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"content": "", "citations": []})),
            )
            .mount(&server)
            .await;

        let source = source_for(&server, "beta");
        let err = source.search("anything").await.unwrap_err();
        assert!(matches!(err, SourceError::EmptyContent { .. }));
    }

    #[tokio::test]
    async fn test_error_status_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let source = source_for(&server, "gamma");
        let err = source.search("anything").await.unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 429, .. }));
    }
}
