//! Validator/research pipeline
//!
//! Classifies a query, fans out sub-queries, researches each across three
//! external backends, scores agreement, synthesizes, geocodes, converts to
//! an insight record, and persists it. Every stage is independently failable;
//! only classification errors abort a run. Sub-queries run concurrently and
//! one failure never affects siblings.

pub mod classify;
pub mod geocode;
pub mod handlers;
pub mod insight;
pub mod sources;
pub mod synthesis;

use crate::agents::AgentRuntime;
use crate::config::Config;
use crate::error::AppResult;
use crate::metrics::Metrics;
use crate::rag::RagClient;
use classify::QueryKind;
use geocode::GeocodeClient;
use insight::{ConversionInput, InsightStore, ResearchInsight};
use serde::Serialize;
use sources::{ResearchSource, SourceReport};
use std::sync::Arc;
use synthesis::{UNKNOWN_LOCATION, ValidatedResearch};
use thiserror::Error;

/// Failures local to the research pipeline.
///
/// These are contained: background runs log them, and nothing here ever
/// surfaces on the chat request path.
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("Research classifier failed: {0}")]
    Classifier(String),

    #[error("{kind} classification must yield exactly {expected} sub-queries, got {got}")]
    ArityViolation {
        kind: QueryKind,
        expected: usize,
        got: usize,
    },

    #[error("Record conversion failed: {0}")]
    Conversion(String),
}

/// Result of researching one sub-query.
///
/// The synthesized content is always present, even when persistence failed
/// (`store_error`) or the sub-query collapsed to a zero-confidence
/// placeholder (`research.synthesized == false`).
#[derive(Debug, Serialize)]
pub struct SubQueryOutcome {
    pub query: String,
    pub research: ValidatedResearch,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insight: Option<ResearchInsight>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_id: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_error: Option<String>,
}

/// One completed pipeline run
#[derive(Debug, Serialize)]
pub struct ResearchRun {
    pub kind: QueryKind,
    pub original_query: String,
    pub outcomes: Vec<SubQueryOutcome>,
}

/// The research pipeline with all its collaborators
pub struct ResearchPipeline {
    runtime: Arc<dyn AgentRuntime>,
    rag: RagClient,
    sources: Vec<ResearchSource>,
    geocoder: GeocodeClient,
    store: InsightStore,
    metrics: Arc<Metrics>,
}

impl ResearchPipeline {
    pub fn new(
        config: &Config,
        runtime: Arc<dyn AgentRuntime>,
        metrics: Arc<Metrics>,
    ) -> AppResult<Self> {
        let sources = config
            .research
            .sources
            .iter()
            .map(|s| ResearchSource::new(s, config.research.source_timeout_seconds))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Self {
            runtime,
            rag: RagClient::new(&config.rag)?,
            sources,
            geocoder: GeocodeClient::new(&config.geocode)?,
            store: InsightStore::new(&config.insights)?,
            metrics,
        })
    }

    /// Run the full pipeline for one query.
    ///
    /// Sub-queries run as independent concurrent futures, joined positionally.
    /// Each converts its own failures into its outcome, so one sub-query can
    /// never abort a sibling or the run.
    pub async fn run(&self, query: &str, reference: &str) -> Result<ResearchRun, ResearchError> {
        let classification = classify::classify(self.runtime.as_ref(), query).await?;
        tracing::info!(
            kind = classification.kind.as_str(),
            sub_queries = classification.queries.len(),
            "Research classification completed"
        );

        let sub_runs = classification.queries.iter().map(|sub_query| {
            self.process_sub_query(
                sub_query.clone(),
                query.to_string(),
                classification.kind,
                reference.to_string(),
            )
        });
        let outcomes = futures::future::join_all(sub_runs).await;

        Ok(ResearchRun {
            kind: classification.kind,
            original_query: query.to_string(),
            outcomes,
        })
    }

    /// Steps 2-7 for one sub-query. Infallible by construction: every
    /// failure mode degrades into the returned outcome.
    async fn process_sub_query(
        &self,
        query: String,
        original: String,
        kind: QueryKind,
        reference: String,
    ) -> SubQueryOutcome {
        // RAG pre-check: known content is excluded later, research continues.
        let known = match self.rag.query(&query, &reference).await {
            Ok(answer) if answer.has_answer() => {
                tracing::info!(sub_query = %query, "Content already known; excluding from conversion");
                Some(answer)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(sub_query = %query, error = %e, "RAG pre-check failed; continuing");
                None
            }
        };

        let reports = self.gather_reports(&query).await;
        let research = synthesis::synthesize(self.runtime.as_ref(), &query, &reports).await;

        if !research.synthesized {
            self.metrics.record_subquery("zero_confidence");
            return SubQueryOutcome {
                query,
                research,
                insight: None,
                stored_id: None,
                store_error: None,
            };
        }

        let maps_data = if research.location != UNKNOWN_LOCATION {
            self.geocoder.lookup(&research.location).await
        } else {
            None
        };

        let input = ConversionInput {
            kind,
            original_query: &original,
            query: &query,
            research: &research,
            maps_data: maps_data.as_ref(),
        };
        let insight = match insight::convert(self.runtime.as_ref(), &input, known.as_ref()).await {
            Ok(insight) => insight,
            Err(e) => {
                tracing::warn!(sub_query = %query, error = %e, "Record conversion failed");
                self.metrics.record_subquery("conversion_failed");
                return SubQueryOutcome {
                    query,
                    research,
                    insight: None,
                    stored_id: None,
                    store_error: None,
                };
            }
        };

        match self.store.insert(&insight).await {
            Ok(record) => {
                self.metrics.record_subquery("stored");
                SubQueryOutcome {
                    query,
                    research,
                    insight: Some(insight),
                    stored_id: record.id,
                    store_error: None,
                }
            }
            Err(e) => {
                tracing::warn!(sub_query = %query, error = %e, "Insight insert failed");
                self.metrics.record_subquery("store_failed");
                SubQueryOutcome {
                    query,
                    research,
                    insight: Some(insight),
                    stored_id: None,
                    store_error: Some(e),
                }
            }
        }
    }

    /// Query all three backends concurrently; keep the successes.
    async fn gather_reports(&self, query: &str) -> Vec<SourceReport> {
        let futures: Vec<_> = self.sources.iter().map(|s| s.search(query)).collect();
        futures::future::join_all(futures)
            .await
            .into_iter()
            .filter_map(|result| match result {
                Ok(report) => Some(report),
                Err(e) => {
                    tracing::warn!(sub_query = %query, error = %e, "Research source failed");
                    None
                }
            })
            .collect()
    }
}
