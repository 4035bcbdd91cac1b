//! Background enrichment trigger
//!
//! Fire-and-forget dispatch of the research pipeline: the request path
//! returns before any network activity starts, errors are logged only, and
//! there is never a retry. Concurrency is bounded by a semaphore; jobs beyond
//! the bound are dropped with a warning rather than queued without limit.

use crate::config::EnrichmentConfig;
use crate::metrics::Metrics;
use crate::research::ResearchPipeline;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

pub struct Enricher {
    pipeline: Arc<ResearchPipeline>,
    permits: Arc<Semaphore>,
    budget: Duration,
    metrics: Arc<Metrics>,
}

impl Enricher {
    pub fn new(
        pipeline: Arc<ResearchPipeline>,
        config: &EnrichmentConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            pipeline,
            permits: Arc::new(Semaphore::new(config.max_concurrent)),
            budget: Duration::from_secs(config.budget_seconds),
            metrics,
        }
    }

    /// Launch one enrichment job and return immediately.
    ///
    /// At most one attempt; the job's outcome never reaches the caller.
    pub fn dispatch(&self, query: String, reference: String) {
        if query.trim().is_empty() {
            tracing::debug!("Skipping enrichment dispatch for empty query");
            return;
        }

        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!("Enrichment concurrency bound reached; dropping job");
                self.metrics.record_enrichment_dropped();
                return;
            }
        };

        let pipeline = Arc::clone(&self.pipeline);
        let budget = self.budget;
        tokio::spawn(async move {
            let _permit = permit;
            tracing::info!(query = %query, "Background enrichment started");
            match tokio::time::timeout(budget, pipeline.run(&query, &reference)).await {
                Ok(Ok(run)) => {
                    tracing::info!(
                        query = %query,
                        kind = run.kind.as_str(),
                        outcomes = run.outcomes.len(),
                        "Background enrichment completed"
                    );
                }
                Ok(Err(e)) => {
                    tracing::warn!(query = %query, error = %e, "Background enrichment failed");
                }
                Err(_) => {
                    tracing::warn!(
                        query = %query,
                        budget_seconds = budget.as_secs(),
                        "Background enrichment exceeded its budget"
                    );
                }
            }
        });
    }
}
