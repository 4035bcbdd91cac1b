//! Prometheus metrics
//!
//! One registry per process, owned by `AppState` and exposed at `/metrics`.
//! Metrics recording must never break a request: failures here are logged
//! and swallowed at the call sites.

use crate::error::{AppError, AppResult};
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,
    chat_requests: IntCounterVec,
    stream_ttfb_seconds: Histogram,
    research_subqueries: IntCounterVec,
    enrichment_dropped: IntCounter,
}

impl Metrics {
    pub fn new() -> AppResult<Self> {
        let registry = Registry::new();

        let chat_requests = IntCounterVec::new(
            Opts::new("wayfarer_chat_requests_total", "Chat requests by mode and outcome"),
            &["mode", "outcome"],
        )
        .map_err(|e| AppError::Internal(format!("metrics init failed: {e}")))?;

        let stream_ttfb_seconds = Histogram::with_opts(HistogramOpts::new(
            "wayfarer_stream_ttfb_seconds",
            "Time to first streamed content frame",
        ))
        .map_err(|e| AppError::Internal(format!("metrics init failed: {e}")))?;

        let research_subqueries = IntCounterVec::new(
            Opts::new(
                "wayfarer_research_subqueries_total",
                "Research sub-queries by outcome",
            ),
            &["outcome"],
        )
        .map_err(|e| AppError::Internal(format!("metrics init failed: {e}")))?;

        let enrichment_dropped = IntCounter::new(
            "wayfarer_enrichment_dropped_total",
            "Enrichment jobs dropped because the concurrency bound was reached",
        )
        .map_err(|e| AppError::Internal(format!("metrics init failed: {e}")))?;

        for collector in [
            Box::new(chat_requests.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(stream_ttfb_seconds.clone()),
            Box::new(research_subqueries.clone()),
            Box::new(enrichment_dropped.clone()),
        ] {
            registry
                .register(collector)
                .map_err(|e| AppError::Internal(format!("metrics registration failed: {e}")))?;
        }

        Ok(Self {
            registry,
            chat_requests,
            stream_ttfb_seconds,
            research_subqueries,
            enrichment_dropped,
        })
    }

    pub fn record_chat(&self, mode: &str, outcome: &str) {
        self.chat_requests.with_label_values(&[mode, outcome]).inc();
    }

    pub fn observe_ttfb(&self, seconds: f64) {
        self.stream_ttfb_seconds.observe(seconds);
    }

    pub fn record_subquery(&self, outcome: &str) {
        self.research_subqueries.with_label_values(&[outcome]).inc();
    }

    pub fn record_enrichment_dropped(&self) {
        self.enrichment_dropped.inc();
    }

    /// Prometheus text exposition of the whole registry
    pub fn encode(&self) -> AppResult<String> {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .map_err(|e| AppError::Internal(format!("metrics encoding failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_and_encode() {
        let metrics = Metrics::new().unwrap();
        metrics.record_chat("default", "stream");
        metrics.record_chat("explore", "rejected");
        metrics.observe_ttfb(0.25);
        metrics.record_subquery("stored");
        metrics.record_enrichment_dropped();

        let text = metrics.encode().unwrap();
        assert!(text.contains("wayfarer_chat_requests_total"));
        assert!(text.contains("wayfarer_stream_ttfb_seconds"));
        assert!(text.contains("wayfarer_enrichment_dropped_total 1"));
    }

    #[test]
    fn test_independent_registries() {
        // Each instance owns its registry so tests can build many states.
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.record_chat("default", "stream");
        assert!(!b.encode().unwrap().contains(r#"mode="default""#));
    }
}
