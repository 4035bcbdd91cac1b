//! HTTP request handlers for the Wayfarer API

use crate::agents::{AgentRuntime, OpenAgentRuntime};
use crate::config::Config;
use crate::enrichment::Enricher;
use crate::error::AppResult;
use crate::memory::MemoryClient;
use crate::metrics::Metrics;
use crate::middleware::request_id_middleware;
use crate::research::ResearchPipeline;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

pub mod chat;
pub mod health;
pub mod metrics;
pub mod streaming;
pub mod users;

/// Application state shared across all handlers
///
/// Clients and the agent runtime are constructed once at startup and injected
/// here rather than living as module globals; all fields are Arc'd for cheap
/// cloning across Axum handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    agents: Arc<dyn AgentRuntime>,
    memory: Arc<MemoryClient>,
    enricher: Arc<Enricher>,
    metrics: Arc<Metrics>,
}

impl AppState {
    /// Create an AppState backed by the production agent runtime
    pub fn new(config: Arc<Config>) -> AppResult<Self> {
        let runtime: Arc<dyn AgentRuntime> =
            Arc::new(OpenAgentRuntime::new(config.agents.clone()));
        Self::with_runtime(config, runtime)
    }

    /// Create an AppState with an injected agent runtime (tests use this to
    /// avoid real model calls)
    pub fn with_runtime(config: Arc<Config>, agents: Arc<dyn AgentRuntime>) -> AppResult<Self> {
        let metrics = Arc::new(Metrics::new()?);
        let memory = Arc::new(MemoryClient::new(&config.memory)?);
        let pipeline = Arc::new(ResearchPipeline::new(
            &config,
            Arc::clone(&agents),
            Arc::clone(&metrics),
        )?);
        let enricher = Arc::new(Enricher::new(
            pipeline,
            &config.enrichment,
            Arc::clone(&metrics),
        ));

        Ok(Self {
            config,
            agents,
            memory,
            enricher,
            metrics,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn agents(&self) -> &dyn AgentRuntime {
        self.agents.as_ref()
    }

    pub fn memory(&self) -> &MemoryClient {
        &self.memory
    }

    pub fn enricher(&self) -> &Enricher {
        &self.enricher
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/// Build the full application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat::handler))
        .route("/health", get(health::handler))
        .route("/create_user", post(users::create_handler))
        .route("/delete_user", get(users::delete_handler))
        .route("/metrics", get(metrics::handler))
        .route("/validator/process", post(crate::research::handlers::process))
        .route("/validator/health", get(crate::research::handlers::health))
        .route("/validator/", get(crate::research::handlers::root))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
