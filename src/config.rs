//! Configuration management for Wayfarer
//!
//! Parses TOML configuration files and provides typed access to settings.
//! Every external collaborator (agent runtime, memory service, RAG webhook,
//! research backends, geocoder, insight store) is addressed by a base URL
//! from this file so deployments and tests can point them anywhere.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AppError, AppResult};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub agents: AgentsConfig,
    pub memory: MemoryConfig,
    pub rag: RagConfig,
    pub research: ResearchConfig,
    pub geocode: GeocodeConfig,
    pub insights: InsightsConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_request_timeout() -> u64 {
    30
}

/// A named agent: one prompt configuration bound to a model and sampling
/// parameters. The instructions themselves live in code next to the output
/// schema they must produce.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentProfile {
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_max_tokens() -> usize {
    2048
}

fn default_temperature() -> f64 {
    0.3
}

/// Agent runtime configuration: one endpoint, several named profiles
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentsConfig {
    /// Base URL of the agent execution runtime (OpenAI-compatible)
    pub base_url: String,
    pub guardrail: AgentProfile,
    pub travel_guardrail: AgentProfile,
    pub conversation: AgentProfile,
    pub trip_extraction: AgentProfile,
    pub explore_extraction: AgentProfile,
    pub research_classifier: AgentProfile,
    pub synthesis: AgentProfile,
    pub conversion: AgentProfile,
}

/// Conversational-memory service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemoryConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_client_timeout")]
    pub timeout_seconds: u64,
}

/// RAG chat webhook
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RagConfig {
    pub base_url: String,
    #[serde(default = "default_client_timeout")]
    pub timeout_seconds: u64,
}

fn default_client_timeout() -> u64 {
    30
}

/// One external research backend
///
/// Providers are interchangeable `{query} -> {content, citations[]}`
/// collaborators; see `research::sources`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResearchSourceConfig {
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Research pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResearchConfig {
    pub sources: Vec<ResearchSourceConfig>,
    #[serde(default = "default_source_timeout")]
    pub source_timeout_seconds: u64,
}

fn default_source_timeout() -> u64 {
    60
}

/// Geocoding service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeocodeConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_client_timeout")]
    pub timeout_seconds: u64,
}

/// Research-insight store (append-only)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InsightsConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_client_timeout")]
    pub timeout_seconds: u64,
}

/// Background enrichment limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnrichmentConfig {
    /// Maximum concurrently running enrichment jobs; jobs beyond this are
    /// dropped with a warning rather than queued without bound.
    #[serde(default = "default_enrichment_concurrency")]
    pub max_concurrent: usize,
    /// Wall-clock budget for one enrichment job, end to end.
    #[serde(default = "default_enrichment_budget")]
    pub budget_seconds: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_enrichment_concurrency(),
            budget_seconds: default_enrichment_budget(),
        }
    }
}

fn default_enrichment_concurrency() -> usize {
    8
}

fn default_enrichment_budget() -> u64 {
    1000
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file and validate it
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AppError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string and validate it
    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field invariants that serde cannot express
    pub fn validate(&self) -> AppResult<()> {
        if self.research.sources.len() != 3 {
            return Err(AppError::Config(format!(
                "research requires exactly 3 sources, found {}",
                self.research.sources.len()
            )));
        }

        let mut names: Vec<&str> = self
            .research
            .sources
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.research.sources.len() {
            return Err(AppError::Config(
                "research source names must be unique".to_string(),
            ));
        }

        if self.enrichment.max_concurrent == 0 {
            return Err(AppError::Config(
                "enrichment.max_concurrent must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
