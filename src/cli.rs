//! Command-line interface for Wayfarer

use clap::{Parser, Subcommand};

/// Travel-assistant backend routing queries through guarded LLM agents
#[derive(Parser)]
#[command(name = "wayfarer")]
#[command(version)]
#[command(about = "Travel-assistant backend routing queries through guarded LLM agents")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# Wayfarer Configuration
# ======================
#
# Configures the HTTP server, the agent runtime profiles, and every external
# collaborator (memory service, RAG webhook, research backends, geocoder,
# insight store).

[server]
host = "0.0.0.0"
port = 8080
request_timeout_seconds = 30

# ─────────────────────────────────────────────────────────────────────────────
# AGENT RUNTIME
# ─────────────────────────────────────────────────────────────────────────────
#
# One OpenAI-compatible endpoint serves all agents; each named agent binds a
# model and sampling parameters. Guardrails and extractors run cold, the
# conversational agent runs warmer.

[agents]
base_url = "http://localhost:1234/v1"

[agents.guardrail]
model = "your-guard-model"
max_tokens = 512
temperature = 0.0

[agents.travel_guardrail]
model = "your-guard-model"
max_tokens = 512
temperature = 0.0

[agents.conversation]
model = "your-chat-model"
max_tokens = 4096
temperature = 0.7

[agents.trip_extraction]
model = "your-extraction-model"
max_tokens = 2048
temperature = 0.0

[agents.explore_extraction]
model = "your-extraction-model"
max_tokens = 1024
temperature = 0.0

[agents.research_classifier]
model = "your-guard-model"
max_tokens = 1024
temperature = 0.0

[agents.synthesis]
model = "your-chat-model"
max_tokens = 4096
temperature = 0.3

[agents.conversion]
model = "your-extraction-model"
max_tokens = 2048
temperature = 0.3

# ─────────────────────────────────────────────────────────────────────────────
# EXTERNAL COLLABORATORS
# ─────────────────────────────────────────────────────────────────────────────

[memory]
base_url = "http://localhost:9001"
# api_key = "..."

[rag]
base_url = "http://localhost:9002"

# Exactly three research backends, each speaking the normalized
# {query} -> {content, citations[]} shape.

[[research.sources]]
name = "alpha"
base_url = "http://localhost:9003"
# api_key = "..."

[[research.sources]]
name = "beta"
base_url = "http://localhost:9004"

[[research.sources]]
name = "gamma"
base_url = "http://localhost:9005"

[geocode]
base_url = "http://localhost:9006"
# api_key = "..."

[insights]
base_url = "http://localhost:9007"
# api_key = "..."

[enrichment]
max_concurrent = 8
budget_seconds = 1000

[observability]
log_level = "info"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_template_is_valid_config() {
        let config = Config::from_toml(generate_config_template()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.research.sources.len(), 3);
    }
}
