//! Wayfarer - travel-assistant agent router
//!
//! Routes natural-language travel queries through guardrail classification
//! into streaming or structured LLM responses, and grows a knowledge base
//! through a background research/validation pipeline.

pub mod agents;
pub mod cli;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod metrics;
pub mod middleware;
pub mod rag;
pub mod research;
pub mod router;
pub mod telemetry;
