//! Agreement scoring and synthesis
//!
//! One LLM call consumes the successful source reports and produces an
//! agreement score on a half-point scale from 0 to 3, a neutral synthesized
//! answer, and a location string. The location-never-null guarantee and the
//! two-of-three success threshold are enforced here in code, not left to the
//! model.

use crate::agents::{AgentKind, AgentRuntime, parse_structured};
use crate::research::sources::SourceReport;
use serde::{Deserialize, Serialize, Serializer};

/// Synthesis requires at least this many successful sources with content
pub const MIN_AGREEING_SOURCES: usize = 2;

/// Sentinel location when none can be determined
pub const UNKNOWN_LOCATION: &str = "Unknown";

/// Inter-source agreement on a fixed half-point scale from 0 to 3.
///
/// Stored as half-point units (0..=6) so every representable value is exact;
/// rendered as `"2.5/3"`. Model values off the scale are clamped to the
/// nearest half-point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgreementScore(u8);

impl AgreementScore {
    pub const ZERO: AgreementScore = AgreementScore(0);

    const MAX_HALF_POINTS: u8 = 6;

    /// Clamp and round a model-reported value onto the scale
    pub fn from_model_value(value: f64) -> Self {
        let half_points = (value * 2.0).round().clamp(0.0, Self::MAX_HALF_POINTS as f64);
        Self(half_points as u8)
    }

    pub fn value(&self) -> f64 {
        self.0 as f64 / 2.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for AgreementScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 % 2 == 0 {
            write!(f, "{}/3", self.0 / 2)
        } else {
            write!(f, "{:.1}/3", self.value())
        }
    }
}

impl Serialize for AgreementScore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// The research bundle for one sub-query after synthesis
#[derive(Debug, Clone, Serialize)]
pub struct ValidatedResearch {
    pub score: AgreementScore,
    pub research: String,
    /// Never empty; defaults to the `"Unknown"` sentinel
    pub location: String,
    pub citations: Vec<String>,
    /// False when fewer than two sources succeeded or the synthesis call
    /// itself failed; such bundles carry a zero score and are not persisted.
    pub synthesized: bool,
}

#[derive(Debug, Deserialize)]
struct SynthesisWire {
    similarity_score: f64,
    #[serde(default)]
    #[allow(dead_code)]
    similarity_explanation: String,
    #[serde(default)]
    combined_research: String,
    #[serde(default)]
    location: Option<String>,
}

/// Enforce the location-never-null guarantee
pub fn normalize_location(raw: Option<String>) -> String {
    match raw {
        None => UNKNOWN_LOCATION.to_string(),
        Some(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty()
                || trimmed.eq_ignore_ascii_case("null")
                || trimmed.eq_ignore_ascii_case("none")
                || trimmed.eq_ignore_ascii_case("n/a")
            {
                UNKNOWN_LOCATION.to_string()
            } else {
                trimmed.to_string()
            }
        }
    }
}

fn dedup_citations(reports: &[SourceReport]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut citations = Vec::new();
    for report in reports {
        for citation in &report.citations {
            if seen.insert(citation.clone()) {
                citations.push(citation.clone());
            }
        }
    }
    citations
}

fn compose_input(query: &str, reports: &[SourceReport]) -> String {
    let mut input = format!("Original query: {query}\n");
    for (i, report) in reports.iter().enumerate() {
        // Source content is data under analysis, clearly fenced off from the
        // task description; it is never treated as instructions.
        input.push_str(&format!(
            "\n==== SOURCE {} ====\n{}\n",
            i + 1,
            report.content
        ));
    }
    input
}

impl ValidatedResearch {
    /// Zero-confidence placeholder for a sub-query that could not be
    /// synthesized
    pub fn unavailable(reason: &str) -> Self {
        Self {
            score: AgreementScore::ZERO,
            research: format!("Synthesis unavailable: {reason}"),
            location: UNKNOWN_LOCATION.to_string(),
            citations: Vec::new(),
            synthesized: false,
        }
    }
}

fn zero_confidence(reason: &str, reports: &[SourceReport]) -> ValidatedResearch {
    ValidatedResearch {
        citations: dedup_citations(reports),
        ..ValidatedResearch::unavailable(reason)
    }
}

/// Synthesize the successful source reports for one sub-query.
///
/// Never raises: insufficient sources or a failed synthesis call yield a
/// zero-confidence placeholder instead.
pub async fn synthesize(
    runtime: &dyn AgentRuntime,
    query: &str,
    reports: &[SourceReport],
) -> ValidatedResearch {
    if reports.len() < MIN_AGREEING_SOURCES {
        tracing::warn!(
            query = %query,
            successful_sources = reports.len(),
            required = MIN_AGREEING_SOURCES,
            "Too few successful sources to synthesize"
        );
        return zero_confidence("fewer than two sources returned content", reports);
    }

    let input = compose_input(query, reports);
    let raw = match runtime.run(AgentKind::Synthesis, &input).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(query = %query, error = %e, "Synthesis agent failed");
            return zero_confidence(&e.to_string(), reports);
        }
    };

    let wire: SynthesisWire = match parse_structured(&raw) {
        Ok(wire) => wire,
        Err(e) => {
            tracing::warn!(query = %query, error = %e, "Synthesis output unparseable");
            return zero_confidence(&e.to_string(), reports);
        }
    };

    ValidatedResearch {
        score: AgreementScore::from_model_value(wire.similarity_score),
        research: wire.combined_research,
        location: normalize_location(wire.location),
        citations: dedup_citations(reports),
        synthesized: true,
    }
}
