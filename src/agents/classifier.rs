//! Guardrail classification stage
//!
//! Two guardrail variants share one [`Verdict`] type: the coarse guardrail
//! decides validity and travel-relatedness; the fine guardrail (explore mode)
//! adds plan-relatedness and a travel sub-type. Invariants on the verdict are
//! enforced here at the parse boundary, not trusted from the model.
//!
//! A failing or malformed classifier call is a typed
//! [`AppError::ClassifierUnavailable`], never a silent `false` verdict.

use crate::agents::{AgentKind, AgentRuntime, parse_structured};
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Safety category attached to a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyReason {
    Clean,
    Toxicity,
    Hate,
    Threat,
    Sexual,
    PromptInjection,
    /// Unrecognized category reported by the model
    #[serde(other)]
    PolicyViolation,
}

impl SafetyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "CLEAN",
            Self::Toxicity => "TOXICITY",
            Self::Hate => "HATE",
            Self::Threat => "THREAT",
            Self::Sexual => "SEXUAL",
            Self::PromptInjection => "PROMPT_INJECTION",
            Self::PolicyViolation => "POLICY_VIOLATION",
        }
    }
}

impl std::fmt::Display for SafetyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explore-mode travel sub-type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TravelType {
    #[serde(rename = "general-travel-query")]
    GeneralTravelQuery,
    #[serde(rename = "specific-search-query")]
    SpecificSearchQuery,
    #[default]
    #[serde(other, rename = "none")]
    None,
}

/// Immutable result of one classifier invocation.
///
/// Coarse verdicts carry `is_plan_related = false` and `travel_type = None`;
/// the selector never consults those fields outside explore mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub is_valid: bool,
    pub reason: SafetyReason,
    pub solution: String,
    pub is_travel_related: bool,
    pub is_plan_related: bool,
    pub travel_type: TravelType,
}

impl Verdict {
    /// Enforce verdict invariants:
    /// - an invalid verdict carries no meaningful travel-intent fields
    /// - `travel_type` other than `None` requires `is_travel_related`
    fn normalized(mut self) -> Self {
        if !self.is_valid {
            self.is_travel_related = false;
            self.is_plan_related = false;
            self.travel_type = TravelType::None;
        }
        if !self.is_travel_related {
            self.travel_type = TravelType::None;
        }
        self
    }
}

#[derive(Debug, Deserialize)]
struct CoarseWire {
    #[serde(rename = "isValid")]
    is_valid: bool,
    #[serde(default)]
    reason: Option<SafetyReason>,
    #[serde(default)]
    solution: Option<String>,
    #[serde(rename = "isTravelRelated", default)]
    is_travel_related: bool,
}

#[derive(Debug, Deserialize)]
struct FineWire {
    #[serde(rename = "isValid")]
    is_valid: bool,
    #[serde(default)]
    reason: Option<SafetyReason>,
    #[serde(default)]
    solution: Option<String>,
    #[serde(rename = "isTravelRelated", default)]
    is_travel_related: bool,
    #[serde(rename = "isPlanRelated", default)]
    is_plan_related: bool,
    #[serde(default)]
    travel_type: TravelType,
}

/// Run the coarse guardrail over the raw user text.
///
/// Only the user's own words go to a guardrail. Retrieved context and tool
/// output must never be concatenated into classifier input.
pub async fn classify(runtime: &dyn AgentRuntime, message: &str) -> AppResult<Verdict> {
    let raw = runtime
        .run(AgentKind::Guardrail, message)
        .await
        .map_err(|e| AppError::ClassifierUnavailable(e.to_string()))?;

    let wire: CoarseWire =
        parse_structured(&raw).map_err(|e| AppError::ClassifierUnavailable(e.to_string()))?;

    Ok(Verdict {
        is_valid: wire.is_valid,
        reason: wire.reason.unwrap_or(SafetyReason::Clean),
        solution: wire.solution.unwrap_or_default(),
        is_travel_related: wire.is_travel_related,
        is_plan_related: false,
        travel_type: TravelType::None,
    }
    .normalized())
}

/// Run the fine guardrail (explore mode) over the raw user text.
pub async fn classify_fine(runtime: &dyn AgentRuntime, message: &str) -> AppResult<Verdict> {
    let raw = runtime
        .run(AgentKind::TravelGuardrail, message)
        .await
        .map_err(|e| AppError::ClassifierUnavailable(e.to_string()))?;

    let wire: FineWire =
        parse_structured(&raw).map_err(|e| AppError::ClassifierUnavailable(e.to_string()))?;

    Ok(Verdict {
        is_valid: wire.is_valid,
        reason: wire.reason.unwrap_or(SafetyReason::Clean),
        solution: wire.solution.unwrap_or_default(),
        is_travel_related: wire.is_travel_related,
        is_plan_related: wire.is_plan_related,
        travel_type: wire.travel_type,
    }
    .normalized())
}
