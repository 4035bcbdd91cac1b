//! Trip-plan extraction
//!
//! The model extracts; the orchestration layer then enforces the
//! date-consistency law and the feedback rule table post-hoc rather than
//! trusting the model's self-reported compliance.

use crate::agents::{AgentKind, AgentRuntime, parse_structured};
use crate::error::{AppError, AppResult};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

const DATE_FORMAT: &str = "%m-%d-%Y";

/// Traveler-count breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pax {
    #[serde(default)]
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub infants: u32,
    #[serde(default)]
    pub elderly: u32,
}

/// Structured trip-plan extraction target
///
/// Dates are `MM-dd-yyyy` on the wire and `NaiveDate` in memory so the
/// consistency law can be computed instead of string-matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripPlan {
    #[serde(default, with = "mm_dd_yyyy")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, with = "mm_dd_yyyy")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub num_days: Option<i64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub destinations: Vec<String>,
    #[serde(default)]
    pub pax: Option<Pax>,
    #[serde(default)]
    pub experience_types: Option<Vec<String>>,
    #[serde(default)]
    pub travel_style: Option<Vec<String>>,
    #[serde(default)]
    pub activities: Option<Vec<String>>,
    #[serde(default)]
    pub themes: Option<Vec<String>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub pois: Vec<String>,
    /// Field names still missing that the client should prompt for
    #[serde(default, deserialize_with = "null_as_empty")]
    pub feedback: Vec<String>,
}

mod mm_dd_yyyy {
    use super::DATE_FORMAT;
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        date: &Option<NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => serializer.serialize_str(&d.format(DATE_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Feedback rule table: each promptable field with the refusal phrases that
/// permanently exclude it from `feedback` even while null.
struct FieldRule {
    name: &'static str,
    refusals: &'static [&'static str],
    missing: fn(&TripPlan) -> bool,
}

const DATE_REFUSALS: &[&str] = &[
    "date unknown",
    "dates unknown",
    "no date",
    "no dates",
    "don't know when",
    "not sure when",
    "date tbd",
    "dates tbd",
    "haven't decided when",
    "no fixed date",
];

const FIELD_RULES: &[FieldRule] = &[
    FieldRule {
        name: "startDate",
        refusals: DATE_REFUSALS,
        missing: |p| p.start_date.is_none(),
    },
    FieldRule {
        name: "endDate",
        refusals: DATE_REFUSALS,
        missing: |p| p.end_date.is_none(),
    },
    FieldRule {
        name: "numDays",
        refusals: DATE_REFUSALS,
        missing: |p| p.num_days.is_none(),
    },
    FieldRule {
        name: "destinations",
        refusals: &["anywhere", "no destination yet", "not sure where"],
        missing: |p| p.destinations.is_empty(),
    },
    FieldRule {
        name: "pax",
        refusals: &["not sure how many", "don't know how many"],
        missing: |p| p.pax.is_none(),
    },
    FieldRule {
        name: "experienceTypes",
        refusals: &[],
        missing: |p| p.experience_types.as_ref().is_none_or(|v| v.is_empty()),
    },
    FieldRule {
        name: "travelStyle",
        refusals: &[],
        missing: |p| p.travel_style.as_ref().is_none_or(|v| v.is_empty()),
    },
    FieldRule {
        name: "activities",
        refusals: &[],
        missing: |p| p.activities.as_ref().is_none_or(|v| v.is_empty()),
    },
    FieldRule {
        name: "themes",
        refusals: &[],
        missing: |p| p.themes.as_ref().is_none_or(|v| v.is_empty()),
    },
    FieldRule {
        name: "pois",
        refusals: &[],
        missing: |p| p.pois.is_empty(),
    },
];

impl TripPlan {
    /// Apply the date-consistency law: any two known values of
    /// {startDate, endDate, numDays} determine the third. A fully known but
    /// inconsistent triple is logged and left untouched; nothing is guessed.
    pub fn reconcile_dates(&mut self) {
        match (self.start_date, self.end_date, self.num_days) {
            (Some(start), Some(end), None) => {
                if end >= start {
                    self.num_days = Some((end - start).num_days() + 1);
                }
            }
            (Some(start), None, Some(days)) if days >= 1 => {
                self.end_date = Some(start + Duration::days(days - 1));
            }
            (None, Some(end), Some(days)) if days >= 1 => {
                self.start_date = Some(end - Duration::days(days - 1));
            }
            (Some(start), Some(end), Some(days)) => {
                let implied = (end - start).num_days() + 1;
                if implied != days {
                    tracing::warn!(
                        start = %start,
                        end = %end,
                        num_days = days,
                        implied_days = implied,
                        "Inconsistent date triple extracted; leaving as reported"
                    );
                }
            }
            _ => {}
        }
    }

    /// Validate the feedback list against the rule table:
    /// - an entry must name a field that is currently missing
    /// - a field the user explicitly refused never appears, even while null
    /// - entries outside the catalog are dropped
    pub fn apply_feedback_rules(&mut self, message: &str) {
        let lowered = message.to_lowercase();
        let plan = self.clone();
        self.feedback.retain(|entry| {
            FIELD_RULES.iter().any(|rule| {
                rule.name == entry
                    && (rule.missing)(&plan)
                    && !rule.refusals.iter().any(|phrase| lowered.contains(phrase))
            })
        });
    }

    /// Post-extraction validation pass
    pub fn finalize(&mut self, message: &str) {
        self.reconcile_dates();
        self.apply_feedback_rules(message);
    }
}

/// Run trip-plan extraction over the raw message only.
///
/// Thread context is deliberately not concatenated: extraction reflects the
/// newest utterance layered onto structured state held client-side.
pub async fn extract(runtime: &dyn AgentRuntime, message: &str) -> AppResult<TripPlan> {
    let raw = runtime
        .run(AgentKind::TripExtraction, message)
        .await
        .map_err(|e| AppError::Extraction(e.to_string()))?;

    let mut plan: TripPlan =
        parse_structured(&raw).map_err(|e| AppError::Extraction(e.to_string()))?;
    plan.finalize(message);
    Ok(plan)
}
