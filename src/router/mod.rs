//! Response strategy selection
//!
//! Maps a classification verdict plus the request's routing mode to exactly
//! one response strategy. This is a pure decision function; everything
//! network-bound lives elsewhere.

use crate::agents::classifier::{SafetyReason, TravelType, Verdict};
use serde::{Deserialize, Serialize};

/// Routing mode carried by the request's `param` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteMode {
    Default,
    Explore,
}

impl RouteMode {
    /// Any `param` other than "explore" selects default routing
    pub fn from_param(param: &str) -> Self {
        if param == "explore" {
            Self::Explore
        } else {
            Self::Default
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Explore => "explore",
        }
    }
}

/// Which structured extraction to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    TripPlan,
    ExploreFilter,
}

/// The selected response strategy for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePlan {
    /// Policy rejection, streamed as apology frames
    Reject {
        reason: SafetyReason,
        solution: String,
    },
    /// One-shot structured extraction
    Structured(Extraction),
    /// Free-form streamed conversation
    Stream,
}

/// Decide the response strategy.
///
/// An invalid verdict rejects unconditionally; travel-intent fields are never
/// consulted. In explore mode plan-relatedness takes priority over the
/// sub-intent type — a deliberate business rule, pinned down by tests.
pub fn select_response(verdict: &Verdict, mode: RouteMode) -> ResponsePlan {
    if !verdict.is_valid {
        return ResponsePlan::Reject {
            reason: verdict.reason,
            solution: verdict.solution.clone(),
        };
    }

    match mode {
        RouteMode::Explore => {
            if verdict.is_plan_related {
                ResponsePlan::Structured(Extraction::TripPlan)
            } else if verdict.is_travel_related
                && verdict.travel_type == TravelType::SpecificSearchQuery
            {
                ResponsePlan::Structured(Extraction::ExploreFilter)
            } else {
                ResponsePlan::Stream
            }
        }
        RouteMode::Default => {
            if verdict.is_travel_related {
                ResponsePlan::Structured(Extraction::TripPlan)
            } else {
                ResponsePlan::Stream
            }
        }
    }
}
