//! Research query classification
//!
//! Maps free text to `{generic, specific, ignore}` plus sub-queries. The
//! arity contract (5/1/0) is validated here in code; a violating response is
//! a typed failure, never silently coerced.

use crate::agents::{AgentKind, AgentRuntime, parse_structured};
use crate::research::ResearchError;
use serde::{Deserialize, Serialize};

/// Classification of one research query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Generic,
    Specific,
    Ignore,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Specific => "specific",
            Self::Ignore => "ignore",
        }
    }

    /// Number of sub-queries this kind must carry
    pub fn expected_arity(&self) -> usize {
        match self {
            Self::Generic => 5,
            Self::Specific => 1,
            Self::Ignore => 0,
        }
    }
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated classification result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: QueryKind,
    pub queries: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClassificationWire {
    #[serde(rename = "type")]
    kind: QueryKind,
    #[serde(default)]
    queries: Vec<String>,
}

/// Enforce the arity contract before any downstream fan-out
pub fn validate_arity(kind: QueryKind, count: usize) -> Result<(), ResearchError> {
    let expected = kind.expected_arity();
    if count != expected {
        return Err(ResearchError::ArityViolation {
            kind,
            expected,
            got: count,
        });
    }
    Ok(())
}

/// Classify a query via the research-classifier agent
pub async fn classify(
    runtime: &dyn AgentRuntime,
    query: &str,
) -> Result<Classification, ResearchError> {
    let raw = runtime
        .run(AgentKind::ResearchClassifier, query)
        .await
        .map_err(|e| ResearchError::Classifier(e.to_string()))?;

    let wire: ClassificationWire =
        parse_structured(&raw).map_err(|e| ResearchError::Classifier(e.to_string()))?;

    validate_arity(wire.kind, wire.queries.len())?;

    Ok(Classification {
        kind: wire.kind,
        queries: wire.queries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_requires_five() {
        assert!(validate_arity(QueryKind::Generic, 5).is_ok());
        for n in [0, 1, 4, 6] {
            let err = validate_arity(QueryKind::Generic, n).unwrap_err();
            assert!(matches!(
                err,
                ResearchError::ArityViolation {
                    kind: QueryKind::Generic,
                    expected: 5,
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_specific_requires_one() {
        assert!(validate_arity(QueryKind::Specific, 1).is_ok());
        assert!(validate_arity(QueryKind::Specific, 0).is_err());
        assert!(validate_arity(QueryKind::Specific, 2).is_err());
    }

    #[test]
    fn test_ignore_requires_zero() {
        assert!(validate_arity(QueryKind::Ignore, 0).is_ok());
        assert!(validate_arity(QueryKind::Ignore, 1).is_err());
    }

    #[test]
    fn test_wire_parse() {
        let wire: ClassificationWire = serde_json::from_str(
            r#"{"type": "specific", "queries": ["Best biryani in Karachi"]}"#,
        )
        .unwrap();
        assert_eq!(wire.kind, QueryKind::Specific);
        assert_eq!(wire.queries.len(), 1);
    }
}
