//! Validation verdicts: whether an answer is backed by the ledger.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A specific inconsistency between the answer and the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inconsistency {
    /// The answer lists several entities of a category no capability returned.
    UnbackedPluralListing {
        category: String,
        entities: Vec<String>,
    },
    /// Listed entities absent from every ledger result of their category.
    UnmatchedEntities {
        category: String,
        entities: Vec<String>,
    },
}

impl std::fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnbackedPluralListing { category, entities } => write!(
                f,
                "answer lists {} {category} entities ({}) but no {category} listing lookup was invoked",
                entities.len(),
                entities.join(", ")
            ),
            Self::UnmatchedEntities { category, entities } => write!(
                f,
                "{category} entities not present in any ledger result: {}",
                entities.join(", ")
            ),
        }
    }
}

/// The per-request verdict. Never persisted beyond the response cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub passed: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<Inconsistency>,

    /// The known single-entity shape the answer matched, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_shape: Option<String>,

    /// Number of plural listings found in the answer.
    #[serde(default)]
    pub listings_checked: usize,
}

impl ValidationVerdict {
    pub fn pass() -> Self {
        Self {
            passed: true,
            reasons: Vec::new(),
            matched_shape: None,
            listings_checked: 0,
        }
    }

    pub fn fail(reasons: Vec<Inconsistency>) -> Self {
        Self {
            passed: false,
            reasons,
            matched_shape: None,
            listings_checked: 0,
        }
    }

    pub fn is_pass(&self) -> bool {
        self.passed
    }

    pub fn to_error(&self) -> Option<ValidationError> {
        if self.passed {
            return None;
        }
        Some(ValidationError::Failed {
            reasons: self.reasons.iter().map(ToString::to_string).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failing_verdict_converts_to_error() {
        let verdict = ValidationVerdict::fail(vec![Inconsistency::UnbackedPluralListing {
            category: "player".into(),
            entities: vec!["Bob".into(), "Carol".into()],
        }]);
        let err = verdict.to_error().unwrap();
        let text = err.to_string();
        assert!(text.contains("Bob, Carol"));
        assert!(text.contains("no player listing lookup"));
        assert!(ValidationVerdict::pass().to_error().is_none());
    }
}
