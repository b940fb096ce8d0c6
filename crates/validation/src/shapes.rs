//! Known single-entity answer shapes.
//!
//! Answers about one entity ("Name: Alice, Status: pending") are commonly
//! produced from values inlined into the task description rather than from
//! a fresh lookup. They are accepted without ledger backing.

use regex_lite::Regex;
use std::collections::BTreeSet;

pub struct ShapeSpec {
    pub name: &'static str,
    /// Every field must be present; each field lists its accepted labels.
    pub fields: &'static [&'static [&'static str]],
}

const NAME: &[&str] = &["name", "player", "full name", "member"];
const STATUS: &[&str] = &["status", "registration", "registration status", "payment status"];

pub const SHAPES: &[ShapeSpec] = &[
    ShapeSpec {
        name: "player_status",
        fields: &[NAME, STATUS],
    },
    ShapeSpec {
        name: "player_profile",
        fields: &[NAME, &["position", "preferred position"]],
    },
    ShapeSpec {
        name: "match_summary",
        fields: &[&["opponent", "opposition", "vs", "against"], &["date", "kick-off", "kickoff", "when"]],
    },
    ShapeSpec {
        name: "payment_status",
        fields: &[&["amount", "balance", "due", "amount due", "owed"], STATUS],
    },
];

/// Shape name recorded for answers addressed to the requester.
pub const SELF_REFERENCE: &str = "self_reference";

pub struct ShapeMatcher {
    self_reference: Regex,
}

impl ShapeMatcher {
    pub fn new() -> Result<Self, regex_lite::Error> {
        Ok(Self {
            self_reference: Regex::new(r"(?i)\b(?:your|you are|you're|you have|you've)\b")?,
        })
    }

    /// The first known shape the answer's labeled fields complete.
    pub fn matched(&self, answer: &str) -> Option<&'static str> {
        let labels = field_labels(answer);
        SHAPES
            .iter()
            .find(|shape| {
                shape
                    .fields
                    .iter()
                    .all(|aliases| aliases.iter().any(|a| labels.contains(*a)))
            })
            .map(|shape| shape.name)
    }

    pub fn is_self_referential(&self, answer: &str) -> bool {
        self.self_reference.is_match(answer)
    }
}

/// Lowercased labels of `Label: value` fields.
fn field_labels(answer: &str) -> BTreeSet<String> {
    answer
        .split([',', ';', '\n', '|'])
        .filter_map(|segment| segment.split_once(':'))
        .map(|(label, _)| {
            label
                .trim()
                .trim_start_matches(['-', '*', '•', '#'])
                .trim_matches(|c: char| matches!(c, '*' | '_' | ' '))
                .to_lowercase()
        })
        .filter(|label| !label.is_empty())
        .collect()
}
