//! The consistency validator.
//!
//! Checks a final answer against the ledger of capability calls that
//! produced it. The check is asymmetric:
//! - A plural listing of a category needs a `many` lookup of that category
//!   in the ledger, otherwise the verdict fails
//! - Anything else passes, and a known single-entity shape or self-referential
//!   phrasing is recorded on the verdict

use kickoff_capabilities::CapabilityTable;
use kickoff_config::ValidationConfig;
use kickoff_core::capability::Cardinality;
use kickoff_core::error::Error;
use kickoff_core::ledger::{InvocationRecord, Ledger};
use kickoff_core::verdict::{Inconsistency, ValidationVerdict};
use std::collections::BTreeSet;
use tracing::debug;

use crate::extract::{Extractor, Listing};
use crate::shapes::{SELF_REFERENCE, ShapeMatcher};
use crate::vocabulary::Vocabulary;

pub struct ConsistencyValidator {
    vocabulary: Vocabulary,
    extractor: Extractor,
    shapes: ShapeMatcher,
    strict_entity_matching: bool,
    enabled: bool,
}

impl ConsistencyValidator {
    pub fn new(vocabulary: Vocabulary) -> Result<Self, Error> {
        let internal = |e: regex_lite::Error| Error::Internal(format!("validator pattern: {e}"));
        Ok(Self {
            vocabulary,
            extractor: Extractor::new().map_err(internal)?,
            shapes: ShapeMatcher::new().map_err(internal)?,
            strict_entity_matching: false,
            enabled: true,
        })
    }

    pub fn from_config(config: &ValidationConfig) -> Result<Self, Error> {
        let mut validator = Self::new(Vocabulary::builtin().with_config(&config.categories))?;
        validator.strict_entity_matching = config.strict_entity_matching;
        validator.enabled = config.enabled;
        Ok(validator)
    }

    /// Also require every listed entity to appear in a backing lookup's result.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_entity_matching = strict;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Judge `answer` against `ledger`. Result shapes come from `capabilities`.
    pub fn validate(&self, answer: &str, ledger: &Ledger, capabilities: &CapabilityTable) -> ValidationVerdict {
        if !self.enabled {
            return ValidationVerdict::pass();
        }

        let listings = self.extractor.listings(answer, &self.vocabulary);
        let reasons: Vec<Inconsistency> = listings
            .iter()
            .filter_map(|listing| self.check_listing(listing, ledger, capabilities))
            .collect();

        let mut verdict = if reasons.is_empty() {
            let mut verdict = ValidationVerdict::pass();
            verdict.matched_shape = self
                .shapes
                .matched(answer)
                .or_else(|| self.shapes.is_self_referential(answer).then_some(SELF_REFERENCE))
                .map(str::to_string);
            verdict
        } else {
            ValidationVerdict::fail(reasons)
        };
        verdict.listings_checked = listings.len();

        debug!(
            passed = verdict.passed,
            listings = verdict.listings_checked,
            invocations = ledger.len(),
            matched_shape = verdict.matched_shape.as_deref().unwrap_or("-"),
            "Answer validated"
        );
        verdict
    }

    fn check_listing(
        &self,
        listing: &Listing,
        ledger: &Ledger,
        capabilities: &CapabilityTable,
    ) -> Option<Inconsistency> {
        let backing: Vec<&InvocationRecord> = ledger
            .iter()
            .filter(|record| {
                capabilities.result_shape(&record.capability).is_some_and(|shape| {
                    shape.category == listing.category && shape.cardinality == Cardinality::Many
                })
            })
            .collect();

        if backing.is_empty() {
            return Some(Inconsistency::UnbackedPluralListing {
                category: listing.category.clone(),
                entities: listing.entities.clone(),
            });
        }
        if !self.strict_entity_matching {
            return None;
        }

        let mut known = BTreeSet::new();
        for record in &backing {
            collect_strings(&record.result, &mut known);
        }
        let unmatched: Vec<String> = listing
            .entities
            .iter()
            .filter(|entity| {
                let entity = entity.to_lowercase();
                !known.iter().any(|k| k.contains(&entity))
            })
            .cloned()
            .collect();

        (!unmatched.is_empty()).then(|| Inconsistency::UnmatchedEntities {
            category: listing.category.clone(),
            entities: unmatched,
        })
    }
}

/// Every string in a JSON value, lowercased.
fn collect_strings(value: &serde_json::Value, out: &mut BTreeSet<String>) {
    match value {
        serde_json::Value::String(s) => {
            out.insert(s.to_lowercase());
        }
        serde_json::Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        serde_json::Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kickoff_capabilities::{BuiltinSource, CapabilityRegistry, DEFAULT_MAX_PER_OWNER};
    use serde_json::json;
    use std::sync::Arc;

    fn capabilities() -> Arc<CapabilityTable> {
        CapabilityRegistry::from_sources(&[&BuiltinSource], DEFAULT_MAX_PER_OWNER)
            .unwrap()
            .snapshot()
    }

    fn ledger(calls: &[(&str, serde_json::Value)]) -> Ledger {
        calls
            .iter()
            .map(|(capability, result)| InvocationRecord {
                capability: capability.to_string(),
                params: json!({"team_scope_id": "KTI"}),
                result: result.clone(),
                timestamp: Utc::now(),
            })
            .collect()
    }

    fn validator() -> ConsistencyValidator {
        ConsistencyValidator::new(Vocabulary::builtin()).unwrap()
    }

    #[test]
    fn single_entity_answer_backed_by_lookup_passes() {
        let ledger = ledger(&[("get-self-status", json!({"name": "Alice", "status": "pending"}))]);
        let verdict = validator().validate("Name: Alice, Status: pending", &ledger, &capabilities());
        assert!(verdict.is_pass());
        assert_eq!(verdict.matched_shape.as_deref(), Some("player_status"));
    }

    #[test]
    fn plural_listing_without_listing_lookup_fails() {
        let ledger = ledger(&[("get-self-status", json!({"name": "Alice"}))]);
        let verdict = validator().validate("Active members: Alice, Bob, Carol", &ledger, &capabilities());
        assert!(!verdict.is_pass());
        assert_eq!(verdict.listings_checked, 1);
        match &verdict.reasons[0] {
            Inconsistency::UnbackedPluralListing { category, entities } => {
                assert_eq!(category, "player");
                assert_eq!(entities, &vec!["Alice".to_string(), "Bob".into(), "Carol".into()]);
            }
            other => panic!("Unexpected reason: {other:?}"),
        }
    }

    #[test]
    fn plural_listing_with_empty_ledger_fails() {
        let text = "Upcoming fixtures:\n- Rovers\n- United";
        let verdict = validator().validate(text, &Ledger::new(), &capabilities());
        assert!(!verdict.is_pass());
    }

    #[test]
    fn loose_listing_with_empty_ledger_fails() {
        let text = "Active players:\n\n- Alice\n\n- Bob\n\n- Carol";
        let verdict = validator().validate(text, &Ledger::new(), &capabilities());
        assert!(!verdict.is_pass());
        assert_eq!(verdict.listings_checked, 1);
    }

    #[test]
    fn known_shape_passes_with_empty_ledger() {
        let verdict = validator().validate("Name: Alice, Status: pending", &Ledger::new(), &capabilities());
        assert!(verdict.is_pass());
        assert_eq!(verdict.matched_shape.as_deref(), Some("player_status"));
    }

    #[test]
    fn self_referential_answer_passes_with_empty_ledger() {
        let verdict = validator().validate(
            "Your registration is still pending approval.",
            &Ledger::new(),
            &capabilities(),
        );
        assert!(verdict.is_pass());
        assert_eq!(verdict.matched_shape.as_deref(), Some(SELF_REFERENCE));
    }

    #[test]
    fn plural_listing_backed_by_listing_lookup_passes() {
        let ledger = ledger(&[(
            "list-active-players",
            json!([{"name": "Alice"}, {"name": "Bob"}, {"name": "Carol"}]),
        )]);
        let verdict = validator().validate("Active members: Alice, Bob, Carol", &ledger, &capabilities());
        assert!(verdict.is_pass());
        assert_eq!(verdict.listings_checked, 1);
    }

    #[test]
    fn listing_of_other_category_does_not_back() {
        let ledger = ledger(&[("list-matches", json!([{"opponent": "Rovers"}]))]);
        let verdict = validator().validate("Players: Alice, Bob", &ledger, &capabilities());
        assert!(!verdict.is_pass());
    }

    #[test]
    fn strict_matching_flags_invented_entities() {
        let ledger = ledger(&[(
            "list-active-players",
            json!({"players": [{"name": "Alice Smith"}, {"name": "Bob Jones"}]}),
        )]);
        let answer = "Active members: Alice, Bob, Zed";

        assert!(validator().validate(answer, &ledger, &capabilities()).is_pass());

        let verdict = validator().strict(true).validate(answer, &ledger, &capabilities());
        assert_eq!(
            verdict.reasons,
            vec![Inconsistency::UnmatchedEntities {
                category: "player".into(),
                entities: vec!["Zed".into()],
            }]
        );
    }

    #[test]
    fn disabled_validator_always_passes() {
        let config = ValidationConfig {
            enabled: false,
            ..ValidationConfig::default()
        };
        let validator = ConsistencyValidator::from_config(&config).unwrap();
        let verdict = validator.validate("Players: Alice, Bob", &Ledger::new(), &capabilities());
        assert!(verdict.is_pass());
    }

    #[test]
    fn configured_vocabulary_is_used() {
        let mut config = ValidationConfig::default();
        config
            .categories
            .insert("player".into(), vec!["goalkeepers".into()]);
        let validator = ConsistencyValidator::from_config(&config).unwrap();
        let verdict = validator.validate("Goalkeepers: Alice, Bob", &Ledger::new(), &capabilities());
        assert!(!verdict.is_pass());
    }
}
