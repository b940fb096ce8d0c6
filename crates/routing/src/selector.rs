//! Capability-owner selection.
//!
//! Every request gets exactly one owner. Unmatched intents, and intents with
//! no rule for the chat scope, go to the fallback owner.

use kickoff_config::RoutingConfig;
use kickoff_core::context::ExecutionContext;
use kickoff_core::error::Error;
use kickoff_core::scope::ChatScope;
use serde::Serialize;
use tracing::debug;

use crate::intent::{Intent, IntentClassifier, IntentSource};
use crate::table::RouteTable;

/// The outcome of routing one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub intent: Intent,
    pub owner: String,
    pub gate: Option<String>,
    pub fallback: bool,
}

pub struct OwnerSelector {
    classifier: IntentClassifier,
    table: RouteTable,
    fallback_owner: String,
}

impl OwnerSelector {
    pub fn new(classifier: IntentClassifier, table: RouteTable, fallback_owner: impl Into<String>) -> Self {
        Self {
            classifier,
            table,
            fallback_owner: fallback_owner.into(),
        }
    }

    /// Built-in catalog and routes, extended by configuration.
    pub fn from_config(config: &RoutingConfig) -> Result<Self, Error> {
        let table = RouteTable::builtin()
            .with_config(&config.rules)
            .map_err(|e| Error::Config {
                message: e.to_string(),
            })?;
        Ok(Self::new(IntentClassifier::new()?, table, &config.fallback_owner))
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn fallback_owner(&self) -> &str {
        &self.fallback_owner
    }

    /// Route raw input. Deterministic in (text, structured flag, scope).
    pub fn select(&self, text: &str, is_structured: bool, scope: ChatScope) -> Selection {
        let intent = self.classifier.classify(text, is_structured);
        let selection = match self.table.lookup(&intent.name, scope) {
            Some(rule) if intent.source != IntentSource::Unmatched => Selection {
                owner: rule.owner.clone(),
                gate: rule.gate.clone(),
                fallback: false,
                intent,
            },
            _ => Selection {
                owner: self.fallback_owner.clone(),
                gate: None,
                fallback: true,
                intent,
            },
        };
        debug!(
            intent = %selection.intent.name,
            owner = %selection.owner,
            fallback = selection.fallback,
            chat_scope = %scope,
            "Owner selected"
        );
        selection
    }

    pub fn select_for(&self, context: &ExecutionContext) -> Selection {
        self.select(context.text(), context.is_structured_command(), context.chat_scope())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::CATALOG;
    use kickoff_capabilities::builtin::{MESSAGE_PROCESSOR, TEAM_ADMINISTRATOR};

    fn selector() -> OwnerSelector {
        OwnerSelector::from_config(&RoutingConfig::default()).unwrap()
    }

    #[test]
    fn structured_and_free_text_route_to_same_owner() {
        let selector = selector();
        for rule in selector.table().rules() {
            let spec = crate::intent::spec(&rule.intent).unwrap();
            let scopes: Vec<ChatScope> = match rule.chat_scope {
                Some(scope) => vec![scope],
                None => ChatScope::ALL.to_vec(),
            };
            for scope in scopes {
                let structured = selector.select(&format!("/{}", spec.command), true, scope);
                for example in spec.examples {
                    let free = selector.select(example, false, scope);
                    assert_eq!(
                        structured.owner, free.owner,
                        "/{} vs {example:?} in {scope}",
                        spec.command
                    );
                    assert_eq!(structured.gate, free.gate);
                    assert_eq!(structured.intent.name, free.intent.name);
                }
            }
        }
    }

    #[test]
    fn every_catalog_intent_has_a_route() {
        let selector = selector();
        for spec in CATALOG {
            for scope in ChatScope::ALL {
                assert!(!selector.select(&format!("/{}", spec.command), true, scope).fallback);
            }
        }
    }

    #[test]
    fn unmatched_goes_to_fallback() {
        let selector = selector();
        let s = selector.select("lovely weather today", false, ChatScope::Open);
        assert!(s.fallback);
        assert_eq!(s.owner, MESSAGE_PROCESSOR);
        assert!(s.gate.is_none());

        let s = selector.select("/teleport", true, ChatScope::Open);
        assert_eq!(s.owner, MESSAGE_PROCESSOR);
    }

    #[test]
    fn restricted_chat_roster_goes_to_administrators() {
        let selector = selector();
        let s = selector.select("who is on the team?", false, ChatScope::Restricted);
        assert_eq!(s.owner, TEAM_ADMINISTRATOR);
        let s = selector.select("/players@KickoffBot", true, ChatScope::Restricted);
        assert_eq!(s.owner, TEAM_ADMINISTRATOR);
    }

    #[test]
    fn configured_fallback_owner_is_used() {
        let config = RoutingConfig {
            fallback_owner: "help_assistant".into(),
            ..RoutingConfig::default()
        };
        let selector = OwnerSelector::from_config(&config).unwrap();
        assert_eq!(selector.select("hmm", false, ChatScope::Open).owner, "help_assistant");
    }
}
