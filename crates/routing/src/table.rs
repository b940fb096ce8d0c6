//! The route table: (intent, chat scope) → capability owner.

use kickoff_capabilities::CapabilityTable;
use kickoff_capabilities::builtin::TEAM_ADMINISTRATOR;
use kickoff_config::{ConfigError, RouteRuleConfig};
use kickoff_core::error::RoutingError;
use kickoff_core::scope::ChatScope;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::intent::{CATALOG, spec};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteRule {
    pub intent: String,
    /// `None` matches every chat scope.
    pub chat_scope: Option<ChatScope>,
    pub owner: String,
    pub gate: Option<String>,
}

impl RouteRule {
    pub fn new(intent: &str, owner: &str) -> Self {
        Self {
            intent: intent.to_string(),
            chat_scope: None,
            owner: owner.to_string(),
            gate: None,
        }
    }

    pub fn in_scope(mut self, scope: ChatScope) -> Self {
        self.chat_scope = Some(scope);
        self
    }

    pub fn gated(mut self, capability: &str) -> Self {
        self.gate = Some(capability.to_string());
        self
    }
}

type Key = (String, Option<ChatScope>);

/// Rules keyed by (intent, scope). A later rule for the same key replaces
/// the earlier one.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: BTreeMap<Key, RouteRule>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// One generic rule per catalog intent, plus the scope-specific ones.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for spec in CATALOG {
            let mut rule = RouteRule::new(spec.name, spec.owner);
            rule.gate = spec.gate.map(str::to_string);
            table.insert(rule);
        }
        // In the leadership chat, roster questions go to the administrators.
        table.insert(
            RouteRule::new("list_players", TEAM_ADMINISTRATOR)
                .in_scope(ChatScope::Restricted)
                .gated("list-active-players"),
        );
        table
    }

    pub fn insert(&mut self, rule: RouteRule) {
        self.rules
            .insert((rule.intent.clone(), rule.chat_scope), rule);
    }

    /// Add configured rules on top of this table.
    pub fn with_config(mut self, rules: &[RouteRuleConfig]) -> Result<Self, ConfigError> {
        for rule in rules {
            self.insert(RouteRule {
                intent: rule.intent.clone(),
                chat_scope: rule.scope()?,
                owner: rule.owner.clone(),
                gate: rule.capability.clone(),
            });
        }
        Ok(self)
    }

    /// The most specific rule for (intent, scope): scope-bound beats generic.
    pub fn lookup(&self, intent: &str, scope: ChatScope) -> Option<&RouteRule> {
        self.rules
            .get(&(intent.to_string(), Some(scope)))
            .or_else(|| self.rules.get(&(intent.to_string(), None)))
    }

    pub fn rules(&self) -> impl Iterator<Item = &RouteRule> {
        self.rules.values()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Check every rule against the intent catalog and the capability table.
    pub fn validate(&self, capabilities: &CapabilityTable) -> Result<(), RoutingError> {
        for rule in self.rules.values() {
            if spec(&rule.intent).is_none() {
                return Err(RoutingError::UnknownIntent(rule.intent.clone()));
            }
            if !capabilities.has_owner(&rule.owner) {
                return Err(RoutingError::UnknownOwner {
                    intent: rule.intent.clone(),
                    owner: rule.owner.clone(),
                });
            }
            if let Some(gate) = &rule.gate {
                let held = capabilities
                    .get_capabilities_for(&rule.owner)
                    .iter()
                    .any(|c| &c.name == gate);
                if !held {
                    return Err(RoutingError::GateNotOwned {
                        intent: rule.intent.clone(),
                        capability: gate.clone(),
                        owner: rule.owner.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
