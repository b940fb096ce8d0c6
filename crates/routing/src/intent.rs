//! Intent catalog and classifier.
//!
//! Structured input resolves through an exact command token; free text goes
//! through keyword patterns checked in catalog order, first match wins. The
//! same catalog feeds `/help` output and the route table, so a command and
//! its example phrases always describe one intent.

use kickoff_capabilities::builtin::{
    FINANCE_MANAGER, HELP_ASSISTANT, PLAYER_COORDINATOR, SQUAD_SELECTOR, TEAM_ADMINISTRATOR,
};
use kickoff_core::error::RoutingError;
use regex_lite::Regex;
use serde::Serialize;

/// Intent assigned when nothing matches.
pub const UNKNOWN_INTENT: &str = "unknown";

/// One catalog entry.
#[derive(Debug, Clone, Copy)]
pub struct IntentSpec {
    pub name: &'static str,
    /// Slash command token, without the slash.
    pub command: &'static str,
    pub summary: &'static str,
    /// Case-insensitive keyword patterns for free text.
    pub patterns: &'static [&'static str],
    /// Free-text phrasings that must classify as this intent.
    pub examples: &'static [&'static str],
    /// Owner that handles this intent in any chat.
    pub owner: &'static str,
    /// Capability whose permission decides whether the request is allowed.
    pub gate: Option<&'static str>,
}

/// Catalog order is match order: narrower phrasings come first.
pub const CATALOG: &[IntentSpec] = &[
    IntentSpec {
        name: "help",
        command: "help",
        summary: "Show the commands available to you",
        patterns: &[r"\bhelp\b", r"\bwhat can (you|i) do\b", r"\b(list|show)\b.*\bcommands\b"],
        examples: &["help", "what can you do?", "show me the commands"],
        owner: HELP_ASSISTANT,
        gate: None,
    },
    IntentSpec {
        name: "my_status",
        command: "status",
        summary: "Your registration and availability status",
        patterns: &[r"\bmy (status|registration)\b", r"\bam i (registered|approved|active)\b"],
        examples: &["what's my status?", "am I registered?"],
        owner: PLAYER_COORDINATOR,
        gate: Some("get-self-status"),
    },
    IntentSpec {
        name: "my_balance",
        command: "balance",
        summary: "What you owe the team",
        patterns: &[r"\bmy balance\b", r"\bdo i owe\b", r"\bhave i paid\b"],
        examples: &["what's my balance", "how much do I owe?"],
        owner: FINANCE_MANAGER,
        gate: Some("get-payment-status"),
    },
    IntentSpec {
        name: "update_profile",
        command: "update",
        summary: "Change your own profile",
        patterns: &[r"\b(update|change|set)\b.*\bmy\b"],
        examples: &["update my position to defender", "change my phone number"],
        owner: PLAYER_COORDINATOR,
        gate: Some("update-self"),
    },
    IntentSpec {
        name: "mark_availability",
        command: "available",
        summary: "Tell the selectors whether you can play",
        patterns: &[
            r"\bi('m| am) (available|unavailable)\b",
            r"\bmark me\b",
            r"\bcan'?t play\b",
        ],
        examples: &["I'm available for saturday", "mark me unavailable", "I can't play next week"],
        owner: SQUAD_SELECTOR,
        gate: Some("mark-availability"),
    },
    IntentSpec {
        name: "select_squad",
        command: "squad",
        summary: "Pick the squad for a fixture",
        patterns: &[r"\b(select|pick|choose)\b.*\b(squad|team|lineup)\b"],
        examples: &["pick the squad for saturday", "select the lineup"],
        owner: SQUAD_SELECTOR,
        gate: Some("select-squad"),
    },
    IntentSpec {
        name: "list_all",
        command: "all",
        summary: "Every player record, including pending ones",
        patterns: &[
            r"\b(all|every)\b.*\b(records|entities|registrations)\b",
            r"\bpending\b.*\b(players|registrations|members)\b",
        ],
        examples: &["show all registrations", "list pending players"],
        owner: TEAM_ADMINISTRATOR,
        gate: Some("list-all-entities"),
    },
    IntentSpec {
        name: "assign_role",
        command: "promote",
        summary: "Grant a role to a member",
        patterns: &[
            r"\bpromote\b",
            r"\bassign\b.*\brole\b",
            r"\bmake\b.*\b(admin|administrator|coach|coordinator)\b",
        ],
        examples: &["promote alice to coach", "make bob an admin", "assign a role to carol"],
        owner: TEAM_ADMINISTRATOR,
        gate: Some("assign-role"),
    },
    IntentSpec {
        name: "remove_member",
        command: "remove",
        summary: "Remove a member from the team",
        patterns: &[r"\b(remove|kick)\b"],
        examples: &["remove dave from the team", "kick erin"],
        owner: TEAM_ADMINISTRATOR,
        gate: Some("remove-member"),
    },
    IntentSpec {
        name: "approve_player",
        command: "approve",
        summary: "Approve a pending registration",
        patterns: &[r"\bapprove\b"],
        examples: &["approve frank"],
        owner: TEAM_ADMINISTRATOR,
        gate: Some("approve-player"),
    },
    IntentSpec {
        name: "add_player",
        command: "add",
        summary: "Register a new player",
        patterns: &[r"\b(add|register)\b.*\b(player|member)\b"],
        examples: &["add a new player called gina", "register player hank"],
        owner: TEAM_ADMINISTRATOR,
        gate: Some("add-player"),
    },
    IntentSpec {
        name: "payments",
        command: "payments",
        summary: "Payments recorded for the team",
        patterns: &[r"\b(payments|fees|transactions)\b", r"\bwho('s| has)? paid\b"],
        examples: &["show payments", "who has paid?"],
        owner: FINANCE_MANAGER,
        gate: Some("list-payments"),
    },
    IntentSpec {
        name: "record_payment",
        command: "paid",
        summary: "Record a payment from a player",
        patterns: &[r"\brecord\b.*\bpayment\b", r"\b\w+ (has )?paid\b"],
        examples: &["record a payment from ivan", "jack paid 20"],
        owner: FINANCE_MANAGER,
        gate: Some("record-payment"),
    },
    IntentSpec {
        name: "player_status",
        command: "player",
        summary: "Status of one named player",
        patterns: &[r"\bstatus of\b", r"\bis \w+ (registered|approved|active)\b"],
        examples: &["status of alice", "is bob registered?"],
        owner: PLAYER_COORDINATOR,
        gate: Some("get-player-status"),
    },
    IntentSpec {
        name: "list_players",
        command: "players",
        summary: "Players currently active in the team",
        patterns: &[r"\b(players|members|squad)\b", r"\bwho('s| is) (in|on) the team\b"],
        examples: &["list the players", "who is on the team?", "show members"],
        owner: PLAYER_COORDINATOR,
        gate: Some("list-active-players"),
    },
    IntentSpec {
        name: "list_matches",
        command: "matches",
        summary: "Upcoming and recent fixtures",
        patterns: &[r"\b(matches|fixtures|games)\b", r"\bnext (match|game)\b"],
        examples: &["upcoming fixtures", "when is the next match?"],
        owner: SQUAD_SELECTOR,
        gate: Some("list-matches"),
    },
];

pub fn spec(name: &str) -> Option<&'static IntentSpec> {
    CATALOG.iter().find(|s| s.name == name)
}

/// How an intent was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentSource {
    Command,
    Pattern,
    Unmatched,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Intent {
    pub name: String,
    pub source: IntentSource,
}

impl Intent {
    fn unmatched() -> Self {
        Self {
            name: UNKNOWN_INTENT.to_string(),
            source: IntentSource::Unmatched,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.source == IntentSource::Unmatched
    }
}

/// Extract the command token from `/cmd@BotName args`.
pub fn command_token(text: &str) -> Option<String> {
    let rest = text.trim_start().strip_prefix('/')?;
    let word = rest.split_whitespace().next()?;
    let token = word.split('@').next().unwrap_or(word);
    if token.is_empty() {
        None
    } else {
        Some(token.to_ascii_lowercase())
    }
}

struct Compiled {
    spec: &'static IntentSpec,
    patterns: Vec<Regex>,
}

/// Compiled classifier over [`CATALOG`].
pub struct IntentClassifier {
    intents: Vec<Compiled>,
}

impl IntentClassifier {
    pub fn new() -> Result<Self, RoutingError> {
        let intents = CATALOG
            .iter()
            .map(|spec| {
                let patterns = spec
                    .patterns
                    .iter()
                    .map(|p| {
                        Regex::new(&format!("(?i){p}")).map_err(|e| RoutingError::InvalidPattern {
                            intent: spec.name.to_string(),
                            reason: e.to_string(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Compiled { spec, patterns })
            })
            .collect::<Result<Vec<_>, RoutingError>>()?;
        Ok(Self { intents })
    }

    /// Classify one message.
    ///
    /// Structured input is resolved by command token only; an unknown command
    /// is unmatched rather than reinterpreted as free text.
    pub fn classify(&self, text: &str, is_structured: bool) -> Intent {
        if is_structured || text.trim_start().starts_with('/') {
            return match command_token(text) {
                Some(token) => self
                    .intents
                    .iter()
                    .find(|c| c.spec.command == token)
                    .map(|c| Intent {
                        name: c.spec.name.to_string(),
                        source: IntentSource::Command,
                    })
                    .unwrap_or_else(Intent::unmatched),
                None => Intent::unmatched(),
            };
        }

        self.intents
            .iter()
            .find(|c| c.patterns.iter().any(|re| re.is_match(text)))
            .map(|c| Intent {
                name: c.spec.name.to_string(),
                source: IntentSource::Pattern,
            })
            .unwrap_or_else(Intent::unmatched)
    }

    pub fn specs(&self) -> impl Iterator<Item = &'static IntentSpec> + '_ {
        self.intents.iter().map(|c| c.spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn classifier() -> IntentClassifier {
        IntentClassifier::new().unwrap()
    }

    #[test]
    fn catalog_names_and_commands_are_unique() {
        let names: HashSet<_> = CATALOG.iter().map(|s| s.name).collect();
        let commands: HashSet<_> = CATALOG.iter().map(|s| s.command).collect();
        assert_eq!(names.len(), CATALOG.len());
        assert_eq!(commands.len(), CATALOG.len());
        assert!(!names.contains(UNKNOWN_INTENT));
    }

    #[test]
    fn every_example_classifies_as_its_intent() {
        let c = classifier();
        for spec in CATALOG {
            assert!(!spec.examples.is_empty(), "{} has no examples", spec.name);
            for example in spec.examples {
                let intent = c.classify(example, false);
                assert_eq!(intent.name, spec.name, "example {example:?}");
                assert_eq!(intent.source, IntentSource::Pattern);
            }
        }
    }

    #[test]
    fn every_command_classifies_as_its_intent() {
        let c = classifier();
        for spec in CATALOG {
            let intent = c.classify(&format!("/{}", spec.command), true);
            assert_eq!(intent.name, spec.name);
            assert_eq!(intent.source, IntentSource::Command);
        }
    }

    #[test]
    fn bot_suffix_and_arguments_are_ignored() {
        assert_eq!(command_token("/Players@KickoffBot now").as_deref(), Some("players"));
        assert_eq!(command_token("  /status"), Some("status".to_string()));
        assert_eq!(command_token("/"), None);
        assert_eq!(command_token("players"), None);
    }

    #[test]
    fn unknown_command_is_unmatched_not_free_text() {
        let c = classifier();
        // "players" would match free text, but this is a structured command.
        let intent = c.classify("/teleport players", true);
        assert!(intent.is_unknown());
    }

    #[test]
    fn unmatched_free_text() {
        let c = classifier();
        assert!(c.classify("lovely weather today", false).is_unknown());
    }

    #[test]
    fn free_text_is_case_insensitive() {
        let c = classifier();
        assert_eq!(c.classify("WHO IS ON THE TEAM", false).name, "list_players");
    }
}
