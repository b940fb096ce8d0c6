//! The built-in team catalog.
//!
//! Six owners cover the day-to-day of running a team: help, player records,
//! administration, squad selection, finances, and a general-purpose fallback
//! that only borrows read-only lookups from the others.

use kickoff_core::capability::{
    Cardinality, CapabilityDescriptor, CapabilityOwner, ParamType, ParameterSpec,
};
use kickoff_core::error::RegistryError;

use crate::hygiene::SCOPE_KEY;
use crate::source::{CapabilitySource, Discovered};

pub const HELP_ASSISTANT: &str = "help_assistant";
pub const PLAYER_COORDINATOR: &str = "player_coordinator";
pub const TEAM_ADMINISTRATOR: &str = "team_administrator";
pub const SQUAD_SELECTOR: &str = "squad_selector";
pub const FINANCE_MANAGER: &str = "finance_manager";
pub const MESSAGE_PROCESSOR: &str = "message_processor";

/// Capabilities compiled into the binary.
pub struct BuiltinSource;

impl CapabilitySource for BuiltinSource {
    fn name(&self) -> &str {
        "builtin"
    }

    fn discover(&self) -> Result<Discovered, RegistryError> {
        Ok(Discovered {
            owners: owners(),
            capabilities: capabilities(),
        })
    }
}

fn owners() -> Vec<CapabilityOwner> {
    vec![
        CapabilityOwner::new(HELP_ASSISTANT, "Explain the available commands and how to use them"),
        CapabilityOwner::new(
            PLAYER_COORDINATOR,
            "Answer questions about players and keep their own records up to date",
        ),
        CapabilityOwner::new(
            TEAM_ADMINISTRATOR,
            "Manage membership, registrations and roles for the team",
        )
        .sharing(&["get-player-status", "list-active-players"]),
        CapabilityOwner::new(SQUAD_SELECTOR, "Handle fixtures, availability and squad selection")
            .sharing(&["list-active-players"]),
        CapabilityOwner::new(FINANCE_MANAGER, "Track fees and payments"),
        CapabilityOwner::new(
            MESSAGE_PROCESSOR,
            "Handle general team questions that no specialist claims",
        )
        .sharing(&[
            "get-self-status",
            "list-active-players",
            "get-available-commands",
            "list-matches",
        ]),
    ]
}

fn scope() -> ParameterSpec {
    ParameterSpec::context(SCOPE_KEY, ParamType::String)
}

fn requester() -> ParameterSpec {
    ParameterSpec::context("requester_id", ParamType::String)
}

fn capabilities() -> Vec<CapabilityDescriptor> {
    vec![
        // help
        CapabilityDescriptor::read("get-available-commands", HELP_ASSISTANT)
            .describe("List the commands available to the requester in this chat")
            .param(scope())
            .param(ParameterSpec::context("chat_scope", ParamType::String))
            .param(ParameterSpec::context("primary_role", ParamType::String)),
        CapabilityDescriptor::read("get-command-help", HELP_ASSISTANT)
            .describe("Explain how to use one command")
            .param(scope())
            .param(ParameterSpec::input(
                "command",
                ParamType::String,
                "The command to explain, without the leading slash",
            )),
        // players
        CapabilityDescriptor::read("get-self-status", PLAYER_COORDINATOR)
            .describe("Registration and availability status of the requester")
            .param(scope())
            .param(requester())
            .returns("player", Cardinality::Single),
        CapabilityDescriptor::read("get-player-status", PLAYER_COORDINATOR)
            .describe("Registration and availability status of one named player")
            .param(scope())
            .param(ParameterSpec::input(
                "player-name",
                ParamType::String,
                "Name of the player to look up",
            ))
            .returns("player", Cardinality::Single),
        CapabilityDescriptor::read("list-active-players", PLAYER_COORDINATOR)
            .describe("All players currently active in the team")
            .param(scope())
            .returns("player", Cardinality::Many),
        CapabilityDescriptor::write("update-self", PLAYER_COORDINATOR)
            .describe("Update the requester's own profile")
            .param(scope())
            .param(requester())
            .param(ParameterSpec::input(
                "field",
                ParamType::String,
                "Profile field to change (position, phone, email)",
            ))
            .param(ParameterSpec::input("value", ParamType::String, "New value for the field")),
        // administration
        CapabilityDescriptor::write("add-player", TEAM_ADMINISTRATOR)
            .describe("Register a new player with the team")
            .param(scope())
            .param(ParameterSpec::input("player-name", ParamType::String, "Full name"))
            .param(
                ParameterSpec::input("phone", ParamType::String, "Contact phone number").optional(),
            )
            .param(
                ParameterSpec::input("position", ParamType::String, "Preferred position")
                    .optional(),
            ),
        CapabilityDescriptor::write("approve-player", TEAM_ADMINISTRATOR)
            .describe("Approve a pending registration")
            .param(scope())
            .param(ParameterSpec::input(
                "player-name",
                ParamType::String,
                "Name of the player to approve",
            )),
        CapabilityDescriptor::write("assign-role", TEAM_ADMINISTRATOR)
            .describe("Grant a role to a team member")
            .param(scope())
            .param(ParameterSpec::input("member", ParamType::String, "Member to promote"))
            .param(ParameterSpec::input(
                "role",
                ParamType::String,
                "Role to grant (member, coordinator, administrator)",
            )),
        CapabilityDescriptor::write("remove-member", TEAM_ADMINISTRATOR)
            .describe("Remove a member from the team")
            .param(scope())
            .param(ParameterSpec::input("member", ParamType::String, "Member to remove")),
        CapabilityDescriptor::read("list-all-entities", TEAM_ADMINISTRATOR)
            .describe("Every player record, including pending and inactive ones")
            .param(scope())
            .param(
                ParameterSpec::input(
                    "status",
                    ParamType::String,
                    "Only records with this status (pending, active, inactive)",
                )
                .optional(),
            )
            .returns("player", Cardinality::Many),
        // squad
        CapabilityDescriptor::read("list-matches", SQUAD_SELECTOR)
            .describe("Upcoming and recent fixtures")
            .param(scope())
            .param(
                ParameterSpec::input("from", ParamType::Date, "Earliest match date").optional(),
            )
            .returns("match", Cardinality::Many),
        CapabilityDescriptor::read("get-match", SQUAD_SELECTOR)
            .describe("Details of one fixture")
            .param(scope())
            .param(ParameterSpec::input("match-id", ParamType::String, "Fixture identifier"))
            .returns("match", Cardinality::Single),
        CapabilityDescriptor::write("mark-availability", SQUAD_SELECTOR)
            .describe("Mark the requester available or unavailable for a fixture")
            .param(scope())
            .param(requester())
            .param(ParameterSpec::input("match-id", ParamType::String, "Fixture identifier"))
            .param(ParameterSpec::input(
                "available",
                ParamType::Boolean,
                "Whether the requester can play",
            )),
        CapabilityDescriptor::write("select-squad", SQUAD_SELECTOR)
            .describe("Pick the squad for a fixture")
            .param(scope())
            .param(ParameterSpec::input("match-id", ParamType::String, "Fixture identifier"))
            .param(ParameterSpec::input("players", ParamType::List, "Selected player names")),
        // finance
        CapabilityDescriptor::read("list-payments", FINANCE_MANAGER)
            .describe("Payments recorded for the team")
            .param(scope())
            .returns("payment", Cardinality::Many),
        CapabilityDescriptor::read("get-payment-status", FINANCE_MANAGER)
            .describe("Outstanding balance of the requester")
            .param(scope())
            .param(requester())
            .returns("payment", Cardinality::Single),
        CapabilityDescriptor::write("record-payment", FINANCE_MANAGER)
            .describe("Record a payment from a player")
            .param(scope())
            .param(ParameterSpec::input("player-name", ParamType::String, "Who paid"))
            .param(ParameterSpec::input("amount", ParamType::Number, "Amount paid")),
    ]
}
