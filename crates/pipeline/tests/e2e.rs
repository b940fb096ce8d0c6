//! End-to-end tests for the Kickoff request pipeline.
//!
//! These exercise the full path from inbound message to reply: role
//! resolution, owner selection, permission gating, dispatch to a scripted
//! backend and validation of its answer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use kickoff_config::AppConfig;
use kickoff_core::backend::{ExecutionBackend, LedgerEntry, TaskRequest, TaskResponse};
use kickoff_core::error::{DispatchError, ProviderError};
use kickoff_core::event::DomainEvent;
use kickoff_core::membership::{MembershipProvider, MembershipRecord};
use kickoff_core::message::{InboundMessage, ReplyStatus};
use kickoff_core::role::Role;
use kickoff_core::scope::ChatScope;
use kickoff_permissions::{AuditEvent, AuditOutcome, InMemoryMembership};
use kickoff_pipeline::RequestPipeline;

// ── Scripted backend ─────────────────────────────────────────────────────

enum Script {
    Answer(&'static str, Vec<(&'static str, serde_json::Value)>),
    Hang,
}

/// A backend that plays one scripted answer and records every request.
struct ScriptedBackend {
    script: Script,
    requests: Mutex<Vec<TaskRequest>>,
}

impl ScriptedBackend {
    fn answer(text: &'static str, calls: Vec<(&'static str, serde_json::Value)>) -> Arc<Self> {
        Arc::new(Self {
            script: Script::Answer(text, calls),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn hang() -> Arc<Self> {
        Arc::new(Self {
            script: Script::Hang,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn last_request(&self) -> TaskRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl ExecutionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "e2e_scripted"
    }

    async fn execute(&self, request: TaskRequest) -> Result<TaskResponse, DispatchError> {
        self.requests.lock().unwrap().push(request);
        match &self.script {
            Script::Answer(text, calls) => Ok(TaskResponse {
                text: text.to_string(),
                invocation_ledger: calls
                    .iter()
                    .map(|(capability, result)| LedgerEntry {
                        capability: capability.to_string(),
                        params: serde_json::json!({"team_scope_id": "KTI"}),
                        result: result.clone(),
                        timestamp: None,
                    })
                    .collect(),
            }),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(DispatchError::Transport("never answered".into()))
            }
        }
    }
}

/// A membership provider that is always down.
struct DownProvider;

#[async_trait]
impl MembershipProvider for DownProvider {
    fn name(&self) -> &str {
        "down"
    }

    async fn lookup(&self, _: &str, _: &str) -> Result<Option<MembershipRecord>, ProviderError> {
        Err(ProviderError::Unavailable("connection refused".into()))
    }

    async fn roster(&self, _: &str) -> Result<Vec<MembershipRecord>, ProviderError> {
        Err(ProviderError::Unavailable("connection refused".into()))
    }

    async fn teams(&self) -> Result<Vec<String>, ProviderError> {
        Err(ProviderError::Unavailable("connection refused".into()))
    }

    async fn promote_to_administrator(&self, _: &str, _: &str) -> Result<(), ProviderError> {
        Err(ProviderError::Unavailable("connection refused".into()))
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

fn record(identity: &str, team: &str, roles: &[&str], chats: &[ChatScope], month: u32) -> MembershipRecord {
    MembershipRecord {
        identity: identity.into(),
        team_scope_id: team.into(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        chat_memberships: chats.to_vec(),
        joined_at: Utc.with_ymd_and_hms(2023, month, 1, 12, 0, 0).unwrap(),
    }
}

fn roster() -> Arc<InMemoryMembership> {
    use ChatScope::{Open, Restricted};
    Arc::new(InMemoryMembership::from_records([
        record("admin-x", "KTI", &["admin"], &[Open, Restricted], 1),
        record("coach-c", "KTI", &["coach", "player"], &[Open, Restricted], 2),
        record("member-y", "KTI", &["player"], &[Open], 3),
        record("alice", "KTI", &["player"], &[Open], 4),
        record("founder", "NEW", &["player"], &[Open, Restricted], 1),
        record("second", "NEW", &["player"], &[Open], 2),
        record("solo", "SOLO", &["player"], &[Open, Restricted], 5),
    ]))
}

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.dispatch.timeout_secs = 5;
    config
}

fn pipeline(backend: Arc<ScriptedBackend>) -> RequestPipeline {
    RequestPipeline::from_config(&config(), backend, roster()).unwrap()
}

fn msg(who: &str, scope: ChatScope, text: &str) -> InboundMessage {
    let team = match who {
        "founder" | "second" => "NEW",
        "solo" => "SOLO",
        _ => "KTI",
    };
    InboundMessage::new(who, team, scope, text)
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn administrator_in_restricted_chat_may_assign_roles() {
    let backend = ScriptedBackend::answer(
        "Done: Bob now has the coach role.",
        vec![("assign-role", serde_json::json!({"ok": true}))],
    );
    let pipeline = pipeline(backend.clone());

    let outcome = pipeline
        .process(msg("admin-x", ChatScope::Restricted, "/promote bob coach"))
        .await;

    assert_eq!(outcome.reply.status, ReplyStatus::Ok);
    assert_eq!(outcome.owner, "team_administrator");
    assert!(outcome.allowed.contains(&"assign-role".to_string()));
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn member_denied_coordinator_listing() {
    let backend = ScriptedBackend::answer("should not run", vec![]);
    let pipeline = pipeline(backend.clone());

    let reply = pipeline.handle(msg("member-y", ChatScope::Open, "/all")).await;

    assert_eq!(reply.status, ReplyStatus::Denied);
    assert!(reply.text.contains("coordinator"), "{}", reply.text);
    assert_eq!(backend.calls(), 0);
    assert!(
        pipeline
            .audit()
            .entries()
            .iter()
            .any(|e| e.event == AuditEvent::PermissionDenied { capability: "list-all-entities".into() })
    );
}

#[tokio::test]
async fn administrator_action_from_open_chat_is_denied_by_scope() {
    let backend = ScriptedBackend::answer("should not run", vec![]);
    let pipeline = pipeline(backend.clone());

    let reply = pipeline
        .handle(msg("admin-x", ChatScope::Open, "make bob an admin"))
        .await;

    assert_eq!(reply.status, ReplyStatus::Denied);
    assert!(reply.text.contains("restricted"), "{}", reply.text);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn single_entity_status_answer_passes() {
    let backend = ScriptedBackend::answer(
        "Name: Alice, Status: pending",
        vec![("get-self-status", serde_json::json!({"name": "Alice", "status": "pending"}))],
    );
    let pipeline = pipeline(backend.clone());

    let outcome = pipeline.process(msg("alice", ChatScope::Open, "/status")).await;

    assert_eq!(outcome.reply.status, ReplyStatus::Ok);
    assert_eq!(outcome.reply.text, "Name: Alice, Status: pending");
    let verdict = outcome.verdict.unwrap();
    assert!(verdict.passed);
    assert_eq!(verdict.matched_shape.as_deref(), Some("player_status"));
    assert_eq!(outcome.ledger.unwrap().len(), 1);

    let passed: Vec<_> = pipeline
        .audit()
        .entries()
        .into_iter()
        .filter(|e| matches!(e.event, AuditEvent::ValidationPassed { .. }))
        .collect();
    assert_eq!(passed.len(), 1);
    assert_eq!(passed[0].outcome, AuditOutcome::Success);
    assert!(passed[0].details.as_deref().unwrap_or("").contains("player_status"));
}

#[tokio::test]
async fn fabricated_roster_is_replaced_with_degraded_reply() {
    let backend = ScriptedBackend::answer(
        "Active members: Alice, Bob, Carol",
        vec![("get-self-status", serde_json::json!({"name": "Alice"}))],
    );
    let pipeline = pipeline(backend.clone());
    let mut events = pipeline.events().subscribe();

    let outcome = pipeline
        .process(msg("alice", ChatScope::Open, "who is on the team?"))
        .await;

    assert_eq!(outcome.reply.status, ReplyStatus::Degraded);
    assert!(!outcome.reply.text.contains("Bob"));
    assert_eq!(outcome.reply.text, config().validation.degraded_message);
    let verdict = outcome.verdict.unwrap();
    assert!(!verdict.passed);
    assert!(verdict.reasons[0].to_string().contains("Bob, Carol"));

    let mut saw_validation_failure = false;
    while let Ok(event) = events.try_recv() {
        if matches!(*event, DomainEvent::ValidationFailed { .. }) {
            saw_validation_failure = true;
        }
    }
    assert!(saw_validation_failure);
    // Verdicts are never retried.
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn loose_fabricated_roster_is_degraded() {
    let backend = ScriptedBackend::answer("Active players:\n\n- Alice\n\n- Bob\n\n- Carol", vec![]);
    let pipeline = pipeline(backend.clone());

    let outcome = pipeline
        .process(msg("alice", ChatScope::Open, "who is on the team?"))
        .await;
    assert_eq!(outcome.reply.status, ReplyStatus::Degraded);
    assert_eq!(outcome.verdict.unwrap().listings_checked, 1);
}

#[tokio::test]
async fn roster_answer_backed_by_listing_passes() {
    let backend = ScriptedBackend::answer(
        "Active members:\n- Alice\n- Bob\n- Carol",
        vec![(
            "list-active-players",
            serde_json::json!([{"name": "Alice"}, {"name": "Bob"}, {"name": "Carol"}]),
        )],
    );
    let pipeline = pipeline(backend.clone());

    let reply = pipeline.handle(msg("member-y", ChatScope::Open, "/players")).await;
    assert_eq!(reply.status, ReplyStatus::Ok);
}

#[tokio::test(start_paused = true)]
async fn backend_timeout_degrades_and_discards_ledger() {
    let backend = ScriptedBackend::hang();
    let pipeline = pipeline(backend.clone());

    let outcome = pipeline.process(msg("alice", ChatScope::Open, "/status")).await;

    assert_eq!(outcome.reply.status, ReplyStatus::Degraded);
    assert!(outcome.ledger.is_none());
    assert!(outcome.verdict.is_none());
    // One retry, then give up.
    assert_eq!(backend.calls(), 2);
    assert!(
        pipeline
            .audit()
            .entries()
            .iter()
            .any(|e| matches!(e.event, AuditEvent::DispatchFailed { .. }))
    );
}

#[tokio::test]
async fn out_of_scope_invocation_degrades() {
    let backend = ScriptedBackend::answer(
        "Done.",
        vec![("assign-role", serde_json::json!({"ok": true}))],
    );
    let pipeline = pipeline(backend.clone());

    let outcome = pipeline.process(msg("alice", ChatScope::Open, "/status")).await;
    assert_eq!(outcome.owner, "player_coordinator");
    assert_eq!(outcome.reply.status, ReplyStatus::Degraded);
}

#[tokio::test]
async fn structured_and_free_text_reach_same_owner() {
    let backend = ScriptedBackend::answer("Your status is active.", vec![]);
    let pipeline = pipeline(backend.clone());

    let structured = pipeline.process(msg("alice", ChatScope::Open, "/status")).await;
    let free = pipeline
        .process(msg("alice", ChatScope::Open, "am I registered?"))
        .await;

    assert_eq!(structured.intent, free.intent);
    assert_eq!(structured.owner, free.owner);
    assert_eq!(structured.allowed, free.allowed);
}

#[tokio::test]
async fn backend_sees_only_permitted_capabilities_and_named_context() {
    let backend = ScriptedBackend::answer("Your squad question is noted.", vec![]);
    let pipeline = pipeline(backend.clone());

    pipeline
        .handle(msg("coach-c", ChatScope::Restricted, "who is on the team?"))
        .await;

    let request = backend.last_request();
    assert!(request.allowed_capabilities.contains(&"list-active-players".to_string()));
    assert!(request.allowed_capabilities.contains(&"add-player".to_string()));
    // Administrator-only.
    assert!(!request.allowed_capabilities.contains(&"assign-role".to_string()));
    assert!(!request.allowed_capabilities.contains(&"remove-member".to_string()));

    assert_eq!(request.named_context["team_scope_id"], "KTI");
    assert_eq!(request.named_context["requester_id"], "coach-c");
    assert_eq!(request.named_context["owner"], "team_administrator");
    assert_eq!(request.named_context["chat_scope"], "restricted");
}

#[tokio::test]
async fn unknown_identity_is_guest_and_denied_member_lookups() {
    let backend = ScriptedBackend::answer("should not run", vec![]);
    let pipeline = pipeline(backend.clone());

    let reply = pipeline.handle(msg("stranger", ChatScope::Open, "/players")).await;
    assert_eq!(reply.status, ReplyStatus::Denied);
    assert!(reply.text.contains("member"));
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn unmatched_text_goes_to_fallback_owner() {
    let backend = ScriptedBackend::answer("Hello! Try /help to see what I can do.", vec![]);
    let pipeline = pipeline(backend.clone());

    let outcome = pipeline
        .process(msg("alice", ChatScope::Open, "lovely weather today"))
        .await;
    assert!(outcome.fallback);
    assert_eq!(outcome.owner, "message_processor");
    assert_eq!(outcome.reply.status, ReplyStatus::Ok);
}

#[tokio::test]
async fn sole_member_of_a_new_team_becomes_administrator() {
    let backend = ScriptedBackend::answer("Done.", vec![]);
    let provider = roster();
    let pipeline = RequestPipeline::from_config(&config(), backend.clone(), provider.clone()).unwrap();

    let plan = pipeline
        .plan(msg("solo", ChatScope::Restricted, "/promote bob coach"))
        .await;
    assert_eq!(plan.primary_role, Role::Administrator);
    assert!(plan.denial.is_none());
    let stored = provider.lookup("solo", "SOLO").await.unwrap().unwrap();
    assert!(stored.roles.iter().any(|r| r == "administrator"));

    // NEW already has two members and no administrator: that waits for succession.
    let plan = pipeline
        .plan(msg("founder", ChatScope::Restricted, "/promote second coach"))
        .await;
    assert!(plan.denial.is_some());
    let plan = pipeline
        .plan(msg("second", ChatScope::Restricted, "/promote founder coach"))
        .await;
    assert!(plan.denial.is_some());
    assert_eq!(backend.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn provider_outage_fails_closed_but_help_still_works() {
    let backend = ScriptedBackend::answer("Commands: /help, /status, /players", vec![]);
    let pipeline = RequestPipeline::from_config(&config(), backend.clone(), Arc::new(DownProvider)).unwrap();

    let denied = pipeline.handle(msg("admin-x", ChatScope::Restricted, "/all")).await;
    assert_eq!(denied.status, ReplyStatus::Denied);

    let help = pipeline.handle(msg("admin-x", ChatScope::Open, "/help")).await;
    assert_eq!(help.status, ReplyStatus::Ok);

    let plan = pipeline.plan(msg("admin-x", ChatScope::Open, "/status")).await;
    assert!(plan.degraded_roles);
}

#[tokio::test]
async fn succession_sweeper_promotes_after_admin_leaves() {
    let provider = roster();
    let backend = ScriptedBackend::answer("Done.", vec![]);
    let pipeline = RequestPipeline::from_config(&config(), backend, provider.clone()).unwrap();

    assert!(provider.remove("admin-x", "KTI"));
    let promotions = pipeline.succession_sweeper().sweep_once().await;

    // KTI lost its administrator. NEW never stored one.
    let kti: Vec<_> = promotions.iter().filter(|p| p.team_scope_id == "KTI").collect();
    assert_eq!(kti.len(), 1);
    assert_eq!(kti[0].identity, "coach-c");
    assert!(promotions.iter().any(|p| p.identity == "founder"));
    let plan = pipeline
        .plan(msg("coach-c", ChatScope::Restricted, "/promote alice coach"))
        .await;
    assert!(plan.denial.is_none());
}
