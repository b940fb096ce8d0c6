//! The per-request execution context.
//!
//! One [`ExecutionContext`] is built for every inbound message and dropped
//! when the reply is sent. It is immutable: fields are only readable, and
//! every value the executor may see is addressable by an explicit key.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::message::InboundMessage;
use crate::role::RoleAssignment;
use crate::scope::ChatScope;

/// Every key a capability parameter may source from the context.
pub const CONTEXT_KEYS: &[&str] = &[
    "request_id",
    "requester_id",
    "team_scope_id",
    "chat_id",
    "chat_scope",
    "is_restricted_chat",
    "primary_role",
    "roles",
    "is_member",
    "is_coordinator",
    "is_administrator",
    "message_text",
    "intent",
    "owner",
    "received_at",
];

/// Keys sent to the executor on every request, whatever the capability set.
pub const BASE_CONTEXT_KEYS: &[&str] = &[
    "request_id",
    "requester_id",
    "team_scope_id",
    "chat_scope",
    "intent",
    "owner",
    "message_text",
];

/// Keys resolved after routing rather than from the message itself.
pub const ROUTING_CONTEXT_KEYS: &[&str] = &["intent", "owner"];

pub fn is_context_key(key: &str) -> bool {
    CONTEXT_KEYS.contains(&key)
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionContext {
    request_id: Uuid,
    requester_id: String,
    team_scope_id: String,
    chat_id: String,
    chat_scope: ChatScope,
    text: String,
    is_structured_command: bool,
    roles: RoleAssignment,
    received_at: DateTime<Utc>,
}

impl ExecutionContext {
    pub fn new(message: InboundMessage, roles: RoleAssignment) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            requester_id: message.requester_id,
            team_scope_id: message.team_scope_id,
            chat_id: message.chat_id,
            chat_scope: message.chat_scope,
            text: message.text,
            is_structured_command: message.is_structured_command,
            roles,
            received_at: Utc::now(),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn requester_id(&self) -> &str {
        &self.requester_id
    }

    pub fn team_scope_id(&self) -> &str {
        &self.team_scope_id
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn chat_scope(&self) -> ChatScope {
        self.chat_scope
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_structured_command(&self) -> bool {
        self.is_structured_command
    }

    pub fn roles(&self) -> &RoleAssignment {
        &self.roles
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// The string value of a context key, for keys intrinsic to the request.
    ///
    /// Routing keys (`intent`, `owner`) are not known here and return `None`.
    pub fn value(&self, key: &str) -> Option<String> {
        let value = match key {
            "request_id" => self.request_id.to_string(),
            "requester_id" => self.requester_id.clone(),
            "team_scope_id" => self.team_scope_id.clone(),
            "chat_id" => self.chat_id.clone(),
            "chat_scope" => self.chat_scope.to_string(),
            "is_restricted_chat" => (self.chat_scope == ChatScope::Restricted).to_string(),
            "primary_role" => self.roles.primary_role().to_string(),
            "roles" => self.roles.roles.to_csv(),
            "is_member" => self.roles.is_member.to_string(),
            "is_coordinator" => self.roles.is_coordinator.to_string(),
            "is_administrator" => self.roles.is_administrator.to_string(),
            "message_text" => self.text.clone(),
            "received_at" => self.received_at.to_rfc3339(),
            _ => return None,
        };
        Some(value)
    }
}
