//! Inbound messages and outbound replies.
//!
//! The chat-platform adapter (Telegram, webhook, CLI) converts whatever it
//! receives into an [`InboundMessage`] and delivers the [`Reply`] back.

use serde::{Deserialize, Serialize};

use crate::scope::ChatScope;

/// A message handed to the routing core by the chat-platform adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Platform-specific user ID of the sender
    pub requester_id: String,

    /// The team the chat belongs to
    pub team_scope_id: String,

    /// The chat/group/DM identifier
    pub chat_id: String,

    /// Classification of the chat
    pub chat_scope: ChatScope,

    /// The text content
    pub text: String,

    /// Whether the adapter recognized a slash command
    #[serde(default)]
    pub is_structured_command: bool,
}

impl InboundMessage {
    /// Convenience constructor; flags the message as structured when it
    /// starts with `/`.
    pub fn new(
        requester_id: impl Into<String>,
        team_scope_id: impl Into<String>,
        chat_scope: ChatScope,
        text: impl Into<String>,
    ) -> Self {
        let text = text.into();
        let team_scope_id = team_scope_id.into();
        Self {
            requester_id: requester_id.into(),
            chat_id: format!("{team_scope_id}:{chat_scope}"),
            team_scope_id,
            chat_scope,
            is_structured_command: text.trim_start().starts_with('/'),
            text,
        }
    }
}

/// Final status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplyStatus {
    Ok,
    /// Validation, timeout or backend failure; the text is a safe substitute.
    Degraded,
    /// Permission failure; the text explains what is missing.
    Denied,
}

/// The response returned to the chat-platform adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    pub status: ReplyStatus,
}

impl Reply {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: ReplyStatus::Ok,
        }
    }

    pub fn degraded(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: ReplyStatus::Degraded,
        }
    }

    pub fn denied(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: ReplyStatus::Denied,
        }
    }
}
