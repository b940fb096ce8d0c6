//! Context builder: one inbound message → one immutable execution context.

use kickoff_core::context::ExecutionContext;
use kickoff_core::message::InboundMessage;
use kickoff_permissions::PermissionResolver;
use std::sync::Arc;
use tracing::debug;

pub struct ContextBuilder {
    resolver: Arc<PermissionResolver>,
}

impl ContextBuilder {
    pub fn new(resolver: Arc<PermissionResolver>) -> Self {
        Self { resolver }
    }

    /// Resolve the requester's roles and freeze the request into a context.
    ///
    /// Never fails: the resolver degrades to minimal roles on its own.
    pub async fn build(&self, mut message: InboundMessage) -> ExecutionContext {
        message.text = message.text.trim().to_string();
        if message.text.starts_with('/') {
            message.is_structured_command = true;
        }

        let roles = self
            .resolver
            .resolve(&message.requester_id, &message.team_scope_id)
            .await;
        let context = ExecutionContext::new(message, roles);
        debug!(
            request_id = %context.request_id(),
            requester_id = context.requester_id(),
            team_scope_id = context.team_scope_id(),
            chat_scope = %context.chat_scope(),
            primary_role = %context.roles().primary_role(),
            "Execution context built"
        );
        context
    }
}
