//! Membership data provider trait: the external source of team roles.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::scope::ChatScope;

/// A membership record as stored by the data provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRecord {
    pub identity: String,

    pub team_scope_id: String,

    /// Raw role strings (e.g. "player", "admin")
    #[serde(default)]
    pub roles: Vec<String>,

    /// Chats of this team the identity belongs to
    #[serde(default)]
    pub chat_memberships: Vec<ChatScope>,

    /// When the identity joined the team
    pub joined_at: DateTime<Utc>,
}

impl MembershipRecord {
    pub fn in_chat(&self, scope: ChatScope) -> bool {
        self.chat_memberships.contains(&scope)
    }
}

/// The membership/role data provider.
///
/// Reads are assumed cheap but fallible. The only write is the idempotent
/// administrator promotion used by automatic succession.
#[async_trait]
pub trait MembershipProvider: Send + Sync {
    fn name(&self) -> &str;

    /// The membership record of one identity in one team.
    async fn lookup(
        &self,
        identity: &str,
        team_scope_id: &str,
    ) -> Result<Option<MembershipRecord>, ProviderError>;

    /// All members of a team.
    async fn roster(&self, team_scope_id: &str) -> Result<Vec<MembershipRecord>, ProviderError>;

    /// All known team scope ids.
    async fn teams(&self) -> Result<Vec<String>, ProviderError>;

    /// Grant administrator. Granting to an existing administrator is a no-op.
    async fn promote_to_administrator(
        &self,
        identity: &str,
        team_scope_id: &str,
    ) -> Result<(), ProviderError>;
}
