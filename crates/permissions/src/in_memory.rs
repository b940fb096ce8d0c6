//! In-memory membership provider, optionally seeded from a TOML roster.
//!
//! ```toml
//! [[members]]
//! identity = "1001"
//! team_scope_id = "KTI"
//! roles = ["admin"]
//! chat_memberships = ["open", "restricted"]
//! joined_at = "2024-08-01T18:00:00Z"
//! ```

use async_trait::async_trait;
use kickoff_core::error::{Error, ProviderError};
use kickoff_core::membership::{MembershipProvider, MembershipRecord};
use kickoff_core::role::Role;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
struct Roster {
    #[serde(default)]
    members: Vec<MembershipRecord>,
}

/// Membership records held in process memory.
#[derive(Default)]
pub struct InMemoryMembership {
    teams: RwLock<BTreeMap<String, Vec<MembershipRecord>>>,
}

impl InMemoryMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = MembershipRecord>) -> Self {
        let provider = Self::new();
        for record in records {
            provider.upsert(record);
        }
        provider
    }

    pub fn from_toml(content: &str) -> Result<Self, Error> {
        let roster: Roster = toml::from_str(content).map_err(|e| Error::Config {
            message: format!("invalid roster: {e}"),
        })?;
        Ok(Self::from_records(roster.members))
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read roster {}: {e}", path.display()),
        })?;
        let provider = Self::from_toml(&content)?;
        info!(path = %path.display(), members = provider.len(), "Loaded membership roster");
        Ok(provider)
    }

    /// Insert or replace the record of one identity in one team.
    pub fn upsert(&self, record: MembershipRecord) {
        let mut teams = self.teams.write().unwrap_or_else(|p| p.into_inner());
        let members = teams.entry(record.team_scope_id.clone()).or_default();
        members.retain(|m| m.identity != record.identity);
        members.push(record);
    }

    /// Remove a member. Returns whether a record was removed.
    pub fn remove(&self, identity: &str, team_scope_id: &str) -> bool {
        let mut teams = self.teams.write().unwrap_or_else(|p| p.into_inner());
        let Some(members) = teams.get_mut(team_scope_id) else {
            return false;
        };
        let before = members.len();
        members.retain(|m| m.identity != identity);
        before != members.len()
    }

    pub fn len(&self) -> usize {
        self.teams
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .values()
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MembershipProvider for InMemoryMembership {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn lookup(
        &self,
        identity: &str,
        team_scope_id: &str,
    ) -> Result<Option<MembershipRecord>, ProviderError> {
        let teams = self.teams.read().unwrap_or_else(|p| p.into_inner());
        Ok(teams
            .get(team_scope_id)
            .and_then(|members| members.iter().find(|m| m.identity == identity))
            .cloned())
    }

    async fn roster(&self, team_scope_id: &str) -> Result<Vec<MembershipRecord>, ProviderError> {
        let teams = self.teams.read().unwrap_or_else(|p| p.into_inner());
        Ok(teams.get(team_scope_id).cloned().unwrap_or_default())
    }

    async fn teams(&self) -> Result<Vec<String>, ProviderError> {
        let teams = self.teams.read().unwrap_or_else(|p| p.into_inner());
        Ok(teams.keys().cloned().collect())
    }

    async fn promote_to_administrator(
        &self,
        identity: &str,
        team_scope_id: &str,
    ) -> Result<(), ProviderError> {
        let mut teams = self.teams.write().unwrap_or_else(|p| p.into_inner());
        let record = teams
            .get_mut(team_scope_id)
            .and_then(|members| members.iter_mut().find(|m| m.identity == identity))
            .ok_or_else(|| {
                ProviderError::Rejected(format!("{identity} is not a member of {team_scope_id}"))
            })?;
        let already = record
            .roles
            .iter()
            .any(|r| Role::from_alias(r) == Some(Role::Administrator));
        if !already {
            record.roles.push("administrator".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROSTER: &str = r#"
[[members]]
identity = "1001"
team_scope_id = "KTI"
roles = ["admin"]
chat_memberships = ["open", "restricted"]
joined_at = "2024-08-01T18:00:00Z"

[[members]]
identity = "1002"
team_scope_id = "KTI"
roles = ["player"]
chat_memberships = ["open"]
joined_at = "2024-08-03T18:00:00Z"
"#;

    #[tokio::test]
    async fn roster_loads_and_looks_up() {
        let provider = InMemoryMembership::from_toml(ROSTER).unwrap();
        assert_eq!(provider.len(), 2);
        let record = provider.lookup("1002", "KTI").await.unwrap().unwrap();
        assert_eq!(record.roles, vec!["player"]);
        assert!(provider.lookup("1002", "OTHER").await.unwrap().is_none());
        assert_eq!(provider.teams().await.unwrap(), vec!["KTI"]);
    }

    #[tokio::test]
    async fn promotion_is_idempotent() {
        let provider = InMemoryMembership::from_toml(ROSTER).unwrap();
        provider.promote_to_administrator("1002", "KTI").await.unwrap();
        provider.promote_to_administrator("1002", "KTI").await.unwrap();
        let record = provider.lookup("1002", "KTI").await.unwrap().unwrap();
        assert_eq!(record.roles, vec!["player", "administrator"]);
    }

    #[tokio::test]
    async fn promoting_a_stranger_is_rejected() {
        let provider = InMemoryMembership::new();
        let err = provider.promote_to_administrator("x", "KTI").await.unwrap_err();
        assert!(!err.is_transport());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.toml");
        std::fs::write(&path, ROSTER).unwrap();
        assert_eq!(InMemoryMembership::load(&path).unwrap().len(), 2);
        assert!(InMemoryMembership::load(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn remove_member() {
        let provider = InMemoryMembership::from_toml(ROSTER).unwrap();
        assert!(provider.remove("1002", "KTI"));
        assert!(!provider.remove("1002", "KTI"));
        assert_eq!(provider.len(), 1);
    }
}
