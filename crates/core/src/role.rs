//! Roles: a small closed enum with a fixed precedence table.
//!
//! Membership data arrives from the data provider as free-form strings
//! (`"player"`, `"admin"`, `"coach"`, ...). They are collapsed into [`Role`]
//! exactly once, when a [`RoleAssignment`] is built, and never compared as
//! strings afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// A team role. Declaration order is precedence order:
/// `Administrator > Coordinator > Member > Guest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Minimal role for identities with no membership record.
    Guest,
    Member,
    Coordinator,
    Administrator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Member => "member",
            Self::Coordinator => "coordinator",
            Self::Administrator => "administrator",
        }
    }

    /// Map a raw provider role string onto the closed enum.
    ///
    /// Returns `None` for strings that carry no permission meaning.
    pub fn from_alias(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "guest" | "visitor" => Some(Self::Guest),
            "member" | "player" | "team_member" => Some(Self::Member),
            "coordinator" | "coach" | "manager" | "team_manager" | "leadership" => {
                Some(Self::Coordinator)
            }
            "administrator" | "admin" | "owner" | "team_admin" => Some(Self::Administrator),
            _ => None,
        }
    }

    /// Whether holding `self` satisfies a requirement for `required`.
    pub fn satisfies(&self, required: Role) -> bool {
        *self >= required
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_alias(s).ok_or_else(|| format!("unknown role '{s}'"))
    }
}

/// A non-empty set of roles. An empty input normalizes to `{guest}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    /// The minimal role set: `{guest}`.
    pub fn minimal() -> Self {
        Self(BTreeSet::from([Role::Guest]))
    }

    pub fn from_roles(roles: impl IntoIterator<Item = Role>) -> Self {
        let mut set: BTreeSet<Role> = roles.into_iter().collect();
        if set.len() > 1 {
            set.remove(&Role::Guest);
        }
        if set.is_empty() {
            return Self::minimal();
        }
        Self(set)
    }

    /// Parse raw provider strings; unrecognized strings are skipped.
    pub fn from_raw<S: AsRef<str>>(raw: &[S]) -> Self {
        Self::from_roles(raw.iter().filter_map(|r| {
            let parsed = Role::from_alias(r.as_ref());
            if parsed.is_none() {
                tracing::debug!(role = r.as_ref(), "Ignoring unrecognized role string");
            }
            parsed
        }))
    }

    /// The highest-precedence role held.
    pub fn highest(&self) -> Role {
        self.0.iter().next_back().copied().unwrap_or(Role::Guest)
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn insert(&mut self, role: Role) {
        self.0.insert(role);
        if self.0.len() > 1 {
            self.0.remove(&Role::Guest);
        }
    }

    /// Whether only the minimal role is held.
    pub fn is_minimal(&self) -> bool {
        self.highest() == Role::Guest
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }

    /// Whether any held role satisfies any of `required` under precedence.
    pub fn satisfies_any(&self, required: &[Role]) -> bool {
        required.iter().any(|r| self.highest().satisfies(*r))
    }

    /// Comma-separated role names, lowest precedence first.
    pub fn to_csv(&self) -> String {
        self.0.iter().map(Role::as_str).collect::<Vec<_>>().join(",")
    }
}

impl Default for RoleSet {
    fn default() -> Self {
        Self::minimal()
    }
}

/// The resolved roles of one identity within one team scope.
///
/// Produced by the permission resolver and replaced wholesale on refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub identity: String,
    pub team_scope_id: String,
    pub roles: RoleSet,
    pub is_member: bool,
    pub is_coordinator: bool,
    pub is_administrator: bool,
    /// Whether the identity belongs to the team's restricted chat.
    pub in_restricted_chat: bool,
    /// Administrator granted by the first-member rule rather than stored data.
    #[serde(default)]
    pub implicit_administrator: bool,
    /// Produced by fail-closed resolution after a data provider failure.
    #[serde(default)]
    pub degraded: bool,
}

impl RoleAssignment {
    pub fn new(
        identity: impl Into<String>,
        team_scope_id: impl Into<String>,
        roles: RoleSet,
        in_restricted_chat: bool,
    ) -> Self {
        let highest = roles.highest();
        Self {
            identity: identity.into(),
            team_scope_id: team_scope_id.into(),
            is_member: highest.satisfies(Role::Member),
            is_coordinator: highest.satisfies(Role::Coordinator),
            is_administrator: highest.satisfies(Role::Administrator),
            roles,
            in_restricted_chat,
            implicit_administrator: false,
            degraded: false,
        }
    }

    /// The assignment for an identity with no membership record.
    pub fn minimal(identity: impl Into<String>, team_scope_id: impl Into<String>) -> Self {
        Self::new(identity, team_scope_id, RoleSet::minimal(), false)
    }

    /// The fail-closed assignment used when the data provider is unavailable.
    pub fn degraded(identity: impl Into<String>, team_scope_id: impl Into<String>) -> Self {
        Self {
            degraded: true,
            ..Self::minimal(identity, team_scope_id)
        }
    }

    /// Add administrator through the first-member rule.
    pub fn with_implicit_administrator(self) -> Self {
        if self.roles.contains(Role::Administrator) {
            return self;
        }
        let mut roles = self.roles;
        roles.insert(Role::Administrator);
        Self {
            implicit_administrator: true,
            degraded: self.degraded,
            ..Self::new(self.identity, self.team_scope_id, roles, self.in_restricted_chat)
        }
    }

    pub fn primary_role(&self) -> Role {
        self.roles.highest()
    }
}
