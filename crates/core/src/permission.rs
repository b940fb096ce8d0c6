//! Permission requirements and decisions.
//!
//! A [`Requirement`] is attached to every capability by the permission
//! policy. Checking it against a [`RoleAssignment`] and the request's chat
//! scope is a pure function returning a [`Decision`].

use serde::{Deserialize, Serialize};

use crate::role::{Role, RoleAssignment};
use crate::scope::ChatScope;

/// What a capability demands from the requester.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// Any-of, evaluated under role precedence. Empty means public.
    #[serde(default)]
    pub roles: Vec<Role>,

    /// Chat scopes the capability may be used from. Empty means any.
    #[serde(default)]
    pub chat_scopes: Vec<ChatScope>,
}

impl Requirement {
    pub fn public() -> Self {
        Self::default()
    }

    pub fn role(role: Role) -> Self {
        Self {
            roles: vec![role],
            chat_scopes: vec![],
        }
    }

    pub fn in_scopes(mut self, scopes: impl IntoIterator<Item = ChatScope>) -> Self {
        self.chat_scopes = scopes.into_iter().collect();
        self
    }

    pub fn is_public(&self) -> bool {
        self.roles.is_empty() && self.chat_scopes.is_empty()
    }

    /// Roles actually demanded. A non-public requirement always asks for at
    /// least membership, so guests never pass one.
    fn demanded_roles(&self) -> Vec<Role> {
        if self.roles.is_empty() {
            return vec![Role::Member];
        }
        self.roles.iter().map(|r| (*r).max(Role::Member)).collect()
    }

    /// Evaluate this requirement.
    pub fn check(
        &self,
        capability: &str,
        assignment: &RoleAssignment,
        scope: ChatScope,
    ) -> Decision {
        let demanded = if self.is_public() {
            Vec::new()
        } else {
            self.demanded_roles()
        };
        let role_ok = demanded.is_empty() || assignment.roles.satisfies_any(&demanded);
        let scope_ok = self.chat_scopes.is_empty() || self.chat_scopes.contains(&scope);

        if role_ok && scope_ok {
            return Decision::Allowed;
        }

        Decision::Denied(Denial {
            capability: capability.to_string(),
            missing_role: if role_ok {
                None
            } else {
                demanded.iter().min().copied()
            },
            required_scopes: if scope_ok {
                vec![]
            } else {
                self.chat_scopes.clone()
            },
            actual_scope: scope,
        })
    }
}

/// The outcome of a permission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Allowed,
    Denied(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Why a capability was denied. Names the missing role and/or chat scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denial {
    pub capability: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_role: Option<Role>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_scopes: Vec<ChatScope>,
    pub actual_scope: ChatScope,
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}'", self.capability)?;
        if let Some(role) = self.missing_role {
            write!(f, " requires the {role} role")?;
        }
        if !self.required_scopes.is_empty() {
            let scopes: Vec<&str> = self.required_scopes.iter().map(ChatScope::as_str).collect();
            if self.missing_role.is_some() {
                f.write_str(" and")?;
            }
            write!(
                f,
                " is only available in the {} chat (this is the {} chat)",
                scopes.join(" or "),
                self.actual_scope
            )?;
        }
        Ok(())
    }
}
