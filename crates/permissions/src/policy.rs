//! Permission policy: which requirement applies to which capability.
//!
//! Rules, in order:
//! - An explicit rule for the capability name wins
//! - Otherwise reads need `member` in any chat
//! - Otherwise writes need `coordinator` and the restricted chat

use kickoff_config::{ConfigError, PermissionRuleConfig};
use kickoff_core::capability::CapabilityDescriptor;
use kickoff_core::permission::{Decision, Requirement};
use kickoff_core::role::{Role, RoleAssignment};
use kickoff_core::scope::ChatScope;
use std::collections::HashMap;
use std::sync::Arc;

/// Requirement lookup for capabilities.
#[derive(Debug, Clone)]
pub struct PermissionPolicy {
    rules: HashMap<String, Requirement>,
}

impl PermissionPolicy {
    /// A policy with no explicit rules; only the side-effect defaults apply.
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// The built-in rules for the team catalog.
    pub fn builtin() -> Self {
        let restricted = [ChatScope::Restricted];
        let mut policy = Self::empty();
        policy
            .set("get-available-commands", Requirement::public())
            .set("get-command-help", Requirement::public())
            .set("list-all-entities", Requirement::role(Role::Coordinator))
            .set("list-payments", Requirement::role(Role::Coordinator))
            .set(
                "assign-role",
                Requirement::role(Role::Administrator).in_scopes(restricted),
            )
            .set(
                "remove-member",
                Requirement::role(Role::Administrator).in_scopes(restricted),
            )
            // Self-service writes; usable from any chat.
            .set("update-self", Requirement::role(Role::Member))
            .set("mark-availability", Requirement::role(Role::Member));
        policy
    }

    /// Apply configured overrides on top of this policy.
    pub fn with_overrides(mut self, rules: &[PermissionRuleConfig]) -> Result<Self, ConfigError> {
        for rule in rules {
            let requirement = rule.requirement()?;
            self.set(&rule.capability, requirement);
        }
        Ok(self)
    }

    pub fn set(&mut self, capability: &str, requirement: Requirement) -> &mut Self {
        self.rules.insert(capability.to_string(), requirement);
        self
    }

    /// The requirement that applies to `descriptor`.
    pub fn requirement_for(&self, descriptor: &CapabilityDescriptor) -> Requirement {
        if let Some(rule) = self.rules.get(&descriptor.name) {
            return rule.clone();
        }
        if descriptor.is_mutating() {
            Requirement::role(Role::Coordinator).in_scopes([ChatScope::Restricted])
        } else {
            Requirement::role(Role::Member)
        }
    }

    pub fn check(
        &self,
        descriptor: &CapabilityDescriptor,
        assignment: &RoleAssignment,
        scope: ChatScope,
    ) -> Decision {
        self.requirement_for(descriptor)
            .check(&descriptor.name, assignment, scope)
    }

    /// The subset of `capabilities` the requester may use from `scope`.
    pub fn permitted(
        &self,
        capabilities: &[Arc<CapabilityDescriptor>],
        assignment: &RoleAssignment,
        scope: ChatScope,
    ) -> Vec<Arc<CapabilityDescriptor>> {
        capabilities
            .iter()
            .filter(|c| self.check(c, assignment, scope).is_allowed())
            .cloned()
            .collect()
    }
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        Self::builtin()
    }
}
