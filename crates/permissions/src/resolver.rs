//! The permission resolver.
//!
//! Maps (identity, team scope) to a [`RoleAssignment`] with one membership
//! lookup, and (capability, assignment, chat scope) to a [`Decision`]. It
//! never surfaces a provider failure to the caller: after the retry budget
//! is spent it logs, audits and returns the degraded minimal assignment.
//!
//! The founder of a team (its sole member while no administrator exists) is
//! promoted through the provider's write path the first time they are
//! resolved. Teams already seen with an administrator or several members are
//! remembered, so their roster is read at most once per process. Losing an
//! administrator later is left to the succession sweeper.

use kickoff_config::PermissionsConfig;
use kickoff_core::capability::CapabilityDescriptor;
use kickoff_core::error::ProviderError;
use kickoff_core::membership::{MembershipProvider, MembershipRecord};
use kickoff_core::permission::Decision;
use kickoff_core::role::{Role, RoleAssignment, RoleSet};
use kickoff_core::scope::ChatScope;
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::audit::{AuditEvent, AuditLogger, AuditOutcome};
use crate::cache::RoleCache;
use crate::policy::PermissionPolicy;

/// Retry budget for membership provider calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &PermissionsConfig) -> Self {
        Self {
            max_attempts: config.provider_max_attempts.max(1),
            backoff: Duration::from_millis(config.provider_backoff_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

/// Run a provider call, retrying transport failures with doubling backoff.
pub(crate) async fn with_retry<T, F, Fut>(
    retry: RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 1;
    let mut delay = retry.backoff;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transport() && attempt < retry.max_attempts => {
                warn!(
                    operation,
                    attempt,
                    max_attempts = retry.max_attempts,
                    error = %e,
                    "Membership provider call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Whether any roster entry holds administrator in stored data.
pub(crate) fn has_explicit_administrator(roster: &[MembershipRecord]) -> bool {
    roster
        .iter()
        .any(|m| RoleSet::from_raw(m.roles.as_slice()).contains(Role::Administrator))
}

/// Whether `identity` founds the team: its only member, with no administrator.
fn is_founder(roster: &[MembershipRecord], identity: &str) -> bool {
    matches!(roster, [only] if only.identity == identity) && !has_explicit_administrator(roster)
}

pub struct PermissionResolver {
    provider: Arc<dyn MembershipProvider>,
    cache: Arc<RoleCache>,
    policy: PermissionPolicy,
    retry: RetryPolicy,
    audit: Option<Arc<AuditLogger>>,
    /// Teams that can no longer have a founder.
    established: Mutex<HashSet<String>>,
}

impl PermissionResolver {
    pub fn new(
        provider: Arc<dyn MembershipProvider>,
        cache: Arc<RoleCache>,
        policy: PermissionPolicy,
    ) -> Self {
        Self {
            provider,
            cache,
            policy,
            retry: RetryPolicy::default(),
            audit: None,
            established: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn policy(&self) -> &PermissionPolicy {
        &self.policy
    }

    pub fn cache(&self) -> &Arc<RoleCache> {
        &self.cache
    }

    /// Resolve the roles of `identity` in `team_scope_id`.
    pub async fn resolve(&self, identity: &str, team_scope_id: &str) -> RoleAssignment {
        if let Some(cached) = self.cache.get(identity, team_scope_id) {
            debug!(identity, team_scope_id, "Role cache hit");
            return cached;
        }

        match self.lookup(identity, team_scope_id).await {
            Ok(assignment) => {
                self.cache.insert(assignment.clone());
                assignment
            }
            Err(e) => {
                warn!(
                    identity,
                    team_scope_id,
                    error = %e,
                    "Membership provider unavailable; failing closed to minimal roles"
                );
                self.record(
                    AuditEvent::FailClosed {
                        team_scope_id: team_scope_id.to_string(),
                    },
                    identity,
                    self.provider.name(),
                    AuditOutcome::Degraded,
                    Some(e.to_string()),
                );
                RoleAssignment::degraded(identity, team_scope_id)
            }
        }
    }

    async fn lookup(
        &self,
        identity: &str,
        team_scope_id: &str,
    ) -> Result<RoleAssignment, ProviderError> {
        let record = with_retry(self.retry, "lookup", || {
            self.provider.lookup(identity, team_scope_id)
        })
        .await?;

        let Some(record) = record else {
            debug!(identity, team_scope_id, "No membership record; assigning minimal roles");
            return Ok(RoleAssignment::minimal(identity, team_scope_id));
        };

        let assignment = RoleAssignment::new(
            identity,
            team_scope_id,
            RoleSet::from_raw(record.roles.as_slice()),
            record.in_chat(ChatScope::Restricted),
        );
        if assignment.is_administrator {
            self.mark_established(team_scope_id);
            return Ok(assignment);
        }
        if self.is_established(team_scope_id) {
            return Ok(assignment);
        }

        let roster = with_retry(self.retry, "roster", || self.provider.roster(team_scope_id)).await?;
        if !is_founder(&roster, identity) {
            self.mark_established(team_scope_id);
            return Ok(assignment);
        }

        with_retry(self.retry, "promote", || {
            self.provider.promote_to_administrator(identity, team_scope_id)
        })
        .await?;
        self.mark_established(team_scope_id);
        self.cache.invalidate_team(team_scope_id);

        info!(identity, team_scope_id, "Granted administrator to team founder");
        self.record(
            AuditEvent::ImplicitAdministrator {
                team_scope_id: team_scope_id.to_string(),
            },
            identity,
            team_scope_id,
            AuditOutcome::Success,
            None,
        );
        Ok(assignment.with_implicit_administrator())
    }

    fn is_established(&self, team_scope_id: &str) -> bool {
        self.established
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(team_scope_id)
    }

    fn mark_established(&self, team_scope_id: &str) {
        self.established
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(team_scope_id.to_string());
    }

    /// Check one capability. Denials are audited.
    pub fn check(
        &self,
        descriptor: &CapabilityDescriptor,
        assignment: &RoleAssignment,
        scope: ChatScope,
    ) -> Decision {
        let decision = self.policy.check(descriptor, assignment, scope);
        if let Decision::Denied(denial) = &decision {
            debug!(
                identity = %assignment.identity,
                capability = %descriptor.name,
                reason = %denial,
                "Permission denied"
            );
            self.record(
                AuditEvent::PermissionDenied {
                    capability: descriptor.name.clone(),
                },
                &assignment.identity,
                &assignment.team_scope_id,
                AuditOutcome::Denied,
                Some(denial.to_string()),
            );
        }
        decision
    }

    /// The subset of `capabilities` the requester may use from `scope`.
    pub fn permitted(
        &self,
        capabilities: &[Arc<CapabilityDescriptor>],
        assignment: &RoleAssignment,
        scope: ChatScope,
    ) -> Vec<Arc<CapabilityDescriptor>> {
        self.policy.permitted(capabilities, assignment, scope)
    }

    fn record(
        &self,
        event: AuditEvent,
        actor: &str,
        target: &str,
        outcome: AuditOutcome,
        details: Option<String>,
    ) {
        if let Some(audit) = &self.audit {
            audit.log(event, actor, target, outcome, details);
        }
    }
}
