//! Automatic administrator succession.
//!
//! When a team is left without an administrator, the longest-tenured member
//! of its restricted chat is promoted through the provider's idempotent write
//! path. Runs periodically, so consistency is eventual.

use chrono::Utc;
use kickoff_core::event::{DomainEvent, EventBus};
use kickoff_core::membership::{MembershipProvider, MembershipRecord};
use kickoff_core::scope::ChatScope;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audit::{AuditEvent, AuditLogger, AuditOutcome};
use crate::cache::RoleCache;
use crate::resolver::{RetryPolicy, has_explicit_administrator, with_retry};

/// A promotion written by one sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub team_scope_id: String,
    pub identity: String,
}

pub struct SuccessionSweeper {
    provider: Arc<dyn MembershipProvider>,
    cache: Arc<RoleCache>,
    retry: RetryPolicy,
    audit: Option<Arc<AuditLogger>>,
    events: Option<Arc<EventBus>>,
}

impl SuccessionSweeper {
    pub fn new(provider: Arc<dyn MembershipProvider>, cache: Arc<RoleCache>) -> Self {
        Self {
            provider,
            cache,
            retry: RetryPolicy::default(),
            audit: None,
            events: None,
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

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// One pass over every team. Provider failures skip the team.
    pub async fn sweep_once(&self) -> Vec<Promotion> {
        let teams = match with_retry(self.retry, "teams", || self.provider.teams()).await {
            Ok(teams) => teams,
            Err(e) => {
                warn!(error = %e, "Succession sweep skipped: cannot list teams");
                return Vec::new();
            }
        };

        let mut promotions = Vec::new();
        for team in teams {
            match self.sweep_team(&team).await {
                Ok(Some(promotion)) => promotions.push(promotion),
                Ok(None) => {}
                Err(e) => warn!(team_scope_id = %team, error = %e, "Succession check failed"),
            }
        }
        promotions
    }

    async fn sweep_team(
        &self,
        team: &str,
    ) -> Result<Option<Promotion>, kickoff_core::error::ProviderError> {
        let roster = with_retry(self.retry, "roster", || self.provider.roster(team)).await?;
        if roster.is_empty() || has_explicit_administrator(&roster) {
            return Ok(None);
        }

        let Some(successor) = successor(&roster) else {
            warn!(team_scope_id = team, "No administrator and no restricted-chat member to promote");
            return Ok(None);
        };
        let identity = successor.identity.clone();

        with_retry(self.retry, "promote", || {
            self.provider.promote_to_administrator(&identity, team)
        })
        .await?;
        self.cache.invalidate_team(team);

        info!(team_scope_id = team, identity = %identity, "Promoted administrator by succession");
        if let Some(audit) = &self.audit {
            audit.log(
                AuditEvent::AdministratorPromoted {
                    team_scope_id: team.to_string(),
                },
                "succession",
                &identity,
                AuditOutcome::Success,
                None,
            );
        }
        if let Some(events) = &self.events {
            events.publish(DomainEvent::AdministratorPromoted {
                team_scope_id: team.to_string(),
                identity: identity.clone(),
                timestamp: Utc::now(),
            });
        }

        Ok(Some(Promotion {
            team_scope_id: team.to_string(),
            identity,
        }))
    }

    /// Sweep every `interval` until the task is aborted.
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let promotions = self.sweep_once().await;
                debug!(promotions = promotions.len(), "Succession sweep finished");
            }
        })
    }
}

/// Longest-tenured restricted-chat member; ties broken by identity.
fn successor(roster: &[MembershipRecord]) -> Option<&MembershipRecord> {
    roster
        .iter()
        .filter(|m| m.in_chat(ChatScope::Restricted))
        .min_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.identity.cmp(&b.identity)))
}
