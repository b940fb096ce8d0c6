//! The request pipeline.
//!
//! One inbound message in, one reply out:
//!
//! ```text
//! build context ─▶ select owner ─▶ gate check ─▶ permitted subset
//!       ─▶ dispatch ─▶ validate ─▶ Reply { OK | DEGRADED | DENIED }
//! ```
//!
//! Nothing here returns an error to the caller. Permission failures become
//! DENIED, backend and validation failures become DEGRADED with a generic
//! substitute text.

use chrono::Utc;
use kickoff_capabilities::{CapabilityRegistry, CapabilityTable, default_registry};
use kickoff_config::{AppConfig, ConfigError};
use kickoff_core::backend::ExecutionBackend;
use kickoff_core::capability::{CapabilityDescriptor, CapabilityOwner};
use kickoff_core::context::ExecutionContext;
use kickoff_core::error::{DispatchError, Error, RoutingError};
use kickoff_core::event::{DomainEvent, EventBus};
use kickoff_core::ledger::Ledger;
use kickoff_core::membership::MembershipProvider;
use kickoff_core::message::{InboundMessage, Reply, ReplyStatus};
use kickoff_core::permission::{Decision, Denial};
use kickoff_core::role::Role;
use kickoff_core::verdict::ValidationVerdict;
use kickoff_dispatch::{DispatchPolicy, ExecutionDispatcher, build_request};
use kickoff_permissions::{
    AuditEvent, AuditLogger, AuditOutcome, PermissionPolicy, PermissionResolver, RetryPolicy,
    RoleCache, SuccessionSweeper, TracingSink,
};
use kickoff_routing::{ContextBuilder, IntentSource, OwnerSelector, Selection, UNKNOWN_INTENT};
use kickoff_validation::ConsistencyValidator;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Everything known about one handled request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestOutcome {
    pub reply: Reply,
    pub request_id: String,
    pub intent: String,
    pub owner: String,
    pub fallback: bool,
    /// Capabilities the backend was allowed to call
    pub allowed: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger: Option<Ledger>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<ValidationVerdict>,
}

/// Routing decision for a message, without executing it.
#[derive(Debug, Clone, Serialize)]
pub struct RoutePlan {
    pub request_id: String,
    pub intent: String,
    pub intent_source: IntentSource,
    pub owner: String,
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate: Option<String>,
    pub primary_role: Role,
    pub degraded_roles: bool,
    pub allowed: Vec<String>,
    /// Why the request would be denied, if it would be
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denial: Option<String>,
}

enum Authorization {
    Allowed(Vec<Arc<CapabilityDescriptor>>),
    Denied(Denial),
}

pub struct RequestPipeline {
    builder: ContextBuilder,
    selector: OwnerSelector,
    registry: Arc<CapabilityRegistry>,
    resolver: Arc<PermissionResolver>,
    dispatcher: ExecutionDispatcher,
    validator: ConsistencyValidator,
    provider: Arc<dyn MembershipProvider>,
    retry: RetryPolicy,
    events: Arc<EventBus>,
    audit: Arc<AuditLogger>,
    degraded_message: String,
}

impl RequestPipeline {
    /// Wire every component from configuration.
    ///
    /// Fails on an invalid capability table or route table; both are
    /// startup-only errors.
    pub fn from_config(
        config: &AppConfig,
        backend: Arc<dyn ExecutionBackend>,
        provider: Arc<dyn MembershipProvider>,
    ) -> Result<Self, Error> {
        let registry = Arc::new(default_registry(
            config.registry.builtin,
            config.registry.manifest_dir.as_deref().map(Path::new),
            config.registry.max_capabilities_per_owner,
        )?);

        let selector = OwnerSelector::from_config(&config.routing)?;
        let table = registry.snapshot();
        selector.table().validate(&table)?;
        if !table.has_owner(selector.fallback_owner()) {
            return Err(RoutingError::UnknownOwner {
                intent: UNKNOWN_INTENT.into(),
                owner: selector.fallback_owner().into(),
            }
            .into());
        }

        let audit = Arc::new(AuditLogger::with_sinks(vec![Box::new(TracingSink)]));
        let events = Arc::new(EventBus::default());
        let retry = RetryPolicy::from_config(&config.permissions);
        let policy = PermissionPolicy::builtin()
            .with_overrides(&config.permissions.rules)
            .map_err(config_error)?;
        let cache = Arc::new(RoleCache::new(Duration::from_secs(
            config.permissions.role_cache_ttl_secs,
        )));
        let resolver = Arc::new(
            PermissionResolver::new(provider.clone(), cache, policy)
                .with_retry(retry)
                .with_audit(audit.clone()),
        );

        info!(
            capabilities = table.len(),
            routes = selector.table().len(),
            fallback_owner = selector.fallback_owner(),
            backend = backend.name(),
            provider = provider.name(),
            "Request pipeline ready"
        );

        Ok(Self {
            builder: ContextBuilder::new(resolver.clone()),
            selector,
            registry,
            resolver,
            dispatcher: ExecutionDispatcher::new(backend, DispatchPolicy::from_config(&config.dispatch)),
            validator: ConsistencyValidator::from_config(&config.validation)?,
            provider,
            retry,
            events,
            audit,
            degraded_message: config.validation.degraded_message.clone(),
        })
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn selector(&self) -> &OwnerSelector {
        &self.selector
    }

    pub fn resolver(&self) -> &Arc<PermissionResolver> {
        &self.resolver
    }

    pub fn dispatcher(&self) -> &ExecutionDispatcher {
        &self.dispatcher
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    /// A succession sweeper sharing this pipeline's provider, cache, audit
    /// log and event bus.
    pub fn succession_sweeper(&self) -> SuccessionSweeper {
        SuccessionSweeper::new(self.provider.clone(), self.resolver.cache().clone())
            .with_retry(self.retry)
            .with_audit(self.audit.clone())
            .with_events(self.events.clone())
    }

    /// Handle one message and return the reply.
    pub async fn handle(&self, message: InboundMessage) -> Reply {
        self.process(message).await.reply
    }

    /// Handle one message, keeping the routing, ledger and verdict.
    pub async fn process(&self, message: InboundMessage) -> RequestOutcome {
        let context = self.builder.build(message).await;
        let request_id = context.request_id().to_string();
        self.events.publish(DomainEvent::RequestReceived {
            request_id: request_id.clone(),
            requester_id: context.requester_id().into(),
            team_scope_id: context.team_scope_id().into(),
            timestamp: Utc::now(),
        });

        let selection = self.selector.select_for(&context);
        self.events.publish(DomainEvent::OwnerSelected {
            request_id: request_id.clone(),
            intent: selection.intent.name.clone(),
            owner: selection.owner.clone(),
            fallback: selection.fallback,
            timestamp: Utc::now(),
        });

        let mut outcome = RequestOutcome {
            reply: Reply::degraded(&self.degraded_message),
            request_id,
            intent: selection.intent.name.clone(),
            owner: selection.owner.clone(),
            fallback: selection.fallback,
            allowed: Vec::new(),
            ledger: None,
            verdict: None,
        };

        let table = self.registry.snapshot();
        let Some(owner) = table.owner(&selection.owner) else {
            error!(
                owner = %selection.owner,
                context = %to_json(&context),
                "Selected owner missing from capability table"
            );
            return outcome;
        };

        let allowed = match self.authorize(&context, &selection, &table) {
            Authorization::Allowed(allowed) => allowed,
            Authorization::Denied(denial) => {
                self.events.publish(DomainEvent::PermissionDenied {
                    request_id: outcome.request_id.clone(),
                    capability: denial.capability.clone(),
                    reason: denial.to_string(),
                    timestamp: Utc::now(),
                });
                warn!(
                    request_id = %outcome.request_id,
                    owner = %selection.owner,
                    reason = %denial,
                    context = %to_json(&context),
                    "Request denied"
                );
                outcome.reply = Reply::denied(denial_text(&denial));
                return outcome;
            }
        };
        outcome.allowed = allowed.iter().map(|c| c.name.clone()).collect();

        let request = build_request(&context, &selection.intent.name, owner, &allowed);
        let dispatched = match self.dispatcher.dispatch(request).await {
            Ok(dispatched) => dispatched,
            Err(e) => {
                self.dispatch_failed(&context, owner, &e);
                return outcome;
            }
        };

        let verdict = self
            .validator
            .validate(&dispatched.text, &dispatched.ledger, &table);
        let status = if verdict.passed {
            ReplyStatus::Ok
        } else {
            ReplyStatus::Degraded
        };
        self.events.publish(DomainEvent::ExecutionCompleted {
            request_id: outcome.request_id.clone(),
            owner: owner.id.clone(),
            invocations: dispatched.ledger.len(),
            duration_ms: dispatched.duration.as_millis() as u64,
            status,
            timestamp: Utc::now(),
        });

        if verdict.passed {
            info!(
                request_id = %outcome.request_id,
                intent = %selection.intent.name,
                owner = %owner.id,
                invocations = dispatched.ledger.len(),
                "Request answered"
            );
            self.validation_passed(&context, owner, &verdict);
            outcome.reply = Reply::ok(dispatched.text);
        } else {
            self.validation_failed(&context, owner, &dispatched.ledger, &verdict);
        }
        outcome.ledger = Some(dispatched.ledger);
        outcome.verdict = Some(verdict);
        outcome
    }

    /// Route a message and check permissions without calling the backend.
    pub async fn plan(&self, message: InboundMessage) -> RoutePlan {
        let context = self.builder.build(message).await;
        let selection = self.selector.select_for(&context);
        let table = self.registry.snapshot();

        let (allowed, denial) = match self.authorize(&context, &selection, &table) {
            Authorization::Allowed(allowed) => (allowed.iter().map(|c| c.name.clone()).collect(), None),
            Authorization::Denied(denial) => (Vec::new(), Some(denial.to_string())),
        };

        RoutePlan {
            request_id: context.request_id().to_string(),
            intent: selection.intent.name,
            intent_source: selection.intent.source,
            owner: selection.owner,
            fallback: selection.fallback,
            gate: selection.gate,
            primary_role: context.roles().primary_role(),
            degraded_roles: context.roles().degraded,
            allowed,
            denial,
        }
    }

    /// The gate decides first. Then the owner's capabilities are filtered to
    /// the permitted subset; an owner left with nothing permitted is a denial.
    fn authorize(
        &self,
        context: &ExecutionContext,
        selection: &Selection,
        table: &CapabilityTable,
    ) -> Authorization {
        let roles = context.roles();
        let scope = context.chat_scope();

        if let Some(gate) = &selection.gate {
            match table.resolve(gate) {
                Ok(descriptor) => {
                    if let Decision::Denied(denial) = self.resolver.check(&descriptor, roles, scope) {
                        return Authorization::Denied(denial);
                    }
                }
                Err(e) => warn!(gate = %gate, error = %e, "Route gate not in capability table"),
            }
        }

        let capabilities = table.get_capabilities_for(&selection.owner);
        let permitted = self.resolver.permitted(&capabilities, roles, scope);
        if permitted.is_empty() {
            if let Some(first) = capabilities.first() {
                if let Decision::Denied(denial) = self.resolver.check(first, roles, scope) {
                    return Authorization::Denied(denial);
                }
            }
        }
        Authorization::Allowed(permitted)
    }

    fn dispatch_failed(&self, context: &ExecutionContext, owner: &CapabilityOwner, e: &DispatchError) {
        error!(
            request_id = %context.request_id(),
            owner = %owner.id,
            error = %e,
            context = %to_json(context),
            "Execution failed, replying degraded"
        );
        self.audit.log(
            AuditEvent::DispatchFailed {
                owner: owner.id.clone(),
            },
            context.requester_id(),
            context.team_scope_id(),
            AuditOutcome::Degraded,
            Some(e.to_string()),
        );
        self.events.publish(DomainEvent::ExecutionCompleted {
            request_id: context.request_id().to_string(),
            owner: owner.id.clone(),
            invocations: 0,
            duration_ms: 0,
            status: ReplyStatus::Degraded,
            timestamp: Utc::now(),
        });
    }

    fn validation_passed(
        &self,
        context: &ExecutionContext,
        owner: &CapabilityOwner,
        verdict: &ValidationVerdict,
    ) {
        let details = match &verdict.matched_shape {
            Some(shape) => format!("listings checked: {}; shape: {shape}", verdict.listings_checked),
            None => format!("listings checked: {}", verdict.listings_checked),
        };
        self.audit.log(
            AuditEvent::ValidationPassed {
                owner: owner.id.clone(),
            },
            context.requester_id(),
            context.team_scope_id(),
            AuditOutcome::Success,
            Some(details),
        );
    }

    fn validation_failed(
        &self,
        context: &ExecutionContext,
        owner: &CapabilityOwner,
        ledger: &Ledger,
        verdict: &ValidationVerdict,
    ) {
        let reasons: Vec<String> = verdict.reasons.iter().map(ToString::to_string).collect();
        warn!(
            request_id = %context.request_id(),
            owner = %owner.id,
            reasons = %reasons.join("; "),
            context = %to_json(context),
            ledger = %to_json(ledger),
            "Answer failed validation, replying degraded"
        );
        self.audit.log(
            AuditEvent::ValidationFailed {
                owner: owner.id.clone(),
            },
            context.requester_id(),
            context.team_scope_id(),
            AuditOutcome::Degraded,
            Some(reasons.join("; ")),
        );
        self.events.publish(DomainEvent::ValidationFailed {
            request_id: context.request_id().to_string(),
            reasons,
            timestamp: Utc::now(),
        });
    }
}

fn denial_text(denial: &Denial) -> String {
    format!("Sorry, you can't do that: {denial}.")
}

fn config_error(e: ConfigError) -> Error {
    Error::Config {
        message: e.to_string(),
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}
