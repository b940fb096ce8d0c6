//! The execution dispatcher.
//!
//! Builds the task payload for one request, runs the backend under a bounded
//! timeout, and turns the backend's ledger into an append-only [`Ledger`].
//!
//! Retry rules:
//! - A timeout is retried once; the second timeout is final
//! - A transport failure is retried up to `max_attempts` in total, with
//!   exponential backoff capped at `backoff_max`
//! - Anything else, including a call outside the allowed set, is final

use chrono::Utc;
use kickoff_config::DispatchConfig;
use kickoff_core::backend::{ExecutionBackend, LedgerEntry, TaskRequest};
use kickoff_core::capability::{CapabilityDescriptor, CapabilityOwner};
use kickoff_core::context::{BASE_CONTEXT_KEYS, ExecutionContext};
use kickoff_core::error::DispatchError;
use kickoff_core::ledger::{InvocationRecord, Ledger};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Attempts allowed when the backend keeps timing out.
pub const TIMEOUT_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy)]
pub struct DispatchPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

impl DispatchPolicy {
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            timeout: config.timeout(),
            max_attempts: config.max_attempts.max(1),
            backoff_initial: Duration::from_millis(config.backoff_initial_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
        }
    }
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::default())
    }
}

/// A completed execution.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub text: String,
    pub ledger: Ledger,
    pub attempts: u32,
    pub duration: Duration,
}

/// Build the task payload.
///
/// `named_context` holds the base keys plus every key the allowed
/// capabilities declare, each as its own flat string value.
pub fn build_request(
    context: &ExecutionContext,
    intent: &str,
    owner: &CapabilityOwner,
    allowed: &[Arc<CapabilityDescriptor>],
) -> TaskRequest {
    let mut keys: BTreeSet<&str> = BASE_CONTEXT_KEYS.iter().copied().collect();
    for capability in allowed {
        keys.extend(capability.context_keys());
    }

    let named_context: BTreeMap<String, String> = keys
        .into_iter()
        .filter_map(|key| {
            let value = match key {
                "intent" => Some(intent.to_string()),
                "owner" => Some(owner.id.clone()),
                _ => context.value(key),
            };
            value.map(|v| (key.to_string(), v))
        })
        .collect();

    let purpose = if owner.purpose.is_empty() {
        owner.id.as_str()
    } else {
        owner.purpose.as_str()
    };

    TaskRequest {
        description: format!(
            "{purpose}. Answer the team member's request using only the allowed capabilities; \
             pass context values by their names.\n\nRequest: {}",
            context.text()
        ),
        named_context,
        allowed_capabilities: allowed.iter().map(|c| c.name.clone()).collect(),
    }
}

pub struct ExecutionDispatcher {
    backend: Arc<dyn ExecutionBackend>,
    policy: DispatchPolicy,
}

impl ExecutionDispatcher {
    pub fn new(backend: Arc<dyn ExecutionBackend>, policy: DispatchPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn backend(&self) -> &Arc<dyn ExecutionBackend> {
        &self.backend
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// Run one task. A timed-out attempt's partial ledger is discarded.
    pub async fn dispatch(&self, request: TaskRequest) -> Result<DispatchOutcome, DispatchError> {
        let started = Instant::now();
        let mut attempts = 0;
        let mut timeouts = 0;
        let mut transport_failures = 0;
        let mut delay = self.policy.backoff_initial;

        loop {
            attempts += 1;
            debug!(
                backend = self.backend.name(),
                attempt = attempts,
                allowed = request.allowed_capabilities.len(),
                "Dispatching task"
            );

            match tokio::time::timeout(self.policy.timeout, self.backend.execute(request.clone())).await {
                Ok(Ok(response)) => {
                    let ledger = collect_ledger(response.invocation_ledger, &request.allowed_capabilities)?;
                    let duration = started.elapsed();
                    info!(
                        backend = self.backend.name(),
                        attempts,
                        invocations = ledger.len(),
                        duration_ms = duration.as_millis() as u64,
                        "Task completed"
                    );
                    return Ok(DispatchOutcome {
                        text: response.text,
                        ledger,
                        attempts,
                        duration,
                    });
                }
                Ok(Err(e)) if e.is_transport() => {
                    transport_failures += 1;
                    if transport_failures >= self.policy.max_attempts {
                        warn!(backend = self.backend.name(), attempts, error = %e, "Backend unavailable, giving up");
                        return Err(e);
                    }
                    warn!(
                        backend = self.backend.name(),
                        attempt = attempts,
                        backoff_ms = delay.as_millis() as u64,
                        error = %e,
                        "Backend transport failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(self.policy.backoff_max);
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    timeouts += 1;
                    let budget_ms = self.policy.timeout.as_millis() as u64;
                    if timeouts >= TIMEOUT_ATTEMPTS {
                        warn!(backend = self.backend.name(), attempts, budget_ms, "Backend timed out, giving up");
                        return Err(DispatchError::ExecutionTimeout { budget_ms, attempts });
                    }
                    warn!(backend = self.backend.name(), budget_ms, "Backend timed out, retrying once");
                }
            }
        }
    }

    pub async fn health_check(&self) -> Result<bool, DispatchError> {
        self.backend.health_check().await
    }
}

/// Check every reported call against the allowed set and stamp missing
/// timestamps with the receipt time.
fn collect_ledger(
    entries: Vec<LedgerEntry>,
    allowed: &[String],
) -> Result<Ledger, DispatchError> {
    let received = Utc::now();
    entries
        .into_iter()
        .map(|entry| {
            if !allowed.iter().any(|a| a == &entry.capability) {
                return Err(DispatchError::OutOfScopeInvocation {
                    capability: entry.capability,
                });
            }
            Ok(InvocationRecord {
                capability: entry.capability,
                params: entry.params,
                result: entry.result,
                timestamp: entry.timestamp.unwrap_or(received),
            })
        })
        .collect()
}
