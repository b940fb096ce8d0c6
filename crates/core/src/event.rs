//! Domain event system: decoupled notification of request outcomes.
//!
//! Events are published when something interesting happens in the pipeline.
//! Other components can subscribe to react without tight coupling. The
//! binary subscribes [`log_events`] so every event reaches the log; further
//! subscribers (metrics, notifications) attach the same way.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::message::ReplyStatus;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// An inbound message was accepted
    RequestReceived {
        request_id: String,
        requester_id: String,
        team_scope_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A capability owner was selected for a request
    OwnerSelected {
        request_id: String,
        intent: String,
        owner: String,
        fallback: bool,
        timestamp: DateTime<Utc>,
    },

    /// A permission check failed
    PermissionDenied {
        request_id: String,
        capability: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// The execution backend returned (or gave up)
    ExecutionCompleted {
        request_id: String,
        owner: String,
        invocations: usize,
        duration_ms: u64,
        status: ReplyStatus,
        timestamp: DateTime<Utc>,
    },

    /// The consistency validator rejected an answer
    ValidationFailed {
        request_id: String,
        reasons: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// Automatic succession promoted a member
    AdministratorPromoted {
        team_scope_id: String,
        identity: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

/// Write every event from `receiver` to the log until the bus is dropped.
/// Returns the number of events logged.
pub async fn log_events(mut receiver: broadcast::Receiver<Arc<DomainEvent>>) -> u64 {
    let mut logged = 0;
    loop {
        match receiver.recv().await {
            Ok(event) => {
                logged += 1;
                let json = serde_json::to_string(event.as_ref()).unwrap_or_default();
                info!(event = %json, "Domain event");
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event log fell behind"),
            Err(RecvError::Closed) => return logged,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
