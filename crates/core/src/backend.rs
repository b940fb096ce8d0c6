//! Execution backend trait: the abstraction over the non-deterministic
//! task executor.
//!
//! The backend is a black box: it receives a task description, a flat map
//! of named context values and the names of the capabilities it may call,
//! and returns its final answer plus the ledger of calls it made.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::DispatchError;

/// The task payload sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    /// What the executor should do
    pub description: String,

    /// Every context value the executor may need, one key per value
    pub named_context: BTreeMap<String, String>,

    /// The only capabilities the executor may invoke
    pub allowed_capabilities: Vec<String>,
}

/// One call reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub capability: String,

    #[serde(default)]
    pub params: serde_json::Value,

    #[serde(default)]
    pub result: serde_json::Value,

    /// Backends may omit this; the dispatcher stamps receipt time instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// The backend's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub text: String,

    #[serde(default)]
    pub invocation_ledger: Vec<LedgerEntry>,
}

/// The core execution backend trait.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// The backend name (e.g., "http", "scripted").
    fn name(&self) -> &str;

    /// Run one task to completion.
    async fn execute(&self, request: TaskRequest) -> Result<TaskResponse, DispatchError>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> Result<bool, DispatchError> {
        Ok(true)
    }
}
