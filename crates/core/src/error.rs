//! Error types for the Kickoff domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

use crate::permission::Denial;

/// The top-level error type for all Kickoff operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Registry errors (fatal at startup only) ---
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    // --- Route table errors (fatal at startup only) ---
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    // --- Permission errors ---
    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),

    // --- Execution backend errors ---
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    // --- Output validation ---
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // --- Membership data provider ---
    #[error("Data provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Duplicate capability: {0}")]
    DuplicateCapability(String),

    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    #[error("Duplicate capability owner: {0}")]
    DuplicateOwner(String),

    #[error("Capability '{capability}' references unknown owner '{owner}'")]
    UnknownOwner { capability: String, owner: String },

    #[error(
        "Mutating capability '{capability}' listed under '{listed_under}' but owned by '{owner}'"
    )]
    OwnershipViolation {
        capability: String,
        owner: String,
        listed_under: String,
    },

    #[error("Owner '{owner}' lists {count} capabilities (max {max})")]
    OwnerTooLarge { owner: String, count: usize, max: usize },

    #[error("Parameter hygiene violation in '{capability}': {reason}")]
    ParameterHygiene { capability: String, reason: String },

    #[error("Capability discovery failed in {source_name}: {reason}")]
    Discovery { source_name: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("Route for intent '{intent}' names unknown owner '{owner}'")]
    UnknownOwner { intent: String, owner: String },

    #[error("Route for intent '{intent}' is gated on '{capability}', which '{owner}' does not hold")]
    GateNotOwned {
        intent: String,
        capability: String,
        owner: String,
    },

    #[error("Route names unknown intent '{0}'")]
    UnknownIntent(String),

    #[error("Invalid pattern for intent '{intent}': {reason}")]
    InvalidPattern { intent: String, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum PermissionError {
    #[error("Permission denied: {0}")]
    Denied(Denial),
}

#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("Execution timed out after {attempts} attempt(s) ({budget_ms}ms budget each)")]
    ExecutionTimeout { budget_ms: u64, attempts: u32 },

    #[error("Execution backend transport failure: {0}")]
    Transport(String),

    #[error("Execution backend error (status {status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Execution backend returned a malformed response: {0}")]
    MalformedResponse(String),

    #[error("Execution backend invoked '{capability}', which is outside the allowed set")]
    OutOfScopeInvocation { capability: String },
}

impl DispatchError {
    /// Whether this failure is a transport-level failure that may be retried.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Backend { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Answer is inconsistent with the invocation ledger: {}", reasons.join("; "))]
    Failed { reasons: Vec<String> },
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Membership data provider unavailable: {0}")]
    Unavailable(String),

    #[error("Membership data provider rejected the request: {0}")]
    Rejected(String),
}

impl ProviderError {
    /// Whether this failure is a transport-level failure that may be retried.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
