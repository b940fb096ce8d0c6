//! # Kickoff Core
//!
//! Domain types, traits, and error definitions for the Kickoff
//! request-routing core. This crate has **zero framework dependencies**:
//! it defines the domain model that all other crates implement against.
//!
//! ## Request flow
//!
//! ```text
//! InboundMessage ─▶ ExecutionContext ─▶ CapabilityOwner ─▶ ExecutionBackend
//!                   (RoleAssignment)                        │
//!                                                           ▼
//!            Reply ◀─ ValidationVerdict ◀─ (text, Ledger of InvocationRecord)
//! ```
//!
//! External collaborators (the execution backend and the membership data
//! provider) are traits here; implementations live in their own crates.

pub mod backend;
pub mod capability;
pub mod context;
pub mod error;
pub mod event;
pub mod ledger;
pub mod membership;
pub mod message;
pub mod permission;
pub mod role;
pub mod scope;
pub mod verdict;

// Re-export key types at crate root for ergonomics
pub use backend::{ExecutionBackend, LedgerEntry, TaskRequest, TaskResponse};
pub use capability::{
    CapabilityDescriptor, CapabilityOwner, Cardinality, ParamType, ParameterSpec, ResultShape,
    SideEffect,
};
pub use context::ExecutionContext;
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus, log_events};
pub use ledger::{InvocationRecord, Ledger};
pub use membership::{MembershipProvider, MembershipRecord};
pub use message::{InboundMessage, Reply, ReplyStatus};
pub use permission::{Decision, Denial, Requirement};
pub use role::{Role, RoleAssignment, RoleSet};
pub use scope::ChatScope;
pub use verdict::{Inconsistency, ValidationVerdict};
