//! Permission resolution for Kickoff.
//!
//! Provides:
//! - **Resolver**: membership record → [`RoleAssignment`](kickoff_core::RoleAssignment), fail-closed
//! - **Policy**: capability → requirement, with config overrides
//! - **Role cache**: short-TTL, keyed by (identity, team scope)
//! - **Succession**: periodic promotion when a team has no administrator
//! - **Membership providers**: in-memory roster or a remote HTTP service
//! - **Audit logging**: structured record of denials and promotions

pub mod audit;
pub mod cache;
pub mod http;
pub mod in_memory;
pub mod policy;
pub mod resolver;
pub mod succession;

pub use audit::{AuditEntry, AuditEvent, AuditLogger, AuditOutcome, AuditSink, TracingSink};
pub use cache::RoleCache;
pub use http::HttpMembership;
pub use in_memory::InMemoryMembership;
pub use policy::PermissionPolicy;
pub use resolver::{PermissionResolver, RetryPolicy};
pub use succession::{Promotion, SuccessionSweeper};
