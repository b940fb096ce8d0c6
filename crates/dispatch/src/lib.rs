//! Execution dispatch for Kickoff.
//!
//! The [`ExecutionDispatcher`] runs one task against an [`ExecutionBackend`]
//! under a bounded timeout with transport retries. [`HttpBackend`] is the
//! production backend client.
//!
//! [`ExecutionBackend`]: kickoff_core::ExecutionBackend

pub mod dispatcher;
pub mod http;

pub use dispatcher::{DispatchOutcome, DispatchPolicy, ExecutionDispatcher, TIMEOUT_ATTEMPTS, build_request};
pub use http::HttpBackend;
