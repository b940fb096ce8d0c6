//! The Kickoff request pipeline.
//!
//! Wires the capability registry, permission resolver, context builder,
//! owner selector, execution dispatcher and consistency validator into one
//! [`RequestPipeline`] that turns an inbound message into a reply.

pub mod pipeline;

pub use pipeline::{RequestOutcome, RequestPipeline, RoutePlan};
