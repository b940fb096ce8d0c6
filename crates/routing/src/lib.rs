//! Request routing for Kickoff: context building, intent classification and
//! capability-owner selection.

pub mod builder;
pub mod intent;
pub mod selector;
pub mod table;

pub use builder::ContextBuilder;
pub use intent::{CATALOG, Intent, IntentClassifier, IntentSource, IntentSpec, UNKNOWN_INTENT};
pub use selector::{OwnerSelector, Selection};
pub use table::{RouteRule, RouteTable};
