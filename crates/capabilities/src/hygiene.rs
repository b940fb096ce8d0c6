//! Parameter hygiene: every declared parameter must be traceable to a source.
//!
//! The dispatcher decides which context values to expose to the executor by
//! reading declared parameters, so a parameter that names no real context
//! key, or an input nobody described, would leak or starve the executor.

use kickoff_core::capability::{CapabilityDescriptor, ParamType};
use kickoff_core::context::is_context_key;
use kickoff_core::error::RegistryError;
use std::collections::HashSet;

/// The context key every capability must take its team scope from.
pub const SCOPE_KEY: &str = "team_scope_id";

/// Check one descriptor against the hygiene rules.
pub fn check(descriptor: &CapabilityDescriptor) -> Result<(), RegistryError> {
    let fail = |reason: String| RegistryError::ParameterHygiene {
        capability: descriptor.name.clone(),
        reason,
    };

    if !is_valid_name(&descriptor.name) {
        return Err(fail(
            "name must be lowercase kebab-case (a-z, 0-9, '-')".into(),
        ));
    }

    let mut seen = HashSet::new();
    for param in &descriptor.parameters {
        if param.name.trim().is_empty() {
            return Err(fail("parameter with an empty name".into()));
        }
        if !seen.insert(param.name.as_str()) {
            return Err(fail(format!("parameter '{}' declared twice", param.name)));
        }
        match &param.context_key {
            Some(key) => {
                if !is_context_key(key) {
                    return Err(fail(format!(
                        "parameter '{}' sources unknown context key '{key}'",
                        param.name
                    )));
                }
                if key.starts_with("is_") && param.ty != ParamType::Boolean {
                    return Err(fail(format!(
                        "parameter '{}' sources boolean key '{key}' but is declared {:?}",
                        param.name, param.ty
                    )));
                }
            }
            None => {
                if param.description.trim().is_empty() {
                    return Err(fail(format!(
                        "input parameter '{}' has no description",
                        param.name
                    )));
                }
            }
        }
    }

    if !descriptor.context_keys().any(|k| k == SCOPE_KEY) {
        return Err(fail(format!(
            "no parameter sourced from '{SCOPE_KEY}'; scope must be passed explicitly"
        )));
    }

    Ok(())
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && !name.ends_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
