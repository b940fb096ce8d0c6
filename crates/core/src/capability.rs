//! Capability descriptors: the declared contract of every operation the
//! execution backend may invoke on behalf of a request.
//!
//! Capabilities themselves live in the external domain services. This crate
//! only knows their names, parameters, side effects and result shapes, which
//! is everything the router, the dispatcher and the validator need.

use serde::{Deserialize, Serialize};

/// Whether invoking a capability mutates state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    Read,
    Write,
}

/// Declared type of a capability parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Date,
    List,
}

/// A declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub ty: ParamType,

    /// When set, the value is supplied from this execution-context key
    /// rather than chosen by the executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_key: Option<String>,

    #[serde(default = "default_true")]
    pub required: bool,

    #[serde(default)]
    pub description: String,
}

fn default_true() -> bool {
    true
}

impl ParameterSpec {
    /// A parameter filled from the execution context. Named after its key.
    pub fn context(key: impl Into<String>, ty: ParamType) -> Self {
        let key = key.into();
        Self {
            name: key.clone(),
            ty,
            context_key: Some(key),
            required: true,
            description: String::new(),
        }
    }

    /// A parameter the executor derives from the user's message.
    pub fn input(name: impl Into<String>, ty: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty,
            context_key: None,
            required: true,
            description: description.into(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn is_from_context(&self) -> bool {
        self.context_key.is_some()
    }
}

/// How many entities a capability's result describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    Single,
    Many,
}

/// The entity category and cardinality of a capability's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultShape {
    pub category: String,
    pub cardinality: Cardinality,
}

/// The immutable description of a capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// Unique name (e.g. "get-self-status").
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,

    /// The capability owner this capability belongs to.
    pub owner: String,

    pub side_effect: SideEffect,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultShape>,
}

impl CapabilityDescriptor {
    pub fn read(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self::new(name, owner, SideEffect::Read)
    }

    pub fn write(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self::new(name, owner, SideEffect::Write)
    }

    fn new(name: impl Into<String>, owner: impl Into<String>, side_effect: SideEffect) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            parameters: Vec::new(),
            owner: owner.into(),
            side_effect,
            result: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn param(mut self, param: ParameterSpec) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn returns(mut self, category: impl Into<String>, cardinality: Cardinality) -> Self {
        self.result = Some(ResultShape {
            category: category.into(),
            cardinality,
        });
        self
    }

    pub fn is_mutating(&self) -> bool {
        self.side_effect == SideEffect::Write
    }

    /// Context keys this capability consumes.
    pub fn context_keys(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .iter()
            .filter_map(|p| p.context_key.as_deref())
    }
}

/// A component permitted to invoke a bounded set of capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityOwner {
    pub id: String,

    #[serde(default)]
    pub purpose: String,

    /// Capabilities listed explicitly, typically shared read-only lookups.
    /// Capabilities whose descriptor names this owner are included implicitly.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl CapabilityOwner {
    pub fn new(id: impl Into<String>, purpose: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            purpose: purpose.into(),
            capabilities: Vec::new(),
        }
    }

    pub fn sharing(mut self, names: &[&str]) -> Self {
        self.capabilities.extend(names.iter().map(|n| n.to_string()));
        self
    }
}
