//! Capability trait: the abstraction over what the agent can do.
//!
//! A capability is a named unit of work (brainstorm ideas, outline an essay,
//! count words) that the reasoning engine may select. Each one declares a
//! [`CapabilitySchema`] so the action executor can validate arguments
//! before dispatch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use crate::error::CapabilityError;

/// Capability arguments: an ordered key → value map.
pub type CapabilityArgs = serde_json::Map<String, Value>;

/// The declared type of a capability argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

impl ArgType {
    /// Whether `value` satisfies this declared type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }

    /// Name of the JSON type actually carried by `value`.
    pub fn describe(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(n) if n.is_f64() => "number",
            Value::Number(_) => "integer",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

impl std::fmt::Display for ArgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Any => "any",
        };
        f.write_str(name)
    }
}

/// Broad capability category; drives the default execution timeout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityCategory {
    /// Produces new content (ideas, outlines, drafts)
    Generation,
    /// Inspects user content
    Analysis,
    /// Fetches reference material
    Lookup,
    #[default]
    Utility,
}

impl std::fmt::Display for CapabilityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Generation => "generation",
            Self::Analysis => "analysis",
            Self::Lookup => "lookup",
            Self::Utility => "utility",
        };
        f.write_str(name)
    }
}

/// The declared contract of a capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitySchema {
    /// What the capability does (shown to the LLM)
    pub description: String,

    /// Arguments that must be present after argument resolution
    #[serde(default)]
    pub required_args: Vec<String>,

    /// Declared argument types, required or optional
    #[serde(default)]
    pub arg_types: BTreeMap<String, ArgType>,

    #[serde(default)]
    pub category: CapabilityCategory,

    /// Explicit timeout; `None` falls back to configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Minimum decision confidence the selector needs to pick this capability
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Trigger words for the keyword selector
    #[serde(default)]
    pub keywords: Vec<String>,
}

fn default_confidence_threshold() -> f32 {
    0.6
}

impl CapabilitySchema {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            required_args: Vec::new(),
            arg_types: BTreeMap::new(),
            category: CapabilityCategory::default(),
            timeout_secs: None,
            confidence_threshold: default_confidence_threshold(),
            keywords: Vec::new(),
        }
    }

    /// Declare a required argument.
    pub fn require(mut self, name: &str, ty: ArgType) -> Self {
        self.required_args.push(name.to_string());
        self.arg_types.insert(name.to_string(), ty);
        self
    }

    /// Declare an optional, typed argument.
    pub fn optional(mut self, name: &str, ty: ArgType) -> Self {
        self.arg_types.insert(name.to_string(), ty);
        self
    }

    pub fn category(mut self, category: CapabilityCategory) -> Self {
        self.category = category;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs().max(1));
        self
    }

    pub fn confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| k.to_lowercase()).collect();
        self
    }
}

/// The core Capability trait.
///
/// Implementations receive fully resolved and validated arguments. A `Null`
/// result is legal; the executor replaces it with placeholder text.
#[async_trait]
pub trait Capability: Send + Sync {
    /// The unique name of this capability (e.g., "brainstorm").
    fn name(&self) -> &str;

    /// The declared schema.
    fn schema(&self) -> CapabilitySchema;

    /// Run the capability.
    async fn invoke(&self, args: CapabilityArgs) -> std::result::Result<Value, CapabilityError>;
}

/// An explicitly constructed registry of capabilities.
///
/// Built once at startup and shared as `Arc<CapabilityRegistry>` by the
/// reasoning engine and the action executor.
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
        }
    }

    /// Register a capability. Replaces any existing one with the same name.
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        let name = capability.name().to_string();
        self.capabilities.insert(name, capability);
    }

    pub fn has(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    /// Get a capability by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(name).cloned()
    }

    /// Get a capability's schema.
    pub fn describe(&self, name: &str) -> Option<CapabilitySchema> {
        self.capabilities.get(name).map(|c| c.schema())
    }

    /// All registered names, sorted for deterministic prompts.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.capabilities.keys().cloned().collect();
        names.sort();
        names
    }

    /// `(name, schema)` pairs, sorted by name.
    pub fn schemas(&self) -> Vec<(String, CapabilitySchema)> {
        self.names()
            .into_iter()
            .filter_map(|n| self.describe(&n).map(|s| (n, s)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
