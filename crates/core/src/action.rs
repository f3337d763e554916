//! Action trait: the abstraction over agent capabilities.
//!
//! Actions are what let the agent affect the world: run shell commands,
//! read/write files, ask a person, request a new plan. Each one declares a
//! schema the reasoning service sees and a handler that turns an argument
//! payload into text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::error::{ActionError, RegistryError};

/// A declared action, as sent to the reasoning service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// The action name
    pub name: String,

    /// Description of what the action does
    pub description: String,

    /// JSON Schema describing the action's arguments
    pub parameters: serde_json::Value,
}

/// The textual result of one action invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutput {
    /// Whether the underlying operation succeeded
    pub success: bool,

    /// The text recorded in the transcript
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ActionOutput {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            data: None,
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            data: None,
        }
    }
}

/// The core Action trait.
///
/// Handlers see only their argument payload, never the transcript. Anything
/// that can block (processes, people) must bound itself or be cancellable by
/// dropping the future.
#[async_trait]
pub trait Action: Send + Sync {
    /// The unique name of this action (e.g., "shell", "read_file").
    fn name(&self) -> &str;

    /// A description of what this action does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this action's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the action with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ActionOutput, ActionError>;

    /// Convert this action into a descriptor for the model.
    fn descriptor(&self) -> ActionDescriptor {
        ActionDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// The catalog of actions available to a run.
///
/// Built once, then shared read-only (usually behind an `Arc`) by every run
/// that uses it.
pub struct ActionRegistry {
    actions: BTreeMap<String, Box<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            actions: BTreeMap::new(),
        }
    }

    /// Register an action. Names must be unique and schemas well-formed.
    pub fn register(&mut self, action: Box<dyn Action>) -> std::result::Result<(), RegistryError> {
        let descriptor = action.descriptor();
        validate_descriptor(&descriptor)?;
        if self.actions.contains_key(&descriptor.name) {
            return Err(RegistryError::Duplicate(descriptor.name));
        }
        self.actions.insert(descriptor.name, action);
        Ok(())
    }

    /// Builder-style registration.
    pub fn with(mut self, action: Box<dyn Action>) -> std::result::Result<Self, RegistryError> {
        self.register(action)?;
        Ok(self)
    }

    /// Look up an action by name.
    pub fn resolve(&self, name: &str) -> std::result::Result<&dyn Action, ActionError> {
        self.actions
            .get(name)
            .map(|a| a.as_ref())
            .ok_or_else(|| ActionError::Unknown(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// All descriptors, sorted by name.
    pub fn describe(&self) -> Vec<ActionDescriptor> {
        self.actions.values().map(|a| a.descriptor()).collect()
    }

    /// Resolve and execute in one call.
    pub async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> std::result::Result<ActionOutput, ActionError> {
        self.resolve(name)?.execute(arguments).await
    }

    /// List all registered action names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.actions.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject descriptors the model could not call correctly.
fn validate_descriptor(descriptor: &ActionDescriptor) -> std::result::Result<(), RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidSchema {
        action: descriptor.name.clone(),
        reason: reason.to_string(),
    };

    if descriptor.name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }

    let schema = descriptor
        .parameters
        .as_object()
        .ok_or_else(|| invalid("schema must be a JSON object"))?;

    if schema.get("type").and_then(|t| t.as_str()) != Some("object") {
        return Err(invalid("schema type must be \"object\""));
    }

    let properties = schema.get("properties").and_then(|p| p.as_object());
    if let Some(required) = schema.get("required") {
        let required = required
            .as_array()
            .ok_or_else(|| invalid("\"required\" must be an array"))?;
        for field in required {
            let field = field
                .as_str()
                .ok_or_else(|| invalid("\"required\" entries must be strings"))?;
            if !properties.is_some_and(|p| p.contains_key(field)) {
                return Err(invalid(&format!("required field '{field}' is not declared")));
            }
        }
    }

    Ok(())
}
