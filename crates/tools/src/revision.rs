//! Request-revision action: lets the model abandon the current plan.
//!
//! The handler only validates and acknowledges. The turn executor notices a
//! successful call by name and ends the attempt with a revision request.

use async_trait::async_trait;
use loopwright_core::action::{Action, ActionOutput};
use loopwright_core::error::ActionError;
use loopwright_core::plan::RevisionContext;

pub const DEFAULT_REVISION_ACTION: &str = "request_revision";

pub struct RequestRevisionAction {
    name: String,
}

impl RequestRevisionAction {
    pub fn new() -> Self {
        Self::named(DEFAULT_REVISION_ACTION)
    }

    /// Register under a different action name.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for RequestRevisionAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Action for RequestRevisionAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Abandon the current plan and ask for a new one. Call this when an assumption of the plan turned out to be wrong. Say what was already completed and what you discovered so the new plan does not repeat finished work."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "reason": {
                    "type": "string",
                    "description": "Why the current plan no longer works"
                },
                "completed_steps": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Steps already done"
                },
                "discoveries": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Facts learned that the new plan should use"
                }
            },
            "required": ["reason"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ActionOutput, ActionError> {
        let context = RevisionContext::from_arguments(&arguments)?;
        let mut output = ActionOutput::ok(format!("Revision requested: {}", context.reason));
        output.data = serde_json::to_value(&context).ok();
        Ok(output)
    }
}
