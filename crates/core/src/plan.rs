//! Plan and revision types.
//!
//! A [`Plan`] is produced before execution and never mutated afterwards; a
//! replan produces a new one. A [`RevisionContext`] carries what an attempt
//! finished and learned into the next planning request.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Write as _;

use crate::error::ActionError;

/// A goal plus ordered steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub goal: String,
    pub steps: Vec<PlanStep>,
}

/// A single planned step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Step identifier; numbers and strings are both accepted.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    /// What the step intends to do.
    #[serde(alias = "intent", alias = "step")]
    pub description: String,

    /// The action the step expects to use.
    #[serde(default, alias = "tool", alias = "action_name")]
    pub action: String,

    /// Why the step is needed.
    #[serde(default, alias = "reason", alias = "why")]
    pub rationale: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "step id must be a string or number, got {other}"
        ))),
    }
}

impl Plan {
    /// Render the plan as numbered text for inclusion in a prompt.
    pub fn render(&self) -> String {
        let mut out = format!("Goal: {}\n", self.goal);
        for step in &self.steps {
            let _ = write!(out, "{}. {}", step.id, step.description);
            if !step.action.is_empty() {
                let _ = write!(out, " [action: {}]", step.action);
            }
            if !step.rationale.is_empty() {
                let _ = write!(out, " ({})", step.rationale);
            }
            out.push('\n');
        }
        out
    }

    /// Action names the plan refers to, in step order, without duplicates.
    pub fn referenced_actions(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for step in &self.steps {
            if !step.action.is_empty() && !names.contains(&step.action.as_str()) {
                names.push(&step.action);
            }
        }
        names
    }
}

/// What an abandoned attempt hands to the next planning request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevisionContext {
    pub reason: String,
    #[serde(default)]
    pub completed_steps: Vec<String>,
    #[serde(default)]
    pub discoveries: Vec<String>,
}

impl RevisionContext {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            ..Self::default()
        }
    }

    /// Parse the arguments of a revision request. The reason must be non-empty.
    pub fn from_arguments(arguments: &serde_json::Value) -> Result<Self, ActionError> {
        let ctx: Self = serde_json::from_value(arguments.clone())
            .map_err(|e| ActionError::InvalidArguments(format!("revision request: {e}")))?;
        if ctx.reason.trim().is_empty() {
            return Err(ActionError::InvalidArguments(
                "revision request needs a non-empty 'reason'".into(),
            ));
        }
        Ok(ctx)
    }

    pub fn render(&self) -> String {
        let mut out = format!("Reason for revision: {}\n", self.reason);
        if !self.completed_steps.is_empty() {
            out.push_str("Already completed:\n");
            for step in &self.completed_steps {
                let _ = writeln!(out, "- {step}");
            }
        }
        if !self.discoveries.is_empty() {
            out.push_str("Discovered:\n");
            for d in &self.discoveries {
                let _ = writeln!(out, "- {d}");
            }
        }
        out
    }
}

/// Input to a replanning request: the plan being replaced and why.
#[derive(Debug, Clone, Copy)]
pub struct Replan<'a> {
    pub previous: &'a Plan,
    pub context: &'a RevisionContext,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_ids_accept_numbers_and_aliases() {
        let plan: Plan = serde_json::from_str(
            r#"{"goal":"g","steps":[
                {"id":1,"description":"read","action":"read_file","rationale":"need input"},
                {"id":"s2","intent":"write","tool":"write_file","reason":"store"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(plan.steps[0].id, "1");
        assert_eq!(plan.steps[1].id, "s2");
        assert_eq!(plan.steps[1].description, "write");
        assert_eq!(plan.steps[1].action, "write_file");
        assert_eq!(plan.steps[1].rationale, "store");
    }

    #[test]
    fn render_includes_every_step() {
        let plan = Plan {
            goal: "Summarize logs".into(),
            steps: vec![PlanStep {
                id: "1".into(),
                description: "List log files".into(),
                action: "shell".into(),
                rationale: "find inputs".into(),
            }],
        };
        let text = plan.render();
        assert!(text.contains("Goal: Summarize logs"));
        assert!(text.contains("1. List log files [action: shell]"));
        assert_eq!(plan.referenced_actions(), vec!["shell"]);
    }

    #[test]
    fn revision_requires_reason() {
        let ok = RevisionContext::from_arguments(&serde_json::json!({
            "reason": "file missing",
            "discoveries": ["config lives in /etc/app"]
        }))
        .unwrap();
        assert_eq!(ok.reason, "file missing");
        assert!(ok.completed_steps.is_empty());
        assert!(ok.render().contains("/etc/app"));

        let err = RevisionContext::from_arguments(&serde_json::json!({"reason": "  "}));
        assert!(matches!(err, Err(ActionError::InvalidArguments(_))));
        let err = RevisionContext::from_arguments(&serde_json::json!({}));
        assert!(err.is_err());
    }
}
