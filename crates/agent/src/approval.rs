//! Approval gate. A person (or a policy) vets each action before it runs.

use async_trait::async_trait;
use loopwright_core::transcript::ActionRequest;
use loopwright_tools::Prompter;
use std::sync::Arc;
use tracing::warn;

/// Verdict on one action request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Approval {
    Approve,
    /// Recorded as the action's result; the handler never runs.
    Deny(String),
}

#[async_trait]
pub trait ApprovalGate: Send + Sync {
    async fn review(&self, request: &ActionRequest) -> Approval;
}

/// Approves everything.
pub struct AutoApprove;

#[async_trait]
impl ApprovalGate for AutoApprove {
    async fn review(&self, _request: &ActionRequest) -> Approval {
        Approval::Approve
    }
}

/// Asks through a [`Prompter`]; only `y` or `yes` approves.
pub struct PromptApproval {
    prompter: Arc<dyn Prompter>,
}

impl PromptApproval {
    pub fn new(prompter: Arc<dyn Prompter>) -> Self {
        Self { prompter }
    }
}

#[async_trait]
impl ApprovalGate for PromptApproval {
    async fn review(&self, request: &ActionRequest) -> Approval {
        let question = format!(
            "Allow action '{}' with arguments {}? [y/N]",
            request.name, request.arguments
        );
        match self.prompter.ask(&question).await {
            Ok(answer) if matches!(answer.to_lowercase().as_str(), "y" | "yes") => Approval::Approve,
            Ok(_) => Approval::Deny(format!("user declined '{}'", request.name)),
            Err(e) => {
                warn!(action = %request.name, error = %e, "Approval prompt failed");
                Approval::Deny(format!("approval for '{}' could not be obtained: {e}", request.name))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopwright_tools::ScriptedPrompter;

    fn request() -> ActionRequest {
        ActionRequest::new("call_1", "shell", r#"{"command":"ls"}"#)
    }

    #[tokio::test]
    async fn yes_approves_anything_else_denies() {
        let prompter = Arc::new(ScriptedPrompter::new(["YES", "n"]));
        let gate = PromptApproval::new(prompter.clone());

        assert_eq!(gate.review(&request()).await, Approval::Approve);
        assert!(matches!(gate.review(&request()).await, Approval::Deny(_)));
        assert!(prompter.questions()[0].contains("'shell'"));
    }

    #[tokio::test]
    async fn prompt_failure_denies() {
        let gate = PromptApproval::new(Arc::new(ScriptedPrompter::new(Vec::<String>::new())));
        match gate.review(&request()).await {
            Approval::Deny(reason) => assert!(reason.contains("could not be obtained")),
            Approval::Approve => panic!("expected denial"),
        }
    }
}
