//! Write-file action: create, overwrite or append to files.

use async_trait::async_trait;
use loopwright_core::action::{Action, ActionOutput};
use loopwright_core::error::ActionError;
use tokio::io::AsyncWriteExt;

use crate::path::PathPolicy;

pub struct WriteFileAction {
    policy: PathPolicy,
}

impl WriteFileAction {
    /// Create a write action with no path restrictions.
    pub fn new() -> Self {
        Self {
            policy: PathPolicy::unrestricted(),
        }
    }

    pub fn with_policy(mut self, policy: PathPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn failed(reason: impl Into<String>) -> ActionError {
        ActionError::ExecutionFailed {
            action: "write_file".into(),
            reason: reason.into(),
        }
    }
}

impl Default for WriteFileAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Action for WriteFileAction {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write text to a file, creating parent directories as needed. Overwrites by default; set append to add to the end."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to write"
                },
                "content": {
                    "type": "string",
                    "description": "The text to write"
                },
                "append": {
                    "type": "boolean",
                    "description": "Append instead of overwriting (default: false)"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ActionOutput, ActionError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ActionError::InvalidArguments("Missing 'path' argument".into()))?;

        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ActionError::InvalidArguments("Missing 'content' argument".into()))?;

        let append = arguments["append"].as_bool().unwrap_or(false);

        let resolved = self
            .policy
            .check(path)
            .map_err(|e| ActionError::PermissionDenied {
                action: "write_file".into(),
                reason: e.to_string(),
            })?;

        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::failed(format!("failed to create directory: {e}")))?;
        }

        if append {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&resolved)
                .await
                .map_err(|e| Self::failed(format!("failed to open '{path}': {e}")))?;
            file.write_all(content.as_bytes())
                .await
                .map_err(|e| Self::failed(format!("failed to append to '{path}': {e}")))?;
            file.flush()
                .await
                .map_err(|e| Self::failed(format!("failed to append to '{path}': {e}")))?;
            return Ok(ActionOutput::ok(format!(
                "Appended {} bytes to {path}",
                content.len()
            )));
        }

        tokio::fs::write(&resolved, content)
            .await
            .map_err(|e| Self::failed(format!("failed to write '{path}': {e}")))?;

        Ok(ActionOutput::ok(format!(
            "Wrote {} bytes to {path}",
            content.len()
        )))
    }
}
