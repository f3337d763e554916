//! Read-file action: read file contents with path validation.

use async_trait::async_trait;
use loopwright_core::action::{Action, ActionOutput};
use loopwright_core::error::ActionError;

use crate::path::PathPolicy;

pub struct ReadFileAction {
    policy: PathPolicy,
    /// Larger files are truncated to this many bytes.
    max_bytes: usize,
}

impl ReadFileAction {
    /// Create a read action with no path restrictions.
    pub fn new() -> Self {
        Self {
            policy: PathPolicy::unrestricted(),
            max_bytes: 64 * 1024,
        }
    }

    pub fn with_policy(mut self, policy: PathPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

impl Default for ReadFileAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Action for ReadFileAction {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file at the given path."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ActionOutput, ActionError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ActionError::InvalidArguments("Missing 'path' argument".into()))?;

        let resolved = self
            .policy
            .check(path)
            .map_err(|e| ActionError::PermissionDenied {
                action: "read_file".into(),
                reason: e.to_string(),
            })?;

        let bytes = tokio::fs::read(&resolved)
            .await
            .map_err(|e| ActionError::ExecutionFailed {
                action: "read_file".into(),
                reason: format!("failed to read '{path}': {e}"),
            })?;

        if bytes.len() <= self.max_bytes {
            return Ok(ActionOutput::ok(String::from_utf8_lossy(&bytes)));
        }

        let shown = String::from_utf8_lossy(&bytes[..self.max_bytes]);
        Ok(ActionOutput::ok(format!(
            "{shown}\n[truncated: showing first {} of {} bytes]",
            self.max_bytes,
            bytes.len()
        )))
    }
}
