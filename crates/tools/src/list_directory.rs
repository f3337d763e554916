//! Lists a directory: names sorted, directories suffixed with `/`.

use async_trait::async_trait;
use loopwright_core::action::{Action, ActionOutput};
use loopwright_core::error::ActionError;

use crate::path::PathPolicy;

/// Listings longer than this are cut.
const MAX_ENTRIES: usize = 500;

pub struct ListDirectoryAction {
    policy: PathPolicy,
}

impl ListDirectoryAction {
    pub fn new() -> Self {
        Self {
            policy: PathPolicy::unrestricted(),
        }
    }

    pub fn with_policy(mut self, policy: PathPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Default for ListDirectoryAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Action for ListDirectoryAction {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the entries of a directory. Directories are shown with a trailing '/'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list (default: current directory)"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ActionOutput, ActionError> {
        let path = arguments["path"].as_str().unwrap_or(".");

        let resolved = self
            .policy
            .check(path)
            .map_err(|e| ActionError::PermissionDenied {
                action: "list_directory".into(),
                reason: e.to_string(),
            })?;

        let failed = |e: std::io::Error| ActionError::ExecutionFailed {
            action: "list_directory".into(),
            reason: format!("failed to list '{path}': {e}"),
        };

        let mut reader = tokio::fs::read_dir(&resolved).await.map_err(failed)?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(failed)? {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();

        if entries.is_empty() {
            return Ok(ActionOutput::ok(format!("{path} is empty")));
        }

        let total = entries.len();
        let mut output = entries
            .into_iter()
            .take(MAX_ENTRIES)
            .collect::<Vec<_>>()
            .join("\n");
        if total > MAX_ENTRIES {
            output.push_str(&format!("\n[{} more entries not shown]", total - MAX_ENTRIES));
        }

        Ok(ActionOutput::ok(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_sorted_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(dir.path().join("logs")).unwrap();

        let result = ListDirectoryAction::new()
            .execute(serde_json::json!({"path": dir.path().to_str().unwrap()}))
            .await
            .unwrap();

        assert_eq!(result.output, "a.txt\nb.txt\nlogs/");
    }

    #[tokio::test]
    async fn empty_directory_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap();
        let result = ListDirectoryAction::new()
            .execute(serde_json::json!({ "path": path }))
            .await
            .unwrap();
        assert_eq!(result.output, format!("{path} is empty"));
    }

    #[tokio::test]
    async fn missing_directory_is_execution_failure() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = ListDirectoryAction::new()
            .execute(serde_json::json!({"path": missing.to_str().unwrap()}))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::ExecutionFailed { .. }));
    }
}
