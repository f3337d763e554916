//! Shell action: execute system commands.
//!
//! Supports command allowlisting and a hard timeout. The child process is
//! killed when the timeout fires or the surrounding run is cancelled.

use async_trait::async_trait;
use loopwright_core::action::{Action, ActionOutput};
use loopwright_core::error::ActionError;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Substitutions and redirections run or write things the allowlist never sees.
const UNCHECKABLE: [&str; 4] = ["$(", "`", ">", "<"];

/// Output beyond this many characters is cut.
const MAX_OUTPUT_CHARS: usize = 16 * 1024;

/// Execute shell commands with safety constraints.
pub struct ShellAction {
    /// If non-empty, only these commands are allowed.
    allowed_commands: Vec<String>,
    timeout: Duration,
}

impl ShellAction {
    pub fn new(allowed_commands: Vec<String>) -> Self {
        Self {
            allowed_commands,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Every command in a `;`, `&&`, `||` or `|` chain must be allowlisted.
    /// With an allowlist, command substitution and redirection are refused.
    fn is_command_allowed(&self, command: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true;
        }

        if UNCHECKABLE.iter().any(|token| command.contains(token)) {
            return false;
        }

        command
            .split(['|', ';', '&', '\n'])
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .all(|segment| {
                let base_cmd = segment.split_whitespace().next().unwrap_or("");
                self.allowed_commands.iter().any(|a| a == base_cmd)
            })
    }
}

#[async_trait]
impl Action for ShellAction {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return stdout/stderr. Use this for running programs, inspecting the system, git operations, etc."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ActionOutput, ActionError> {
        let command = arguments["command"]
            .as_str()
            .ok_or_else(|| ActionError::InvalidArguments("Missing 'command' argument".into()))?;

        if !self.is_command_allowed(command) {
            return Err(ActionError::PermissionDenied {
                action: "shell".into(),
                reason: format!("Command '{command}' is not in the allowlist"),
            });
        }

        debug!(command = %command, timeout_secs = self.timeout.as_secs(), "Executing shell command");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ActionError::ExecutionFailed {
                    action: "shell".into(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!(command = %command, "Command timed out");
                return Err(ActionError::Timeout {
                    action: "shell".into(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            let text = if stderr.trim().is_empty() {
                stdout.into_owned()
            } else {
                format!("{stdout}\n[stderr]: {stderr}")
            };
            Ok(ActionOutput::ok(truncate(text.trim())))
        } else {
            let code = output.status.code().unwrap_or(-1);
            warn!(command = %command, exit_code = code, "Command failed");
            Ok(ActionOutput::failed(truncate(&format!(
                "Error: command exited with code {code}\n{}\n{}",
                stdout.trim(),
                stderr.trim()
            ))))
        }
    }
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_OUTPUT_CHARS) {
        Some((idx, _)) => format!("{}\n[output truncated]", &text[..idx]),
        None => text.to_string(),
    }
}
