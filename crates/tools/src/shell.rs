//! Shell tool — execute system commands.
//!
//! Supports base-command allowlisting and cooperative cancellation: a
//! cancelled call kills the child process instead of waiting it out.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use ferrite_core::error::ToolError;
use ferrite_core::schema::ParamSpec;
use ferrite_core::tool::{Tool, ToolContext};

/// Execute shell commands with safety constraints.
pub struct ShellTool {
    /// If non-empty, only these base commands are allowed.
    allowed_commands: Vec<String>,
}

impl ShellTool {
    pub fn new(allowed_commands: Vec<String>) -> Self {
        Self { allowed_commands }
    }

    fn is_command_allowed(&self, command: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true; // No allowlist = all commands allowed
        }
        let base = command.split_whitespace().next().unwrap_or("").trim();
        self.allowed_commands.iter().any(|a| a == base)
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return stdout/stderr. Use this for running programs, checking files, git operations, etc."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::string("command")
                .describe("The shell command to execute")
                .required()
                .min(1.0),
        ]
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        arguments: serde_json::Value,
    ) -> Result<String, ToolError> {
        let command = arguments["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;

        if !self.is_command_allowed(command) {
            return Err(ToolError::NotAllowed {
                tool_name: "shell".into(),
                reason: format!(
                    "Command '{}' not in allowlist",
                    command.split_whitespace().next().unwrap_or("")
                ),
            });
        }

        debug!(command = %command, "Executing shell command");

        let mut shell = Command::new("sh");
        shell.args(["-c", command]);
        // The child dies with the dropped future, so cancellation cannot
        // leak a running process.
        shell.kill_on_drop(true);

        let output = tokio::select! {
            _ = ctx.cancel.cancelled() => {
                return Err(ToolError::Cancelled {
                    tool_name: "shell".into(),
                });
            }
            result = shell.output() => result.map_err(|e| ToolError::ExecutionFailed {
                tool_name: "shell".into(),
                reason: e.to_string(),
            })?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.success() {
            if stderr.is_empty() {
                Ok(stdout.trim_end().to_string())
            } else {
                Ok(format!("{stdout}\n[stderr]: {stderr}").trim_end().to_string())
            }
        } else {
            let code = output.status.code().unwrap_or(-1);
            warn!(command = %command, exit_code = code, "Command failed");
            Ok(format!("[exit code: {code}]\n{stdout}\n{stderr}")
                .trim_end()
                .to_string())
        }
    }
}
