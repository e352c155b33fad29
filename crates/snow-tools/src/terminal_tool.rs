//! `terminal-execute` (§4.2, §4.7). Grounded on a prior agent runtime's
//! `tools/execute_command.rs`, rewired onto the real `snow_terminal`
//! executor instead of a bare `std::process::Command`. Sensitivity
//! detection reuses `snow_terminal::safety::is_sensitive` directly rather
//! than duplicating the denylist, per that module's own doc comment
//! calling for a single shared classifier.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use snow_terminal::{manager::TerminalManager, types::ExecOptions};

use crate::catalog::{Tool, ToolResult};

pub struct TerminalExecuteTool {
    manager: TerminalManager,
    default_cwd: String,
}

impl TerminalExecuteTool {
    pub fn new(manager: TerminalManager, default_cwd: impl Into<String>) -> Self {
        Self { manager, default_cwd: default_cwd.into() }
    }
}

#[async_trait]
impl Tool for TerminalExecuteTool {
    fn name(&self) -> &str {
        "terminal-execute"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its stdout, stderr, and exit code. \
         Use `timeout_secs` to extend beyond the default 30s (up to 300s)."
    }

    fn is_time_consuming(&self) -> bool {
        true
    }

    fn is_sensitive(&self, args: &Value) -> bool {
        args.get("command")
            .and_then(|v| v.as_str())
            .map(snow_terminal::safety::is_sensitive)
            .unwrap_or(false)
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "The shell command to execute." },
                "cwd": { "type": "string", "description": "Working directory (defaults to the session's working directory)." },
                "timeout_secs": { "type": "integer", "description": "Timeout in seconds, clamped to [1, 300]. Default 30." }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let Some(command) = input.get("command").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: command");
        };
        let cwd = input.get("cwd").and_then(|v| v.as_str()).unwrap_or(&self.default_cwd);
        let timeout_secs = input.get("timeout_secs").and_then(|v| v.as_u64()).unwrap_or(30);

        let options = ExecOptions { timeout_secs, ..Default::default() };
        let cancel = CancellationToken::new();

        match self.manager.exec(command, cwd, options, cancel).await {
            Ok(result) => {
                let body = format!(
                    "exit_code: {}\n--- stdout ---\n{}\n--- stderr ---\n{}",
                    result.exit_code, result.stdout, result.stderr
                );
                if result.exit_code == 0 {
                    ToolResult::success(body)
                } else {
                    ToolResult::error(body)
                }
            }
            Err(e) => ToolResult::error(format!("execution failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_succeeds() {
        let tool = TerminalExecuteTool::new(TerminalManager::new(), "/tmp");
        let result = tool.execute(json!({ "command": "echo hi" })).await;
        assert!(!result.is_error);
        assert!(result.content.contains("hi"));
    }

    #[test]
    fn sensitive_commands_are_flagged() {
        let tool = TerminalExecuteTool::new(TerminalManager::new(), "/tmp");
        assert!(tool.is_sensitive(&json!({ "command": "rm -rf /" })));
        assert!(!tool.is_sensitive(&json!({ "command": "ls -la" })));
    }
}
