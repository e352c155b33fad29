//! `subagent-general`/`subagent-explore` (§4.2 table, GLOSSARY
//! "Sub-agent"). Grounded on a prior agent runtime's `tools/send_message.rs`
//! dispatch-to-another-target pattern, generalized from "send to a
//! connected channel" to "run a full nested orchestrator turn with a
//! derived role". Since the orchestrator itself depends on this crate for
//! its tool catalog, the actual run is injected through a `SubAgentRunner`
//! trait rather than a direct dependency on `snow-orchestrator` — the same
//! inversion `ask_user.rs` uses for `QuestionSink`.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::catalog::{Tool, ToolResult};

/// One sub-agent role the catalog can dispatch to. `general` gets the
/// full tool set; `explore` is read-only (no filesystem-edit, no
/// terminal-execute) per its narrower purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubAgentRole {
    General,
    Explore,
}

impl SubAgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubAgentRole::General => "general",
            SubAgentRole::Explore => "explore",
        }
    }
}

/// Implemented by `snow-orchestrator`: runs a nested orchestrator turn to
/// completion and returns its final textual answer. Internal messages of
/// the nested run are persisted with `sub_agent_internal = true` and
/// elided from outbound LLM requests by the caller — this trait only sees
/// the final answer.
#[async_trait]
pub trait SubAgentRunner: Send + Sync {
    async fn run(&self, role: SubAgentRole, task: &str) -> Result<String, String>;
}

pub struct SubAgentTool {
    role: SubAgentRole,
    runner: Box<dyn SubAgentRunner>,
}

impl SubAgentTool {
    pub fn new(role: SubAgentRole, runner: Box<dyn SubAgentRunner>) -> Self {
        Self { role, runner }
    }
}

#[async_trait]
impl Tool for SubAgentTool {
    fn name(&self) -> &str {
        match self.role {
            SubAgentRole::General => "subagent-general",
            SubAgentRole::Explore => "subagent-explore",
        }
    }

    fn description(&self) -> &str {
        match self.role {
            SubAgentRole::General => {
                "Delegate a self-contained task to a sub-agent with the full tool set. \
                 Use this to parallelize independent work or isolate a large task's \
                 context from the main conversation."
            }
            SubAgentRole::Explore => {
                "Delegate a read-only investigation to a sub-agent (filesystem read, \
                 search, listing — no edits, no terminal execution). Use this to explore \
                 a codebase or gather information without risking side effects."
            }
        }
    }

    fn always_auto_approved(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task": { "type": "string", "description": "The task description to hand to the sub-agent." }
            },
            "required": ["task"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let Some(task) = input.get("task").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: task");
        };

        match self.runner.run(self.role, task).await {
            Ok(answer) => ToolResult::success(answer),
            Err(e) => ToolResult::error(format!("sub-agent run failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoRunner;

    #[async_trait]
    impl SubAgentRunner for EchoRunner {
        async fn run(&self, role: SubAgentRole, task: &str) -> Result<String, String> {
            Ok(format!("[{}] handled: {}", role.as_str(), task))
        }
    }

    #[tokio::test]
    async fn dispatches_to_the_configured_role() {
        let tool = SubAgentTool::new(SubAgentRole::Explore, Box::new(EchoRunner));
        assert_eq!(tool.name(), "subagent-explore");
        let result = tool.execute(json!({ "task": "find the auth module" })).await;
        assert!(!result.is_error);
        assert_eq!(result.content, "[explore] handled: find the auth module");
    }

    #[tokio::test]
    async fn surfaces_runner_errors() {
        struct FailingRunner;
        #[async_trait]
        impl SubAgentRunner for FailingRunner {
            async fn run(&self, _role: SubAgentRole, _task: &str) -> Result<String, String> {
                Err("nested turn panicked".to_string())
            }
        }

        let tool = SubAgentTool::new(SubAgentRole::General, Box::new(FailingRunner));
        let result = tool.execute(json!({ "task": "x" })).await;
        assert!(result.is_error);
    }
}
