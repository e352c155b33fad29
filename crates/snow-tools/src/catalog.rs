//! The `Tool` trait and catalog (§4.2). Carried over from a prior agent
//! runtime's `tools/mod.rs` unchanged in shape: same trait signature, same
//! `ToolResult::{success,error}` constructors, same static-catalog idea —
//! generalized from that runtime's tuple catalog to owned `Tool` instances
//! since this crate's tools carry runtime state (terminal manager, todo
//! store directory, ...) that its file-system-only tools didn't.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use snow_provider::ToolDefinition;

/// Result of executing a tool. Distinct from `snow_core::types::ToolResult`
/// (which additionally carries the `tool_call_id` the dispatcher attaches
/// once results are collected).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_error: false }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { content: message.into(), is_error: true }
    }
}

/// Flat tool names this runtime hands out verbatim to the model and to the
/// confirmation policy (`filesystem-edit`, `terminal-execute`, `subagent-*`,
/// `todo-*`, `useful-info-*`, `askuser-ask_question`).
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;
    /// True for tool names the confirmation policy always auto-approves
    /// (`todo-*`, `useful-info-*`, `subagent-*`, `askuser-ask_question`).
    fn always_auto_approved(&self) -> bool {
        false
    }
    /// Sensitive tool calls always require confirmation regardless of prior
    /// approvals or YOLO mode (§4.2). Only `terminal-execute` overrides this
    /// to inspect `args` against the denylist.
    fn is_sensitive(&self, _args: &Value) -> bool {
        false
    }
    /// Tools on the "time-consuming" allow-list emit a pre-execution
    /// "pending" UI marker (§4.2 two-step signalling).
    fn is_time_consuming(&self) -> bool {
        false
    }
    async fn execute(&self, input: Value) -> ToolResult;
}

/// Owns the full set of built-in tools and exposes catalog operations the
/// spec names: `/tools` listing, API tool definitions, and name-based
/// dispatch lookup.
pub struct ToolCatalog {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolCatalog {
    pub fn new(tools: Vec<Box<dyn Tool>>) -> Self {
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    /// `(name, description)` pairs for `/tools` listing — no instantiation
    /// needed, matching a prior agent runtime's `tool_catalog()` contract.
    pub fn catalog(&self) -> Vec<(&str, &str)> {
        self.tools.iter().map(|t| (t.name(), t.description())).collect()
    }

    pub fn to_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
                strict: false,
            })
            .collect()
    }
}
