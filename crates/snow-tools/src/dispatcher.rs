//! Tool-call batch dispatch (§4.2 body): confirmation gating, batch
//! confirmation, rejection semantics, parallel cancellable execution with
//! ordered result collection, two-step UI markers. New orchestration logic
//! grounded on the *shape* of a prior agent runtime's `tool_loop::run_tool_loop`
//! (iterate `response.tool_calls`, execute, inject results) but
//! restructured around per-call sensitivity classification and a single
//! batch confirmation instead of an unconditional auto-run, with parallel
//! (not sequential) execution sharing one `CancellationToken` — the same
//! cancellation idiom `pipeline::process` uses around
//! `tools::execute_command`.

use std::sync::Arc;

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;

use snow_core::types::ToolCall;

use crate::catalog::ToolCatalog;
use crate::policy::{ApprovedToolsStore, ConfirmationDecision, ConfirmationPolicy};

/// Names of built-in tools the UI shows a "pending" marker for before they
/// complete (§4.2 two-step signalling).
const TIME_CONSUMING_PREFIXES: &[&str] = &["terminal-execute", "filesystem-edit", "subagent-", "code-search"];

pub fn is_time_consuming_name(name: &str) -> bool {
    TIME_CONSUMING_PREFIXES
        .iter()
        .any(|p| if p.ends_with('-') { name.starts_with(p) } else { name == *p })
}

/// The UI's single answer to a whole batch of pending tool calls (§4.2).
#[derive(Debug, Clone)]
pub enum BatchConfirmation {
    Approve,
    /// Adds every tool name in the batch that required confirmation to the
    /// persistent approved set.
    ApproveAlways,
    Reject,
    RejectWithReply(String),
}

/// Callback the orchestrator supplies to surface a pending batch to the UI
/// and block on the user's single decision.
#[async_trait::async_trait]
pub trait ConfirmationSink: Send + Sync {
    async fn confirm_batch(&self, pending: &[ToolCall]) -> BatchConfirmation;
}

/// Callback invoked once per tool call right before it starts running, so
/// the UI can render the "pending" marker (§4.2 two-step signalling).
#[async_trait::async_trait]
pub trait PendingSink: Send + Sync {
    async fn mark_pending(&self, tool_call_id: &str, tool_name: &str);
}

pub struct DispatchContext<'a> {
    pub catalog: &'a ToolCatalog,
    pub approved: &'a ApprovedToolsStore,
    pub yolo_mode: bool,
    pub confirmation_sink: &'a dyn ConfirmationSink,
    pub pending_sink: &'a dyn PendingSink,
    pub cancel: CancellationToken,
}

/// One tool call's final outcome.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub tool_call_id: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolOutcome {
    fn rejected(tool_call_id: impl Into<String>, reason: Option<&str>) -> Self {
        let content = match reason {
            Some(r) => format!("Tool execution rejected by user: {r}"),
            None => "Tool execution rejected by user".to_string(),
        };
        Self { tool_call_id: tool_call_id.into(), content, is_error: true }
    }

    fn aborted(tool_call_id: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: "Error: Tool execution aborted by user".to_string(),
            is_error: true,
        }
    }
}

impl From<ToolOutcome> for snow_core::types::ToolResult {
    fn from(outcome: ToolOutcome) -> Self {
        snow_core::types::ToolResult {
            tool_call_id: outcome.tool_call_id,
            content: outcome.content,
            is_error: outcome.is_error,
        }
    }
}

/// Result of dispatching one batch. `ended_turn` is set when the user
/// issued a plain `reject` (§4.2: "ends the user turn after flushing
/// rejection messages and a terminal assistant note").
pub struct BatchOutcome {
    pub results: Vec<ToolOutcome>,
    pub ended_turn: bool,
    /// Present only when `ended_turn` is true — the assistant note to
    /// append after the rejection messages.
    pub termination_note: Option<String>,
}

/// Dispatch one assistant turn's tool_calls batch end to end (§4.2).
pub async fn dispatch_batch(calls: &[ToolCall], ctx: &DispatchContext<'_>) -> BatchOutcome {
    if calls.is_empty() {
        return BatchOutcome { results: Vec::new(), ended_turn: false, termination_note: None };
    }

    let mut needs_confirmation = Vec::new();
    for call in calls {
        let Some(tool) = ctx.catalog.get(&call.name) else {
            continue;
        };
        let decision =
            ConfirmationPolicy::evaluate(tool, &call.arguments_json, ctx.yolo_mode, ctx.approved).await;
        if decision == ConfirmationDecision::NeedsConfirmation {
            needs_confirmation.push(call.clone());
        }
    }

    if !needs_confirmation.is_empty() {
        match ctx.confirmation_sink.confirm_batch(calls).await {
            BatchConfirmation::Approve => {}
            BatchConfirmation::ApproveAlways => {
                let names: Vec<String> = needs_confirmation.iter().map(|c| c.name.clone()).collect();
                ctx.approved.approve_always(&names).await;
            }
            BatchConfirmation::Reject => {
                let results = calls.iter().map(|c| ToolOutcome::rejected(c.id.clone(), None)).collect();
                return BatchOutcome {
                    results,
                    ended_turn: true,
                    termination_note: Some("Tool call rejected, session ended".to_string()),
                };
            }
            BatchConfirmation::RejectWithReply(reason) => {
                let results =
                    calls.iter().map(|c| ToolOutcome::rejected(c.id.clone(), Some(&reason))).collect();
                return BatchOutcome { results, ended_turn: false, termination_note: None };
            }
        }
    }

    let results = execute_concurrently(calls, ctx).await;
    BatchOutcome { results, ended_turn: false, termination_note: None }
}

async fn execute_concurrently(calls: &[ToolCall], ctx: &DispatchContext<'_>) -> Vec<ToolOutcome> {
    let futures = calls.iter().map(|call| run_one(call, ctx));
    join_all(futures).await
}

async fn run_one(call: &ToolCall, ctx: &DispatchContext<'_>) -> ToolOutcome {
    let Some(tool) = ctx.catalog.get(&call.name) else {
        return ToolOutcome {
            tool_call_id: call.id.clone(),
            content: format!("Error: unknown tool '{}'", call.name),
            is_error: true,
        };
    };

    if ctx.cancel.is_cancelled() {
        return ToolOutcome::aborted(call.id.clone());
    }

    if tool.is_time_consuming() {
        ctx.pending_sink.mark_pending(&call.id, &call.name).await;
    }

    tokio::select! {
        _ = ctx.cancel.cancelled() => ToolOutcome::aborted(call.id.clone()),
        result = tool.execute(call.arguments_json.clone()) => ToolOutcome {
            tool_call_id: call.id.clone(),
            content: result.content,
            is_error: result.is_error,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Tool, ToolCatalog, ToolResult};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    struct NoopTool {
        name: &'static str,
        sensitive: bool,
    }

    #[async_trait]
    impl Tool for NoopTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "noop"
        }
        fn input_schema(&self) -> Value {
            json!({})
        }
        fn is_sensitive(&self, _args: &Value) -> bool {
            self.sensitive
        }
        async fn execute(&self, _input: Value) -> ToolResult {
            ToolResult::success("ok")
        }
    }

    struct AutoApprove;
    #[async_trait]
    impl ConfirmationSink for AutoApprove {
        async fn confirm_batch(&self, _pending: &[ToolCall]) -> BatchConfirmation {
            BatchConfirmation::Approve
        }
    }

    struct AlwaysReject;
    #[async_trait]
    impl ConfirmationSink for AlwaysReject {
        async fn confirm_batch(&self, _pending: &[ToolCall]) -> BatchConfirmation {
            BatchConfirmation::Reject
        }
    }

    struct NoopPending;
    #[async_trait]
    impl PendingSink for NoopPending {
        async fn mark_pending(&self, _tool_call_id: &str, _tool_name: &str) {}
    }

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall { id: id.to_string(), name: name.to_string(), arguments_json: json!({}) }
    }

    #[tokio::test]
    async fn sensitive_call_runs_once_approved() {
        let dir = tempdir().unwrap();
        let approved = ApprovedToolsStore::load(dir.path().join("a.json")).await;
        let catalog = ToolCatalog::new(vec![Box::new(NoopTool { name: "terminal-execute", sensitive: true })]);
        let confirmation = AutoApprove;
        let pending = NoopPending;
        let ctx = DispatchContext {
            catalog: &catalog,
            approved: &approved,
            yolo_mode: false,
            confirmation_sink: &confirmation,
            pending_sink: &pending,
            cancel: CancellationToken::new(),
        };

        let outcome = dispatch_batch(&[call("1", "terminal-execute")], &ctx).await;
        assert!(!outcome.ended_turn);
        assert_eq!(outcome.results.len(), 1);
        assert!(!outcome.results[0].is_error);
    }

    #[tokio::test]
    async fn reject_synthesizes_rejection_messages_and_ends_turn() {
        let dir = tempdir().unwrap();
        let approved = ApprovedToolsStore::load(dir.path().join("a.json")).await;
        let catalog = ToolCatalog::new(vec![Box::new(NoopTool { name: "terminal-execute", sensitive: true })]);
        let confirmation = AlwaysReject;
        let pending = NoopPending;
        let ctx = DispatchContext {
            catalog: &catalog,
            approved: &approved,
            yolo_mode: false,
            confirmation_sink: &confirmation,
            pending_sink: &pending,
            cancel: CancellationToken::new(),
        };

        let outcome = dispatch_batch(&[call("1", "terminal-execute")], &ctx).await;
        assert!(outcome.ended_turn);
        assert!(outcome.results[0].content.contains("rejected by user"));
        assert_eq!(outcome.termination_note.as_deref(), Some("Tool call rejected, session ended"));
    }

    #[tokio::test]
    async fn cancelled_token_aborts_unstarted_calls() {
        let dir = tempdir().unwrap();
        let approved = ApprovedToolsStore::load(dir.path().join("a.json")).await;
        let catalog = ToolCatalog::new(vec![Box::new(NoopTool { name: "code-search", sensitive: false })]);
        let confirmation = AutoApprove;
        let pending = NoopPending;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = DispatchContext {
            catalog: &catalog,
            approved: &approved,
            yolo_mode: true,
            confirmation_sink: &confirmation,
            pending_sink: &pending,
            cancel,
        };

        let outcome = dispatch_batch(&[call("1", "code-search")], &ctx).await;
        assert!(outcome.results[0].content.contains("aborted by user"));
    }

    #[test]
    fn time_consuming_prefixes_match_spec_allowlist() {
        assert!(is_time_consuming_name("terminal-execute"));
        assert!(is_time_consuming_name("subagent-general"));
        assert!(is_time_consuming_name("code-search"));
        assert!(!is_time_consuming_name("todo-read"));
    }
}
