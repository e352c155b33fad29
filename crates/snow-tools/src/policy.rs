//! Confirmation policy (§4.2): a pure function over `(tool_call, state)`
//! plus the persistent per-project `alwaysApprovedTools` set it consults.
//! New orchestration logic — no direct analogue in earlier runtimes — but the
//! atomic-write-to-temp-then-rename persistence idiom is the same one used
//! throughout `snow-sessions`.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::catalog::Tool;

/// Outcome of evaluating the confirmation policy for one tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationDecision {
    /// Run without prompting.
    AutoApproved,
    /// Must be shown to the user before running.
    NeedsConfirmation,
}

/// Persistent per-project set of tool names the user has told the
/// dispatcher to stop asking about (`approve_always`). Backed by one JSON
/// file, written atomically.
pub struct ApprovedToolsStore {
    path: PathBuf,
    approved: RwLock<HashSet<String>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ApprovedToolsFile {
    tools: Vec<String>,
}

impl ApprovedToolsStore {
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let approved = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str::<ApprovedToolsFile>(&raw)
                .map(|f| f.tools.into_iter().collect())
                .unwrap_or_default(),
            Err(_) => HashSet::new(),
        };
        Self { path, approved: RwLock::new(approved) }
    }

    pub async fn is_approved(&self, tool_name: &str) -> bool {
        self.approved.read().await.contains(tool_name)
    }

    /// Adds `names` to the in-memory set immediately (so the decision takes
    /// effect before the persistence write completes, per §4.2) and then
    /// persists.
    pub async fn approve_always(&self, names: &[String]) {
        {
            let mut set = self.approved.write().await;
            for name in names {
                set.insert(name.clone());
            }
        }
        let _ = self.persist().await;
    }

    async fn persist(&self) -> Result<(), std::io::Error> {
        let tools: Vec<String> = self.approved.read().await.iter().cloned().collect();
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_string_pretty(&ApprovedToolsFile { tools })?;
        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, body).await?;
        tokio::fs::rename(&tmp_path, &self.path).await
    }
}

/// Evaluates the confirmation policy for one tool call (§4.2).
///
/// Order matters: sensitivity overrides everything else, including YOLO
/// mode and prior `approve_always` decisions.
pub struct ConfirmationPolicy;

impl ConfirmationPolicy {
    pub async fn evaluate(
        tool: &dyn Tool,
        args: &Value,
        yolo_mode: bool,
        approved: &ApprovedToolsStore,
    ) -> ConfirmationDecision {
        if tool.is_sensitive(args) {
            return ConfirmationDecision::NeedsConfirmation;
        }
        if tool.always_auto_approved() {
            return ConfirmationDecision::AutoApproved;
        }
        if yolo_mode {
            return ConfirmationDecision::AutoApproved;
        }
        if approved.is_approved(tool.name()).await {
            return ConfirmationDecision::AutoApproved;
        }
        ConfirmationDecision::NeedsConfirmation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::tempdir;

    struct FakeTool {
        name: &'static str,
        sensitive: bool,
        auto_approved: bool,
    }

    #[async_trait]
    impl Tool for FakeTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "fake"
        }
        fn input_schema(&self) -> Value {
            json!({})
        }
        fn always_auto_approved(&self) -> bool {
            self.auto_approved
        }
        fn is_sensitive(&self, _args: &Value) -> bool {
            self.sensitive
        }
        async fn execute(&self, _input: Value) -> crate::catalog::ToolResult {
            crate::catalog::ToolResult::success("")
        }
    }

    #[tokio::test]
    async fn sensitive_tool_always_needs_confirmation() {
        let dir = tempdir().unwrap();
        let store = ApprovedToolsStore::load(dir.path().join("approved.json")).await;
        store.approve_always(&["terminal-execute".to_string()]).await;

        let tool = FakeTool { name: "terminal-execute", sensitive: true, auto_approved: false };
        let decision = ConfirmationPolicy::evaluate(&tool, &json!({}), true, &store).await;
        assert_eq!(decision, ConfirmationDecision::NeedsConfirmation);
    }

    #[tokio::test]
    async fn always_auto_approved_tool_skips_confirmation() {
        let dir = tempdir().unwrap();
        let store = ApprovedToolsStore::load(dir.path().join("approved.json")).await;
        let tool = FakeTool { name: "todo-write", sensitive: false, auto_approved: true };
        let decision = ConfirmationPolicy::evaluate(&tool, &json!({}), false, &store).await;
        assert_eq!(decision, ConfirmationDecision::AutoApproved);
    }

    #[tokio::test]
    async fn unapproved_nonsensitive_tool_needs_confirmation_until_approved() {
        let dir = tempdir().unwrap();
        let store = ApprovedToolsStore::load(dir.path().join("approved.json")).await;
        let tool = FakeTool { name: "filesystem-edit", sensitive: false, auto_approved: false };

        let first = ConfirmationPolicy::evaluate(&tool, &json!({}), false, &store).await;
        assert_eq!(first, ConfirmationDecision::NeedsConfirmation);

        store.approve_always(&["filesystem-edit".to_string()]).await;
        let second = ConfirmationPolicy::evaluate(&tool, &json!({}), false, &store).await;
        assert_eq!(second, ConfirmationDecision::AutoApproved);
    }

    #[tokio::test]
    async fn persists_across_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("approved.json");
        {
            let store = ApprovedToolsStore::load(&path).await;
            store.approve_always(&["code-search".to_string()]).await;
        }
        let reloaded = ApprovedToolsStore::load(&path).await;
        assert!(reloaded.is_approved("code-search").await);
    }
}
