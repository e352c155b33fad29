//! Pinned-message construction (§4.4 step 3, GLOSSARY "Pinned
//! message"). TODO and useful-info pinned messages are rendered by calling
//! straight through the already-registered `todo-read`/`useful-info-read`
//! tools — they're pure reads with no side effects, so there is no reason
//! to duplicate their formatting logic here. The folder-notebook pinned
//! message is built separately by `folder_notebook::FolderNotebookPreprocessor`
//! since it needs per-session redisplay state the read-only tools don't
//! carry.
//!
//! Pinned messages are prepended to the outbound request only — they are
//! never appended to the durable session log (GLOSSARY).

use serde_json::json;
use snow_core::types::Message;
use snow_tools::ToolCatalog;

const TODO_READ: &str = "todo-read";
const USEFUL_INFO_READ: &str = "useful-info-read";

/// Builds the TODO and useful-info pinned messages, skipping either one
/// whose underlying tool isn't registered in this catalog (a sub-agent
/// role, e.g., may not carry the full tool set).
pub async fn build_pinned_messages(catalog: &ToolCatalog) -> Vec<Message> {
    let mut pinned = Vec::new();

    if let Some(tool) = catalog.get(TODO_READ) {
        let result = tool.execute(json!({})).await;
        if !result.is_error {
            pinned.push(Message::user(format!("Current TODO list:\n\n{}", result.content)));
        }
    }

    if let Some(tool) = catalog.get(USEFUL_INFO_READ) {
        let result = tool.execute(json!({})).await;
        if !result.is_error {
            pinned.push(Message::user(format!("Saved notes from this session:\n\n{}", result.content)));
        }
    }

    pinned
}

#[cfg(test)]
mod tests {
    use super::*;
    use snow_tools::state_tools::{todo_tools, useful_info_tools};

    #[tokio::test]
    async fn renders_both_pinned_messages_when_tools_present() {
        let dir = tempfile::tempdir().unwrap();
        let (todo_read, todo_write) = todo_tools(dir.path());
        let (info_read, info_write) = useful_info_tools(dir.path());

        todo_write.execute(json!({ "items": [{ "text": "ship it", "done": false }] })).await;
        info_write.execute(json!({ "note": "uses postgres" })).await;

        let catalog = ToolCatalog::new(vec![
            Box::new(todo_read),
            Box::new(todo_write),
            Box::new(info_read),
            Box::new(info_write),
        ]);

        let pinned = build_pinned_messages(&catalog).await;
        assert_eq!(pinned.len(), 2);
        assert!(pinned[0].content.contains("ship it"));
        assert!(pinned[1].content.contains("uses postgres"));
    }

    #[tokio::test]
    async fn skips_missing_tools_gracefully() {
        let catalog = ToolCatalog::new(vec![]);
        let pinned = build_pinned_messages(&catalog).await;
        assert!(pinned.is_empty());
    }
}
