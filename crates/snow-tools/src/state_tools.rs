//! `todo-read`/`todo-write` and `useful-info-read`/`useful-info-write`
//! (§4.2 table). New tools, shaped like a prior agent runtime's `tools/reminder.rs`:
//! a small typed-state tool dispatching on an `action` field, persisting to a
//! handle owned by the tool rather than a bare in-memory vec — here a
//! per-session JSON list file instead of reminder.rs's SQLite-backed
//! scheduler, since todos/notes are plain per-session state with no firing
//! semantics.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TodoItem {
    text: String,
    done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct StateList<T> {
    items: Vec<T>,
}

use crate::catalog::{Tool, ToolResult};

/// Reads and writes one JSON-backed list file, guarded by an in-process
/// mutex so concurrent tool calls within a session don't race each other's
/// read-modify-write.
struct JsonListStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonListStore {
    fn new(path: PathBuf) -> Self {
        Self { path, lock: Mutex::new(()) }
    }

    async fn read<T: for<'de> Deserialize<'de> + Default>(&self) -> StateList<T> {
        let _guard = self.lock.lock().await;
        self.read_locked().await
    }

    async fn read_locked<T: for<'de> Deserialize<'de> + Default>(&self) -> StateList<T> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => StateList::default(),
        }
    }

    async fn write<T: Serialize>(&self, list: &StateList<T>) -> Result<(), String> {
        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| e.to_string())?;
        }
        let body = serde_json::to_string_pretty(list).map_err(|e| e.to_string())?;
        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, body).await.map_err(|e| e.to_string())?;
        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|e| e.to_string())
    }
}

pub struct TodoReadTool {
    store: Arc<JsonListStore>,
}

pub struct TodoWriteTool {
    store: Arc<JsonListStore>,
}

/// Construct the matching read/write pair backed by the same file —
/// `todo.json` in the given session directory.
pub fn todo_tools(session_dir: impl Into<PathBuf>) -> (TodoReadTool, TodoWriteTool) {
    let store = Arc::new(JsonListStore::new(session_dir.into().join("todo.json")));
    (TodoReadTool { store: store.clone() }, TodoWriteTool { store })
}

#[async_trait]
impl Tool for TodoReadTool {
    fn name(&self) -> &str {
        "todo-read"
    }

    fn description(&self) -> &str {
        "Read the current todo list for this session."
    }

    fn always_auto_approved(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _input: Value) -> ToolResult {
        let list: StateList<TodoItem> = self.store.read().await;
        if list.items.is_empty() {
            return ToolResult::success("Todo list is empty.");
        }
        let body = list
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}. [{}] {}", i + 1, if item.done { "x" } else { " " }, item.text))
            .collect::<Vec<_>>()
            .join("\n");
        ToolResult::success(body)
    }
}

#[async_trait]
impl Tool for TodoWriteTool {
    fn name(&self) -> &str {
        "todo-write"
    }

    fn description(&self) -> &str {
        "Replace the todo list for this session. Pass the full list of items \
         each time — this overwrites, it does not append."
    }

    fn always_auto_approved(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "text": { "type": "string" },
                            "done": { "type": "boolean" }
                        },
                        "required": ["text"]
                    }
                }
            },
            "required": ["items"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let Some(raw_items) = input.get("items").and_then(|v| v.as_array()) else {
            return ToolResult::error("missing required parameter: items");
        };

        let items: Vec<TodoItem> = raw_items
            .iter()
            .filter_map(|v| {
                let text = v.get("text")?.as_str()?.to_string();
                let done = v.get("done").and_then(|d| d.as_bool()).unwrap_or(false);
                Some(TodoItem { text, done })
            })
            .collect();

        let count = items.len();
        if let Err(e) = self.store.write(&StateList { items }).await {
            return ToolResult::error(format!("failed to save todo list: {e}"));
        }
        ToolResult::success(format!("Todo list updated: {count} item(s)."))
    }
}

pub struct UsefulInfoReadTool {
    store: Arc<JsonListStore>,
}

pub struct UsefulInfoWriteTool {
    store: Arc<JsonListStore>,
}

/// Construct the matching read/write pair backed by `useful_info.json` in
/// the given session directory.
pub fn useful_info_tools(session_dir: impl Into<PathBuf>) -> (UsefulInfoReadTool, UsefulInfoWriteTool) {
    let store = Arc::new(JsonListStore::new(session_dir.into().join("useful_info.json")));
    (UsefulInfoReadTool { store: store.clone() }, UsefulInfoWriteTool { store })
}

#[async_trait]
impl Tool for UsefulInfoReadTool {
    fn name(&self) -> &str {
        "useful-info-read"
    }

    fn description(&self) -> &str {
        "Read notes previously saved with useful-info-write for this session."
    }

    fn always_auto_approved(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _input: Value) -> ToolResult {
        let list: StateList<String> = self.store.read().await;
        if list.items.is_empty() {
            return ToolResult::success("No notes saved.");
        }
        ToolResult::success(list.items.join("\n---\n"))
    }
}

#[async_trait]
impl Tool for UsefulInfoWriteTool {
    fn name(&self) -> &str {
        "useful-info-write"
    }

    fn description(&self) -> &str {
        "Append a note worth remembering beyond this session's context window \
         (a decision, a constraint, a fact worth not re-deriving)."
    }

    fn always_auto_approved(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "note": { "type": "string" } },
            "required": ["note"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let Some(note) = input.get("note").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: note");
        };

        let mut list: StateList<String> = self.store.read_locked().await;
        list.items.push(note.to_string());
        let count = list.items.len();
        if let Err(e) = self.store.write(&list).await {
            return ToolResult::error(format!("failed to save note: {e}"));
        }
        ToolResult::success(format!("Note saved ({count} total)."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn todo_write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let (reader, writer) = todo_tools(dir.path());

        writer
            .execute(json!({ "items": [{ "text": "write tests", "done": false }] }))
            .await;
        let result = reader.execute(json!({})).await;
        assert!(result.content.contains("write tests"));
    }

    #[tokio::test]
    async fn useful_info_accumulates_notes() {
        let dir = tempdir().unwrap();
        let (reader, writer) = useful_info_tools(dir.path());

        writer.execute(json!({ "note": "first" })).await;
        writer.execute(json!({ "note": "second" })).await;
        let result = reader.execute(json!({})).await;
        assert!(result.content.contains("first"));
        assert!(result.content.contains("second"));
    }
}
