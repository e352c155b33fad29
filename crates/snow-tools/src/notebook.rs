//! `folder-notebook-write`/`folder-notebook-read` and the `NotebookStore`
//! backing the Folder Notebook Preprocessor (§4.9).
//!
//! §4.9 specifies the per-session `ReadFolders` redisplay-tracking state
//! precisely, but never says where a folder's "notebook entries" come from
//! in the first place — that half is left for the implementation to invent.
//! This module supplies it: a per-folder JSON-list file (one file per
//! folder, keyed by a path slug), shaped exactly like `state_tools.rs`'s
//! `JsonListStore` but exposed as a standalone `NotebookStore` so
//! `snow-orchestrator`'s preprocessor can query a folder's newest entries
//! directly, without round-tripping through tool dispatch. The tool pair
//! here is how the model itself adds and reviews notes; the orchestrator
//! consults the same store every turn to decide what needs redisplaying.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::catalog::{Tool, ToolResult};

/// One note attached to a folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookEntry {
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct NotebookFile {
    entries: Vec<NotebookEntry>,
}

/// Per-folder notebook storage, one JSON file per folder under `root`
/// (`StorageConfig::notebooks_dir()`). Folder paths are slugified the same
/// way `StorageConfig::permissions_path` slugifies workspace paths.
pub struct NotebookStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl NotebookStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), lock: Mutex::new(()) }
    }

    pub async fn append(&self, folder: &str, title: &str, content: &str) -> Result<NotebookEntry, String> {
        let _guard = self.lock.lock().await;
        let path = self.path_for(folder);
        let mut file = read_file(&path).await;

        let entry = NotebookEntry {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            content: content.to_string(),
            created_at: chrono::Utc::now(),
        };
        file.entries.push(entry.clone());
        write_file(&path, &file).await?;
        Ok(entry)
    }

    /// The newest `n` entries for `folder`, newest first. Empty if the
    /// folder has no notebook file yet.
    pub async fn newest(&self, folder: &str, n: usize) -> Vec<NotebookEntry> {
        let _guard = self.lock.lock().await;
        let mut file = read_file(&self.path_for(folder)).await;
        file.entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        file.entries.truncate(n);
        file.entries
    }

    fn path_for(&self, folder: &str) -> PathBuf {
        self.root.join(format!("{}.json", slugify(folder)))
    }
}

/// Same replace-unsafe-characters idiom `StorageConfig::permissions_path`
/// uses for workspace paths.
pub fn slugify(path: &str) -> String {
    path.replace(['/', '\\', ':'], "_")
}

async fn read_file(path: &Path) -> NotebookFile {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
        Err(_) => NotebookFile::default(),
    }
}

async fn write_file(path: &Path, file: &NotebookFile) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| e.to_string())?;
    }
    let body = serde_json::to_string_pretty(file).map_err(|e| e.to_string())?;
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, body).await.map_err(|e| e.to_string())?;
    tokio::fs::rename(&tmp_path, path).await.map_err(|e| e.to_string())
}

pub struct FolderNotebookReadTool {
    store: Arc<NotebookStore>,
}

pub struct FolderNotebookWriteTool {
    store: Arc<NotebookStore>,
}

/// Construct the matching read/write tool pair plus the shared store handle
/// the orchestrator's preprocessor queries directly.
pub fn folder_notebook_tools(notebooks_dir: impl Into<PathBuf>) -> (FolderNotebookReadTool, FolderNotebookWriteTool, Arc<NotebookStore>) {
    let store = Arc::new(NotebookStore::new(notebooks_dir.into()));
    (
        FolderNotebookReadTool { store: store.clone() },
        FolderNotebookWriteTool { store: store.clone() },
        store,
    )
}

#[async_trait]
impl Tool for FolderNotebookReadTool {
    fn name(&self) -> &str {
        "folder-notebook-read"
    }

    fn description(&self) -> &str {
        "Read the saved notes for a folder (newest first). Use this before \
         re-deriving something about a directory that may already have a note."
    }

    fn always_auto_approved(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "folder": { "type": "string" } },
            "required": ["folder"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let Some(folder) = input.get("folder").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: folder");
        };

        let entries = self.store.newest(folder, 5).await;
        if entries.is_empty() {
            return ToolResult::success(format!("No notes for '{folder}'."));
        }
        let body = entries
            .iter()
            .map(|e| format!("[{}] {}\n{}", e.created_at.format("%Y-%m-%d %H:%M"), e.title, e.content))
            .collect::<Vec<_>>()
            .join("\n---\n");
        ToolResult::success(body)
    }
}

#[async_trait]
impl Tool for FolderNotebookWriteTool {
    fn name(&self) -> &str {
        "folder-notebook-write"
    }

    fn description(&self) -> &str {
        "Save a note against a folder (a convention, a gotcha, a decision) so \
         it resurfaces next time that folder is read."
    }

    fn always_auto_approved(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "folder": { "type": "string" },
                "title": { "type": "string" },
                "content": { "type": "string" }
            },
            "required": ["folder", "title", "content"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let (Some(folder), Some(title), Some(content)) = (
            input.get("folder").and_then(|v| v.as_str()),
            input.get("title").and_then(|v| v.as_str()),
            input.get("content").and_then(|v| v.as_str()),
        ) else {
            return ToolResult::error("missing required parameter: folder, title, or content");
        };

        match self.store.append(folder, title, content).await {
            Ok(_) => ToolResult::success(format!("Note saved for '{folder}'.")),
            Err(e) => ToolResult::error(format!("failed to save note: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let (reader, writer, _store) = folder_notebook_tools(dir.path());

        writer
            .execute(json!({ "folder": "src/auth", "title": "tokens", "content": "uses JWT" }))
            .await;
        let result = reader.execute(json!({ "folder": "src/auth" })).await;
        assert!(result.content.contains("uses JWT"));
    }

    #[tokio::test]
    async fn newest_returns_at_most_five_newest_first() {
        let dir = tempdir().unwrap();
        let store = NotebookStore::new(dir.path());
        for i in 0..8 {
            store.append("src", &format!("note-{i}"), "body").await.unwrap();
            // ensure distinct created_at ordering even under fast clocks
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }

        let newest = store.newest("src", 5).await;
        assert_eq!(newest.len(), 5);
        assert_eq!(newest[0].title, "note-7");
    }

    #[tokio::test]
    async fn unknown_folder_has_no_notes() {
        let dir = tempdir().unwrap();
        let store = NotebookStore::new(dir.path());
        assert!(store.newest("nowhere", 5).await.is_empty());
    }
}
