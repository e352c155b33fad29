//! Folder Notebook Preprocessor (§4.9, §12 — unchanged from the folder-notes feature).
//!
//! `ReadFolders` tracks, per `(projectId, sessionId)`, the newest 5
//! notebook-entry ids last shown for each folder the session has read a
//! file from. Each turn, every currently-read folder's newest 5 entries
//! (from `snow_tools::notebook::NotebookStore`) are compared against that
//! map; a folder whose id-tuple changed (including "never shown before")
//! needs redisplay. The pinned message the orchestrator prepends to a
//! round's outbound history (§4.4 step 3) covers only folders needing
//! redisplay, shallowest path first.
//!
//! State is held in memory behind a `DashMap` (generalizing a prior agent runtime's
//! per-resource concurrent-map idiom, same one `SessionStore` uses for its
//! write locks) and persisted as one JSON file per `(projectId,
//! sessionId)`, atomically, the same write-to-temp-then-rename idiom used
//! everywhere else in this workspace.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use snow_core::types::{Message, SessionId};
use snow_tools::notebook::NotebookStore;
use tokio::sync::Mutex as AsyncMutex;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct FolderNotebookState {
    /// folder path -> ids of the newest 5 entries last shown for it.
    shown: HashMap<String, Vec<String>>,
}

pub struct FolderNotebookPreprocessor {
    store: Arc<NotebookStore>,
    state_root: PathBuf,
    states: DashMap<(String, String), Arc<AsyncMutex<FolderNotebookState>>>,
}

impl FolderNotebookPreprocessor {
    pub fn new(store: Arc<NotebookStore>, state_root: impl Into<PathBuf>) -> Self {
        Self { store, state_root: state_root.into(), states: DashMap::new() }
    }

    /// All parent folders of `file_path`, deepest first, matching how the
    /// tool that performed the read would see its own target path.
    pub fn parent_folders(file_path: &str) -> Vec<String> {
        let mut folders = Vec::new();
        let mut path = std::path::Path::new(file_path);
        while let Some(parent) = path.parent() {
            let s = parent.to_string_lossy().to_string();
            if s.is_empty() {
                break;
            }
            folders.push(s);
            path = parent;
        }
        folders
    }

    /// Build the pinned user message covering folders needing redisplay
    /// this round, or `None` if nothing changed. `read_folders` is the set
    /// of folders read so far in the session (deduplication and sorting is
    /// this function's job, not the caller's).
    pub async fn prepare_pinned_message(
        &self,
        project_id: &str,
        session_id: &SessionId,
        read_folders: &[String],
    ) -> Option<Message> {
        if read_folders.is_empty() {
            return None;
        }

        let mut folders: Vec<String> = read_folders.to_vec();
        folders.sort();
        folders.dedup();
        // shallow to deep, per §4.9.
        folders.sort_by_key(|p| p.matches('/').count());

        let handle = self.state_for(project_id, session_id).await;
        let mut state = handle.lock().await;

        let mut needing_redisplay: Vec<(String, Vec<snow_tools::notebook::NotebookEntry>)> = Vec::new();
        for folder in &folders {
            let entries = self.store.newest(folder, 5).await;
            if entries.is_empty() {
                continue;
            }
            let ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
            if state.shown.get(folder) != Some(&ids) {
                state.shown.insert(folder.clone(), ids);
                needing_redisplay.push((folder.clone(), entries));
            }
        }

        if needing_redisplay.is_empty() {
            return None;
        }

        self.persist(project_id, session_id, &state).await;

        let mut body = String::from("Folder notes for directories read this session:\n\n");
        for (folder, entries) in &needing_redisplay {
            body.push_str(&format!("## {folder}\n"));
            for entry in entries {
                body.push_str(&format!("- {}: {}\n", entry.title, entry.content));
            }
            body.push('\n');
        }

        Some(Message::user(body.trim_end().to_string()))
    }

    /// Clears tracked redisplay state for a session (`/clear` or after
    /// compression, per §4.9's "cleared on /clear or compression").
    pub async fn clear(&self, project_id: &str, session_id: &SessionId) {
        self.states.remove(&(project_id.to_string(), session_id.to_string()));
        let path = self.state_path(project_id, session_id);
        let _ = tokio::fs::remove_file(&path).await;
    }

    async fn state_for(&self, project_id: &str, session_id: &SessionId) -> Arc<AsyncMutex<FolderNotebookState>> {
        let key = (project_id.to_string(), session_id.to_string());
        if let Some(existing) = self.states.get(&key) {
            return Arc::clone(&existing);
        }
        let loaded = self.load(project_id, session_id).await;
        let handle = Arc::new(AsyncMutex::new(loaded));
        self.states.entry(key).or_insert_with(|| Arc::clone(&handle));
        handle
    }

    async fn load(&self, project_id: &str, session_id: &SessionId) -> FolderNotebookState {
        let path = self.state_path(project_id, session_id);
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => FolderNotebookState::default(),
        }
    }

    async fn persist(&self, project_id: &str, session_id: &SessionId, state: &FolderNotebookState) {
        let path = self.state_path(project_id, session_id);
        if let Some(parent) = path.parent() {
            if tokio::fs::create_dir_all(parent).await.is_err() {
                return;
            }
        }
        let Ok(body) = serde_json::to_string_pretty(state) else { return };
        let tmp = path.with_extension("tmp");
        if tokio::fs::write(&tmp, body).await.is_ok() {
            let _ = tokio::fs::rename(&tmp, &path).await;
        }
    }

    fn state_path(&self, project_id: &str, session_id: &SessionId) -> PathBuf {
        self.state_root
            .join("readfolders")
            .join(snow_tools::notebook::slugify(project_id))
            .join(format!("{session_id}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn first_encounter_with_entries_needs_redisplay() {
        let dir = tempdir().unwrap();
        let store = Arc::new(NotebookStore::new(dir.path().join("notebooks")));
        store.append("src/auth", "tokens", "uses JWT").await.unwrap();

        let pre = FolderNotebookPreprocessor::new(store, dir.path().join("state"));
        let session = SessionId::new();
        let msg = pre
            .prepare_pinned_message("proj", &session, &["src/auth".to_string()])
            .await;
        assert!(msg.is_some());
        assert!(msg.unwrap().content.contains("uses JWT"));
    }

    #[tokio::test]
    async fn unchanged_notes_do_not_trigger_redisplay_twice() {
        let dir = tempdir().unwrap();
        let store = Arc::new(NotebookStore::new(dir.path().join("notebooks")));
        store.append("src/auth", "tokens", "uses JWT").await.unwrap();

        let pre = FolderNotebookPreprocessor::new(store, dir.path().join("state"));
        let session = SessionId::new();
        let first = pre.prepare_pinned_message("proj", &session, &["src/auth".to_string()]).await;
        assert!(first.is_some());

        let second = pre.prepare_pinned_message("proj", &session, &["src/auth".to_string()]).await;
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn new_note_after_stable_state_triggers_redisplay_again() {
        let dir = tempdir().unwrap();
        let store = Arc::new(NotebookStore::new(dir.path().join("notebooks")));
        store.append("src/auth", "tokens", "uses JWT").await.unwrap();

        let pre = FolderNotebookPreprocessor::new(store.clone(), dir.path().join("state"));
        let session = SessionId::new();
        assert!(pre.prepare_pinned_message("proj", &session, &["src/auth".to_string()]).await.is_some());
        assert!(pre.prepare_pinned_message("proj", &session, &["src/auth".to_string()]).await.is_none());

        store.append("src/auth", "sessions", "redis-backed").await.unwrap();
        assert!(pre.prepare_pinned_message("proj", &session, &["src/auth".to_string()]).await.is_some());
    }

    #[tokio::test]
    async fn folders_with_no_notes_are_skipped() {
        let dir = tempdir().unwrap();
        let store = Arc::new(NotebookStore::new(dir.path().join("notebooks")));
        let pre = FolderNotebookPreprocessor::new(store, dir.path().join("state"));
        let session = SessionId::new();
        let msg = pre.prepare_pinned_message("proj", &session, &["empty/dir".to_string()]).await;
        assert!(msg.is_none());
    }

    #[tokio::test]
    async fn clear_resets_tracking_so_existing_notes_redisplay() {
        let dir = tempdir().unwrap();
        let store = Arc::new(NotebookStore::new(dir.path().join("notebooks")));
        store.append("src", "note", "body").await.unwrap();

        let pre = FolderNotebookPreprocessor::new(store, dir.path().join("state"));
        let session = SessionId::new();
        assert!(pre.prepare_pinned_message("proj", &session, &["src".to_string()]).await.is_some());
        assert!(pre.prepare_pinned_message("proj", &session, &["src".to_string()]).await.is_none());

        pre.clear("proj", &session).await;
        assert!(pre.prepare_pinned_message("proj", &session, &["src".to_string()]).await.is_some());
    }

    #[test]
    fn parent_folders_walks_to_root() {
        let folders = FolderNotebookPreprocessor::parent_folders("src/auth/tokens.rs");
        assert_eq!(folders, vec!["src/auth".to_string(), "src".to_string()]);
    }
}
