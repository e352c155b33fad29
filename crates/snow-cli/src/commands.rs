//! Slash-command handlers (§6 "Command Layer (thin)"). Each command
//! maps directly onto an orchestrator action or a read of one of the
//! stores `main.rs` already assembled — no command here owns state of its
//! own beyond what it's handed.

use std::path::PathBuf;
use std::sync::Arc;

use snow_ide_bridge::state::AppState;
use snow_ide_bridge::BridgeHandle;
use snow_orchestrator::Orchestrator;
use snow_protocol::types::DiffFile;
use snow_sessions::SnapshotStore;
use tokio::sync::Mutex;

/// Holds the IDE bridge's handle across `/ide` toggles — `None` until the
/// first `/ide`, `Some` while the WebSocket server is bound.
pub struct IdeBridgeSlot {
    inner: Mutex<Option<(Arc<AppState>, BridgeHandle)>>,
    workspace: String,
    discovery_path: PathBuf,
}

impl IdeBridgeSlot {
    pub fn new(workspace: String, discovery_path: PathBuf) -> Self {
        Self { inner: Mutex::new(None), workspace, discovery_path }
    }

    /// `/ide`: bind on first call, shut down on the next (a toggle, since
    /// this runtime gives the command layer no separate on/off syntax).
    pub async fn toggle(&self) -> anyhow::Result<String> {
        let mut slot = self.inner.lock().await;
        if let Some((_, handle)) = slot.take() {
            let port = handle.port;
            handle.shutdown().await;
            return Ok(format!("IDE bridge on port {port} stopped."));
        }

        let (state, handle) =
            snow_ide_bridge::bind_and_serve(self.workspace.clone(), self.discovery_path.clone()).await?;
        let port = handle.port;
        *slot = Some((state, handle));
        Ok(format!("IDE bridge listening on ws://127.0.0.1:{port}"))
    }

    async fn state(&self) -> Option<Arc<AppState>> {
        self.inner.lock().await.as_ref().map(|(s, _)| Arc::clone(s))
    }

    pub async fn shutdown(&self) {
        if let Some((_, handle)) = self.inner.lock().await.take() {
            handle.shutdown().await;
        }
    }
}

/// `/compact`: force a compaction pass regardless of the configured
/// threshold (§4.6 "The manual `/compact` command uses the same routine").
pub async fn compact(orchestrator: &Orchestrator) -> String {
    match orchestrator.force_compress().await {
        Ok(true) => "Session compacted.".to_string(),
        Ok(false) => "Nothing to compact yet (need at least one full turn).".to_string(),
        Err(e) => format!("Compaction blocked: {e}"),
    }
}

/// `/clear`: run `onSessionStart` and swap in a fresh session (§4.8).
pub async fn clear(orchestrator: &Orchestrator, ephemeral: bool) -> String {
    match orchestrator.start_new_session(ephemeral).await {
        Ok(id) => format!("Started new session {id}."),
        Err(e) => format!("Could not start a new session: {e}"),
    }
}

/// `/export`: dump the current session verbatim to a JSON file in the
/// workspace root.
pub async fn export(orchestrator: &Orchestrator, workspace: &str) -> String {
    let session = orchestrator.session_snapshot().await;
    let path = PathBuf::from(workspace).join(format!("snow-export-{}.json", session.id));
    match serde_json::to_vec_pretty(&session) {
        Ok(body) => match tokio::fs::write(&path, body).await {
            Ok(()) => format!("Exported session to {}", path.display()),
            Err(e) => format!("Failed to write export: {e}"),
        },
        Err(e) => format!("Failed to serialize session: {e}"),
    }
}

/// `/review`: open the most recent snapshot's touched files as a diff
/// sequence in the connected editor (requires `/ide` to be active first).
/// The snapshot holds each file's pre-edit content; the current on-disk
/// content is the "new" side of the diff.
pub async fn review(
    orchestrator: &Orchestrator,
    snapshots: &SnapshotStore,
    ide: &IdeBridgeSlot,
) -> String {
    let Some(state) = ide.state().await else {
        return "No IDE bridge connected — run /ide first.".to_string();
    };

    let session_id = orchestrator.session_id().await;
    let entries = match snapshots.list(&session_id).await {
        Ok(entries) => entries,
        Err(e) => return format!("Failed to read snapshots: {e}"),
    };
    let Some(latest) = entries.last() else {
        return "No edits captured yet in this session.".to_string();
    };

    let originals = match snapshots.rollback(&session_id, latest.message_index).await {
        Ok(map) => map,
        Err(e) => return format!("Failed to load snapshot contents: {e}"),
    };

    let mut files = Vec::new();
    for entry in &latest.files {
        let original_content = originals
            .get(&entry.path)
            .map(|bytes| String::from_utf8_lossy(bytes).to_string())
            .unwrap_or_default();
        let new_content = tokio::fs::read_to_string(&entry.path).await.unwrap_or_default();
        files.push(DiffFile { file_path: entry.path.clone(), original_content, new_content, label: None });
    }

    let count = files.len();
    state.show_diff_review(files);
    format!("Opened {count} file(s) for review.")
}
