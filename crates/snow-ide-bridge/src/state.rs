//! Bridge-wide state and the bind-first-free-port startup routine (§4.10).

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use snow_core::config::IDE_BRIDGE_PORT_RANGE;
use snow_protocol::messages::{IdePush, IdeRequest};
use snow_protocol::types::DiffFile;
use snow_protocol::PortDiscoveryFile;

use crate::analysis;

const BROADCAST_CAPACITY: usize = 64;

/// Shared across every connection this bridge accepts. There is normally
/// only ever one live connection (one editor extension per workspace), but
/// nothing in the protocol forbids more, so pushes and diff commands fan
/// out to all of them.
///
/// Two outbound channels carry the two message families the connected
/// client receives unsolicited: [`AppState::push`] for editor-context
/// events, and the diff-view commands below (`show_diff` et al.) which
/// reuse `IdeRequest`'s wire shape (§4.10 groups them with the bridge's
/// request-handling section) but, unlike `getDiagnostics` and friends, are
/// commands this process sends the editor rather than questions the editor
/// asks the bridge — there is no reply to correlate.
pub struct AppState {
    pub workspace_folder: String,
    push_tx: broadcast::Sender<IdePush>,
    command_tx: broadcast::Sender<IdeRequest>,
    /// Last non-cleared `Context` push, rebroadcast when focus returns to an
    /// editor area without a fresh context report (§4.10 push semantics).
    pub last_context: Mutex<Option<IdePush>>,
    /// Set once any diff view is open; `closeDiff` clears it.
    pub diff_open: AtomicBool,
}

impl AppState {
    fn new(workspace_folder: String) -> Self {
        let (push_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (command_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            workspace_folder,
            push_tx,
            command_tx,
            last_context: Mutex::new(None),
            diff_open: AtomicBool::new(false),
        }
    }

    pub(crate) fn subscribe_push(&self) -> broadcast::Receiver<IdePush> {
        self.push_tx.subscribe()
    }

    pub(crate) fn subscribe_commands(&self) -> broadcast::Receiver<IdeRequest> {
        self.command_tx.subscribe()
    }

    /// Report editor context (active file, cursor, selection) to every
    /// connected client (§4.10 push). Cleared-context pushes drop the
    /// remembered last context instead of keeping it around to rebroadcast.
    pub fn push(&self, event: IdePush) {
        if matches!(event, IdePush::ClearedContext) {
            if let Ok(mut last) = self.last_context.try_lock() {
                *last = None;
            }
        } else if let Ok(mut last) = self.last_context.try_lock() {
            *last = Some(event.clone());
        }
        let _ = self.push_tx.send(event);
    }

    /// Open a diff view in the connected editor for a single file (tool
    /// edits call this with the before/after content they already have in
    /// hand).
    pub fn show_diff(&self, file_path: String, original_content: String, new_content: String, label: Option<String>) {
        self.diff_open.store(true, Ordering::Relaxed);
        let _ = self.command_tx.send(IdeRequest::ShowDiff { file_path, original_content, new_content, label });
    }

    /// Open a sequence of diffs (`/review`).
    pub fn show_diff_review(&self, files: Vec<DiffFile>) {
        self.diff_open.store(true, Ordering::Relaxed);
        let _ = self.command_tx.send(IdeRequest::ShowDiffReview { files });
    }

    /// Close whatever diff view(s) this bridge opened.
    pub fn close_diff(&self) {
        self.diff_open.store(false, Ordering::Relaxed);
        let _ = self.command_tx.send(IdeRequest::CloseDiff);
    }

    /// Diff a file against `git show HEAD:<relpath>` and open the result
    /// (§4.10: "missing-from-HEAD falls back to empty baseline"). The git
    /// read happens here, bridge-side, so the client only ever needs to
    /// render a plain two-content diff, same as [`AppState::show_diff`].
    pub async fn show_git_diff(&self, file_path: &str) {
        let original = analysis::git_show_head(&self.workspace_folder, file_path).await;
        let new_content = tokio::fs::read_to_string(file_path).await.unwrap_or_default();
        self.show_diff(file_path.to_string(), original, new_content, Some("git diff".to_string()));
    }
}

/// A running bridge; dropping or calling [`BridgeHandle::shutdown`] stops
/// serving and removes this workspace's entry from the port discovery file.
pub struct BridgeHandle {
    pub port: u16,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    discovery_path: std::path::PathBuf,
    workspace_folder: String,
    join: tokio::task::JoinHandle<()>,
}

impl BridgeHandle {
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.join).await;
        if let Err(e) = PortDiscoveryFile::unregister(&self.discovery_path, &self.workspace_folder) {
            warn!(error = %e, "failed to unregister IDE bridge port");
        }
    }
}

/// Binds the first free port in `[9527..9537]`, registers it in
/// `discovery_path` keyed by `workspace_folder`, and starts serving. New
/// logic, not present in a prior agent runtime (which binds one fixed configured
/// port) — a simple increment-and-retry loop is the idiomatic way to probe
/// a small fixed range without a port-scanning crate.
///
/// Returns the shared state (so the caller can push editor-context events)
/// alongside a [`BridgeHandle`] whose `shutdown` removes the discovery-file
/// entry on exit, per §4.10 ("On exit it removes its entries").
pub async fn bind_and_serve(
    workspace_folder: String,
    discovery_path: std::path::PathBuf,
) -> std::io::Result<(Arc<AppState>, BridgeHandle)> {
    let state = Arc::new(AppState::new(workspace_folder.clone()));

    let mut last_err = None;
    for port in IDE_BRIDGE_PORT_RANGE {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                PortDiscoveryFile::register(&discovery_path, &workspace_folder, port)?;
                info!(port, workspace = %workspace_folder, "IDE bridge listening");

                let router = build_router(Arc::clone(&state));
                let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
                let join = tokio::spawn(async move {
                    let server = axum::serve(listener, router).with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    });
                    if let Err(e) = server.await {
                        warn!(error = %e, "IDE bridge server exited with error");
                    }
                });

                let handle = BridgeHandle {
                    port,
                    shutdown_tx: Some(shutdown_tx),
                    discovery_path: discovery_path.clone(),
                    workspace_folder: workspace_folder.clone(),
                    join,
                };
                return Ok((state, handle));
            }
            Err(e) => last_err = Some(e),
        }
    }

    Err(last_err.unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::AddrInUse, "no free port in range")))
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new().route("/", axum::routing::get(crate::connection::ws_handler)).with_state(state)
}
