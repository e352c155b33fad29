//! `Orchestrator` — the Conversation Orchestration Engine (§4.4).
//!
//! `process_user_turn` composes every other module in this crate: pinned
//! messages, folder-notebook context, orphan repair, the per-round stream
//! accumulator, the outer retry loop (`snow-provider::retry`), the tool
//! dispatcher's batch confirmation/execution, the compressor's auto-trigger,
//! and the hook engine's `onStop` decision. Internal structure mirrors a
//! prior agent runtime's `AgentRuntime` (provider, prompt sources, and model
//! selection held behind a lock so a running turn can be redirected) but is
//! built around a recursive `SubAgentRunner` rather than that runtime's flat
//! channel-fanout, since a sub-agent here is "run another turn," not "relay
//! to another destination."

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock as StdRwLock, Weak};

use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use snow_core::config::OrchestratorConfig;
use snow_core::types::{ImagePart, Message, Session, SessionId, ToolCall, UsageInfo};
use snow_compress::Compressor;
use snow_hooks::{HookAction, HookContext, HookEngine, HookEvent};
use snow_provider::{build_request, retry, LlmProvider, SystemPromptSources, ToolDefinition};
use snow_sessions::{SessionStore, SnapshotStore};
use snow_tools::catalog::{Tool, ToolCatalog};
use snow_tools::dispatcher::{dispatch_batch, BatchConfirmation, ConfirmationSink, DispatchContext, PendingSink};
use snow_tools::policy::ApprovedToolsStore;
use snow_tools::subagent::{SubAgentRole, SubAgentRunner};

use crate::context_window;
use crate::error::{OrchestratorError, Result};
use crate::folder_notebook::FolderNotebookPreprocessor;
use crate::orphan_repair;
use crate::pinned;
use crate::streaming::{self, RoundObserver};

const DEFAULT_MAX_TOKENS: u32 = 8192;
const MAX_SUBAGENT_ROUNDS: usize = 25;

const MAIN_AGENT_SYSTEM_PROMPT: &str = "You are an interactive coding assistant running in a \
    terminal. Use the available tools to read, search, and edit the user's project, and to run \
    commands on their behalf. Keep the user informed as you work.";

/// The Conversation Orchestrator. One instance owns one session at a time
/// (`current_session`); the command layer swaps sessions in wholesale via
/// [`Orchestrator::load_session`] rather than running several turns
/// concurrently against one instance.
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    config: StdRwLock<OrchestratorConfig>,
    catalog: Arc<ToolCatalog>,
    sessions: Arc<SessionStore>,
    snapshots: Arc<SnapshotStore>,
    hooks: Arc<HookEngine>,
    approved: Arc<ApprovedToolsStore>,
    folder_notebook: Arc<FolderNotebookPreprocessor>,
    compressor: Arc<Compressor>,
    confirmation_sink: Arc<dyn ConfirmationSink>,
    pending_sink: Arc<dyn PendingSink>,
    observer: Arc<dyn RoundObserver>,
    current_session: AsyncMutex<Session>,
    project_id: String,
    read_folders: AsyncMutex<HashSet<String>>,
    /// User messages typed while a tool batch was executing (§4.4 step 7g).
    /// The command layer pushes into this via [`Orchestrator::push_pending_message`]
    /// from whatever input channel it reads from (stdin, IDE bridge, ...).
    pending_messages: AsyncMutex<Vec<String>>,
    /// Files touched by `filesystem-edit` tool calls since the last
    /// checkpoint, queued for the next snapshot (§4.4 step 3/7g). Full
    /// workspace diffing belongs to the command layer, which owns the
    /// workspace root; this orchestrator only tracks what its own tool
    /// dispatch observed this turn.
    edited_files: AsyncMutex<Vec<(String, Vec<u8>)>>,
    use_basic_model: AtomicBool,
}

impl Orchestrator {
    /// Constructs the orchestrator and its tool catalog together via
    /// `Arc::new_cyclic`: the catalog needs a `SubAgentRunner` that can call
    /// back into the orchestrator being built (`subagent-general`/
    /// `subagent-explore` recurse into `process_user_turn`'s sibling,
    /// [`Orchestrator::run_sub_agent_turn`]), and the orchestrator needs the
    /// finished catalog — a two-phase construction is the idiomatic way out
    /// of that cycle without an `Option<Arc<Self>>` field.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        config: OrchestratorConfig,
        sessions: Arc<SessionStore>,
        snapshots: Arc<SnapshotStore>,
        hooks: Arc<HookEngine>,
        approved: Arc<ApprovedToolsStore>,
        folder_notebook: Arc<FolderNotebookPreprocessor>,
        compressor: Arc<Compressor>,
        confirmation_sink: Arc<dyn ConfirmationSink>,
        pending_sink: Arc<dyn PendingSink>,
        observer: Arc<dyn RoundObserver>,
        project_id: String,
        session: Session,
        build_tools: impl FnOnce(Arc<dyn SubAgentRunner>) -> Vec<Box<dyn Tool>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Orchestrator>| {
            let runner: Arc<dyn SubAgentRunner> = Arc::new(SubAgentDispatcher { orchestrator: weak.clone() });
            let catalog = Arc::new(ToolCatalog::new(build_tools(runner)));

            Self {
                provider,
                config: StdRwLock::new(config),
                catalog,
                sessions,
                snapshots,
                hooks,
                approved,
                folder_notebook,
                compressor,
                confirmation_sink,
                pending_sink,
                observer,
                current_session: AsyncMutex::new(session),
                project_id,
                read_folders: AsyncMutex::new(HashSet::new()),
                pending_messages: AsyncMutex::new(Vec::new()),
                edited_files: AsyncMutex::new(Vec::new()),
                use_basic_model: AtomicBool::new(false),
            }
        })
    }

    pub async fn session_id(&self) -> SessionId {
        self.current_session.lock().await.id.clone()
    }

    pub async fn session_snapshot(&self) -> Session {
        self.current_session.lock().await.clone()
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn set_use_basic_model(&self, flag: bool) {
        self.use_basic_model.store(flag, Ordering::Relaxed);
    }

    /// Queue a message the user typed while a tool batch was mid-flight
    /// (§4.4 step 7g). Drained and combined at the next safe point.
    pub async fn push_pending_message(&self, text: String) {
        self.pending_messages.lock().await.push(text);
    }

    /// `/clear` (§4.8): runs `onSessionStart`, then swaps in a fresh
    /// session. Hard block (exit >= 2) leaves the previous session current
    /// and surfaces the hook's reason as an error.
    pub async fn start_new_session(&self, ephemeral: bool) -> Result<SessionId> {
        let mut ctx = HookContext::new(HookEvent::SessionStart, serde_json::json!({}));
        if let HookAction::Block { reason, exit_code } = self.hooks.emit_before(&mut ctx) {
            if exit_code >= 2 {
                return Err(OrchestratorError::HookBlocked { reason, exit_code });
            }
            warn!(%reason, "onSessionStart warned (exit 1), proceeding");
        }

        let new_session = self.sessions.create_new_session(ephemeral).await?;
        let old_id = {
            let mut guard = self.current_session.lock().await;
            let old = guard.id.clone();
            *guard = new_session.clone();
            old
        };
        self.folder_notebook.clear(&self.project_id, &old_id).await;
        self.read_folders.lock().await.clear();
        self.pending_messages.lock().await.clear();
        self.edited_files.lock().await.clear();
        Ok(new_session.id)
    }

    /// Run one user turn to completion (§4.4's 9-step algorithm).
    pub async fn process_user_turn(
        &self,
        user_text: String,
        images: Vec<ImagePart>,
        cancel: CancellationToken,
    ) -> Result<UsageInfo> {
        // Step 1: persist the user message exactly once, before any retry.
        let mut user_message = Message::user(user_text);
        if !images.is_empty() {
            user_message.images = Some(images);
        }
        self.persist(user_message).await?;

        let mut total_usage = UsageInfo::default();

        let outcome = self.run_turn_loop(&mut total_usage, &cancel).await;

        // Step 9: finally — commit any pending snapshots regardless of how
        // the loop ended.
        self.flush_snapshots().await;

        outcome.map(|()| total_usage)
    }

    async fn run_turn_loop(&self, total_usage: &mut UsageInfo, cancel: &CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(OrchestratorError::Aborted);
            }

            // Steps 2-5: build the request, stream the round, retrying the
            // whole round on retriable failure.
            let round = self.run_one_round(cancel).await?;
            total_usage.accumulate(&round.usage);

            match round.message.tool_calls.clone() {
                None => {
                    // Step 6: no tool_calls — append and run onStop.
                    self.persist(round.message).await?;
                    let session_id = self.session_id().await;
                    match self.run_stop_hook(&session_id).await? {
                        StopDecision::Terminate => return Ok(()),
                        StopDecision::ContinueAsUser(text) => {
                            self.persist(Message::user(text)).await?;
                            continue;
                        }
                    }
                }
                Some(calls) => {
                    // Step 7a: persist the assistant's tool_calls message
                    // (with reasoning preserved) before anything else.
                    self.persist(round.message).await?;

                    // Steps 7b-7e: confirm, execute, append results.
                    let dispatch_result = self.dispatch_tools(&calls, cancel).await?;
                    if cancel.is_cancelled() {
                        return Err(OrchestratorError::Aborted);
                    }
                    if dispatch_result.ended_turn {
                        return Ok(());
                    }

                    // Step 7f: auto-compression checkpoint.
                    self.maybe_compress().await?;

                    // Step 7g: drain pending messages typed mid-batch.
                    self.drain_pending_messages().await?;

                    // Step 7h: loop for the next round.
                }
            }
        }
    }

    async fn run_one_round(&self, cancel: &CancellationToken) -> Result<streaming::RoundResult> {
        let session = self.current_session.lock().await.clone();
        let outbound = self.build_outbound_messages(&session).await;
        let model = self.select_model();
        let tools = self.catalog.to_definitions();
        let prompt_sources =
            SystemPromptSources { main_agent_role: Some(MAIN_AGENT_SYSTEM_PROMPT.to_string()), ..Default::default() };
        let provider = Arc::clone(&self.provider);
        let observer = Arc::clone(&self.observer);

        let (retry_tx, mut retry_rx) = tokio::sync::mpsc::unbounded_channel();
        let retry_observer = Arc::clone(&observer);
        let retry_forwarder = tokio::spawn(async move {
            while let Some(status) = retry_rx.recv().await {
                retry_observer.on_retry(&status);
            }
        });

        let round = retry::with_retry(Some(&retry_tx), |_attempt| {
            let req = build_request(model.clone(), &prompt_sources, &outbound, tools.clone(), DEFAULT_MAX_TOKENS, false, None);
            let provider = Arc::clone(&provider);
            let observer = Arc::clone(&observer);
            let cancel = cancel.clone();
            async move {
                let stream = provider.stream(&req).await?;
                tokio::select! {
                    _ = cancel.cancelled() => Err(snow_provider::ProviderError::Cancelled),
                    result = streaming::accumulate(stream, observer.as_ref()) => result,
                }
            }
        })
        .await;
        drop(retry_tx);
        let _ = retry_forwarder.await;

        Ok(round?)
    }

    /// Step 3: assemble the outbound request history — pinned TODO/
    /// useful-info messages, folder-notebook redisplay, the session log
    /// (minus `sub_agent_internal` chatter), then orphan repair.
    async fn build_outbound_messages(&self, session: &Session) -> Vec<Message> {
        let mut outbound = pinned::build_pinned_messages(&self.catalog).await;

        let read_folders: Vec<String> = self.read_folders.lock().await.iter().cloned().collect();
        if let Some(notebook_msg) =
            self.folder_notebook.prepare_pinned_message(&self.project_id, &session.id, &read_folders).await
        {
            outbound.push(notebook_msg);
        }

        outbound.extend(session.messages.iter().filter(|m| !m.sub_agent_internal).cloned());

        orphan_repair::repair(&outbound)
    }

    async fn dispatch_tools(&self, calls: &[ToolCall], cancel: &CancellationToken) -> Result<DispatchResult> {
        let ctx = DispatchContext {
            catalog: &self.catalog,
            approved: &self.approved,
            yolo_mode: self.config.read().unwrap().yolo_mode,
            confirmation_sink: self.confirmation_sink.as_ref(),
            pending_sink: self.pending_sink.as_ref(),
            cancel: cancel.clone(),
        };

        let outcome = dispatch_batch(calls, &ctx).await;

        for result in &outcome.results {
            self.persist(snow_core::types::ToolResult {
                tool_call_id: result.tool_call_id.clone(),
                content: result.content.clone(),
                is_error: result.is_error,
            }
            .into_message())
            .await?;
        }

        self.track_filesystem_effects(calls, &outcome.results).await;

        if outcome.ended_turn {
            if let Some(note) = outcome.termination_note {
                self.persist(Message::assistant(note)).await?;
            }
        }

        Ok(DispatchResult { ended_turn: outcome.ended_turn })
    }

    /// After a batch, record which folders were read (for the folder
    /// notebook) and which files were edited (for the next snapshot).
    async fn track_filesystem_effects(&self, calls: &[ToolCall], results: &[snow_tools::dispatcher::ToolOutcome]) {
        for call in calls {
            let Some(outcome) = results.iter().find(|r| r.tool_call_id == call.id) else { continue };
            if outcome.is_error {
                continue;
            }
            let Some(path) = call.arguments_json.get("path").and_then(|v| v.as_str()) else { continue };

            match call.name.as_str() {
                "filesystem-read" => {
                    let mut folders = self.read_folders.lock().await;
                    for folder in FolderNotebookPreprocessor::parent_folders(path) {
                        folders.insert(folder);
                    }
                }
                "filesystem-edit" => {
                    if let Ok(bytes) = tokio::fs::read(path).await {
                        let mut edited = self.edited_files.lock().await;
                        edited.retain(|(p, _)| p != path);
                        edited.push((path.to_string(), bytes));
                    }
                }
                _ => {}
            }
        }
    }

    /// Queue a snapshot of whatever files were edited since the last
    /// checkpoint, keyed to the session's current message count.
    async fn checkpoint_snapshot(&self) {
        let mut edited = self.edited_files.lock().await;
        if edited.is_empty() {
            return;
        }
        let files = std::mem::take(&mut *edited);
        let session = self.current_session.lock().await;
        self.snapshots.create(&session.id, session.messages.len(), files);
    }

    async fn flush_snapshots(&self) {
        self.checkpoint_snapshot().await;
        let session_id = self.session_id().await;
        if let Err(e) = self.snapshots.commit(&session_id).await {
            warn!(session = %session_id, error = %e, "snapshot commit exhausted, dropping pending snapshots");
        }
    }

    async fn maybe_compress(&self) -> Result<()> {
        let session = self.current_session.lock().await.clone();
        let threshold = self.config.read().unwrap().compression_threshold_pct;
        if context_window::percentage(&session.messages) < threshold {
            return Ok(());
        }

        // Checkpoint whatever edits happened before the rewrite collapses
        // their message-index context.
        self.checkpoint_snapshot().await;

        match self.compressor.compact_session_if_needed(&session).await? {
            snow_compress::CompactOutcome::NotEnoughHistory => Ok(()),
            snow_compress::CompactOutcome::HookBlocked { reason } => {
                Err(OrchestratorError::HookBlocked { reason, exit_code: 2 })
            }
            snow_compress::CompactOutcome::Compacted(new_session) => {
                info!(old = %session.id, new = %new_session.id, "session compacted");
                let old_id = session.id.clone();
                *self.current_session.lock().await = new_session;
                self.folder_notebook.clear(&self.project_id, &old_id).await;
                self.read_folders.lock().await.clear();
                Ok(())
            }
        }
    }

    /// Force compaction regardless of the configured threshold (`/compact`).
    /// Shares the same hook-blocked/not-enough-history handling as the
    /// automatic trigger in [`Orchestrator::maybe_compress`].
    pub async fn force_compress(&self) -> Result<bool> {
        let session = self.current_session.lock().await.clone();
        self.checkpoint_snapshot().await;

        match self.compressor.compact_session_if_needed(&session).await? {
            snow_compress::CompactOutcome::NotEnoughHistory => Ok(false),
            snow_compress::CompactOutcome::HookBlocked { reason } => {
                Err(OrchestratorError::HookBlocked { reason, exit_code: 2 })
            }
            snow_compress::CompactOutcome::Compacted(new_session) => {
                info!(old = %session.id, new = %new_session.id, "session compacted (manual)");
                let old_id = session.id.clone();
                *self.current_session.lock().await = new_session;
                self.folder_notebook.clear(&self.project_id, &old_id).await;
                self.read_folders.lock().await.clear();
                Ok(true)
            }
        }
    }

    async fn drain_pending_messages(&self) -> Result<()> {
        let pending = std::mem::take(&mut *self.pending_messages.lock().await);
        if pending.is_empty() {
            return Ok(());
        }
        let combined = pending.join("\n\n");
        self.checkpoint_snapshot().await;
        self.persist(Message::user(combined)).await?;
        Ok(())
    }

    async fn run_stop_hook(&self, session_id: &SessionId) -> Result<StopDecision> {
        let mut ctx = HookContext::new(HookEvent::Stop, serde_json::json!({})).with_session(session_id.clone());
        let action = self.hooks.emit_before(&mut ctx);
        if let HookAction::Block { reason, exit_code } = action {
            if exit_code >= 2 {
                return Err(OrchestratorError::HookBlocked { reason, exit_code });
            }
            warn!(%reason, "onStop warned (exit 1), terminating turn");
            return Ok(StopDecision::Terminate);
        }

        let ask = ctx.payload.get("ask").and_then(|v| v.as_str()).unwrap_or_default();
        let keep_going = ctx.payload.get("continue").and_then(|v| v.as_bool()).unwrap_or(false);
        let message = ctx.payload.get("message").and_then(|v| v.as_str()).map(str::to_string);

        match (ask, keep_going, message) {
            ("ai", true, Some(m)) => Ok(StopDecision::ContinueAsUser(m)),
            _ => Ok(StopDecision::Terminate),
        }
    }

    async fn persist(&self, message: Message) -> Result<Session> {
        let mut guard = self.current_session.lock().await;
        let updated = self.sessions.save_message(&guard.id, message).await?;
        *guard = updated.clone();
        Ok(updated)
    }

    fn select_model(&self) -> String {
        let config = self.config.read().unwrap();
        if self.use_basic_model.load(Ordering::Relaxed) {
            config.basic_model.clone()
        } else {
            config.advanced_model.clone()
        }
    }

    /// Run a nested turn for `subagent-general`/`subagent-explore` (spec
    /// §4.2 table, GLOSSARY "Sub-agent"). The nested conversation is kept
    /// isolated — it starts from just `task`, not the parent session's
    /// history — but every message it produces is persisted into the
    /// *parent* session marked `sub_agent_internal` (§4.4 step 7d: "forward
    /// sub-agent stream events to the UI and save them with
    /// `subAgentInternal=true`"), so replay shows the nested work without
    /// the main conversation's outbound requests ever resending it.
    async fn run_sub_agent_turn(&self, role: SubAgentRole, task: &str) -> std::result::Result<String, String> {
        let mut isolated = vec![Message::user(task.to_string())];
        self.persist(mark_internal(&isolated[0])).await.map_err(|e| e.to_string())?;

        for _ in 0..MAX_SUBAGENT_ROUNDS {
            let model = self.select_model();
            let tools: Vec<ToolDefinition> =
                self.catalog.to_definitions().into_iter().filter(|t| role_allowed(role, &t.name)).collect();
            let prompt_sources = SystemPromptSources {
                sub_agent_role: Some(sub_agent_role_prompt(role).to_string()),
                main_agent_role: Some(MAIN_AGENT_SYSTEM_PROMPT.to_string()),
                ..Default::default()
            };
            let repaired = orphan_repair::repair(&isolated);
            let provider = Arc::clone(&self.provider);

            let round = retry::with_retry(None, |_attempt| {
                let req =
                    build_request(model.clone(), &prompt_sources, &repaired, tools.clone(), DEFAULT_MAX_TOKENS, false, None);
                let provider = Arc::clone(&provider);
                async move {
                    let stream = provider.stream(&req).await?;
                    streaming::accumulate(stream, &streaming::NullObserver).await
                }
            })
            .await
            .map_err(|e| e.to_string())?;

            let assistant = round.message;
            self.persist(mark_internal(&assistant)).await.map_err(|e| e.to_string())?;

            let Some(calls) = assistant.tool_calls.clone() else {
                return Ok(assistant.content);
            };
            isolated.push(assistant);

            let (allowed, denied): (Vec<ToolCall>, Vec<ToolCall>) =
                calls.into_iter().partition(|c| role_allowed(role, &c.name));

            for call in &denied {
                let denial = snow_core::types::ToolResult::error(
                    call.id.clone(),
                    format!("tool '{}' is not permitted for the {} sub-agent role", call.name, role.as_str()),
                )
                .into_message();
                self.persist(mark_internal(&denial)).await.map_err(|e| e.to_string())?;
                isolated.push(denial);
            }

            if allowed.is_empty() {
                continue;
            }

            let null_confirm = NullConfirmationSink;
            let null_pending = NullPendingSink;
            let ctx = DispatchContext {
                catalog: &self.catalog,
                approved: &self.approved,
                yolo_mode: true,
                confirmation_sink: &null_confirm,
                pending_sink: &null_pending,
                cancel: CancellationToken::new(),
            };
            let outcome = dispatch_batch(&allowed, &ctx).await;
            self.track_filesystem_effects(&allowed, &outcome.results).await;

            for result in outcome.results {
                let msg = snow_core::types::ToolResult {
                    tool_call_id: result.tool_call_id,
                    content: result.content,
                    is_error: result.is_error,
                }
                .into_message();
                self.persist(mark_internal(&msg)).await.map_err(|e| e.to_string())?;
                isolated.push(msg);
            }
        }

        Err("sub-agent exceeded its round budget without a final answer".to_string())
    }
}

enum StopDecision {
    Terminate,
    ContinueAsUser(String),
}

struct DispatchResult {
    ended_turn: bool,
}

fn mark_internal(message: &Message) -> Message {
    let mut copy = message.clone();
    copy.sub_agent_internal = true;
    copy
}

fn role_allowed(role: SubAgentRole, tool_name: &str) -> bool {
    // A sub-agent cannot itself delegate further — bounds recursion depth
    // to one level without needing an explicit counter threaded through
    // the tool-call protocol.
    if tool_name.starts_with("subagent-") {
        return false;
    }
    match role {
        SubAgentRole::General => true,
        SubAgentRole::Explore => !matches!(tool_name, "filesystem-edit" | "terminal-execute"),
    }
}

fn sub_agent_role_prompt(role: SubAgentRole) -> &'static str {
    match role {
        SubAgentRole::General => {
            "You are a sub-agent handling a task delegated by the main agent. You have the full \
             tool set. Work autonomously and end with a concise final answer — your tool calls \
             and intermediate reasoning are not shown to the user directly."
        }
        SubAgentRole::Explore => {
            "You are a read-only exploration sub-agent delegated an investigation. You may read, \
             search, and list files, but you cannot edit files or run commands. End with a \
             concise final answer summarizing what you found."
        }
    }
}

/// Bridges `snow-tools::subagent::SubAgentRunner` back into the orchestrator
/// that owns the catalog this runner was built into — see
/// [`Orchestrator::new`]'s `Arc::new_cyclic` construction.
struct SubAgentDispatcher {
    orchestrator: Weak<Orchestrator>,
}

#[async_trait]
impl SubAgentRunner for SubAgentDispatcher {
    async fn run(&self, role: SubAgentRole, task: &str) -> std::result::Result<String, String> {
        let orchestrator = self.orchestrator.upgrade().ok_or_else(|| "orchestrator was dropped".to_string())?;
        orchestrator.run_sub_agent_turn(role, task).await
    }
}

/// A sub-agent's nested tool dispatch has no UI to ask, so every call that
/// isn't flatly denied by role (`role_allowed`) is auto-approved — the
/// user already approved the outer `subagent-*` call (it's always
/// auto-approved per §4.2's table), and there is no nested confirmation
/// channel available to route a second prompt through.
struct NullConfirmationSink;
#[async_trait]
impl ConfirmationSink for NullConfirmationSink {
    async fn confirm_batch(&self, _pending: &[ToolCall]) -> BatchConfirmation {
        BatchConfirmation::Approve
    }
}

struct NullPendingSink;
#[async_trait]
impl PendingSink for NullPendingSink {
    async fn mark_pending(&self, _tool_call_id: &str, _tool_name: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explore_role_blocks_mutating_tools() {
        assert!(!role_allowed(SubAgentRole::Explore, "filesystem-edit"));
        assert!(!role_allowed(SubAgentRole::Explore, "terminal-execute"));
        assert!(role_allowed(SubAgentRole::Explore, "filesystem-read"));
    }

    #[test]
    fn general_role_allows_everything_but_nested_subagents() {
        assert!(role_allowed(SubAgentRole::General, "filesystem-edit"));
        assert!(role_allowed(SubAgentRole::General, "terminal-execute"));
        assert!(!role_allowed(SubAgentRole::General, "subagent-general"));
    }
}
