//! Session compaction (§4.6). Grounded on a prior agent runtime's
//! `pipeline::compact::compact_session_if_needed` — same overall shape
//! (threshold check, cheap-model call, structured extraction, rewrite) —
//! generalized from fact-extraction-into-`user_memory` to this runtime's
//! summary-plus-preserved-tail rewrite of the session itself, and from a
//! hardcoded Haiku model id to the configured basic/cheap model (the
//! `useBasicModel` knob, §4.4 step 3).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use serde::Deserialize;
use tracing::{info, warn};

use snow_core::types::{Message, Role, Session};
use snow_hooks::{HookContext, HookEngine, HookEvent};
use snow_provider::{ChatRequest, LlmProvider, StreamChunk, SystemPromptSources};
use snow_sessions::SessionStore;

use crate::error::{CompressError, Result};

const SUMMARIZATION_SYSTEM_PROMPT: &str = concat!(
    "You are summarizing a coding-assistant conversation so it can continue with less context. ",
    "Read the transcript and respond with ONLY a JSON object of the form ",
    r#"{"summary": "...", "preserved_tail_start": N}. "#,
    "`summary` is a concise prose account of what has happened and what still needs doing. ",
    "`preserved_tail_start` is the 0-based index into the message list of the first message ",
    "that should be kept verbatim (a natural turn boundary near the end of the conversation, ",
    "typically the last 2-6 turns) — everything before it is represented only by the summary."
);

#[derive(Debug, Deserialize)]
struct SummarizationResponse {
    summary: String,
    preserved_tail_start: usize,
}

/// What `compact_session_if_needed` decided to do.
pub enum CompactOutcome {
    /// Only one turn, or no assistant response yet (§4.6 step 2) — nothing
    /// to compact.
    NotEnoughHistory,
    /// `beforeCompress` hard-blocked the run (exit code >= 2). The caller
    /// (`snow-orchestrator`) surfaces this as a fatal error and aborts the
    /// turn, per §4.6 step 3.
    HookBlocked { reason: String },
    Compacted(Session),
}

pub struct Compressor {
    provider: Arc<dyn LlmProvider>,
    model: String,
    hooks: Arc<HookEngine>,
    sessions: Arc<SessionStore>,
    /// Root directory holding one per-session state subdirectory
    /// (`<root>/<sessionId>/todo.json`, ...). `None` for callers (test
    /// harnesses) that keep no per-session state on disk at all — todo
    /// migration is then skipped rather than attempted against a bogus path.
    state_root: Option<PathBuf>,
}

impl Compressor {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        hooks: Arc<HookEngine>,
        sessions: Arc<SessionStore>,
        state_root: Option<PathBuf>,
    ) -> Self {
        Self { provider, model: model.into(), hooks, sessions, state_root }
    }

    /// Run the compaction routine (§4.6 steps 1-7). The new session's id is
    /// only known once this function creates it, so the per-session state
    /// directories to migrate the TODO list between (step 6) are derived
    /// from `self.state_root` internally rather than accepted as caller-
    /// supplied paths — a caller can't name a directory keyed by an id that
    /// doesn't exist yet.
    pub async fn compact_session_if_needed(&self, session: &Session) -> Result<CompactOutcome> {
        // Step 1: persist the current session first so the compressor
        // reads a complete record even if this run is interrupted.
        self.sessions.save_session(session).await?;

        // Step 2: nothing to compact if there's only one turn, or no
        // assistant response has arrived yet.
        let has_assistant_reply = session.messages.iter().any(|m| m.role == Role::Assistant);
        if session.messages.len() < 2 || !has_assistant_reply {
            return Ok(CompactOutcome::NotEnoughHistory);
        }

        // Step 3: beforeCompress hook.
        let mut ctx = HookContext::new(
            HookEvent::BeforeCompress,
            serde_json::json!({ "session_id": session.id.to_string(), "message_count": session.messages.len() }),
        )
        .with_session(session.id.clone());
        let action = self.hooks.emit_before(&mut ctx);
        if let snow_hooks::HookAction::Block { reason, exit_code } = action {
            if exit_code >= 2 {
                return Ok(CompactOutcome::HookBlocked { reason });
            }
            warn!(session = %session.id, %reason, "beforeCompress warned (exit 1), proceeding");
        }

        // Step 4: summarize via the cheap/basic model.
        let summarization = self.summarize(&session.messages).await?;
        let tail_start = summarization.preserved_tail_start.min(session.messages.len());

        // Step 5: build the synthetic user message.
        let tail = &session.messages[tail_start..];
        let mut body = summarization.summary.clone();
        if !tail.is_empty() {
            body.push_str("\n\n---\n\n");
            body.push_str(&render_markdown_transcript(tail));
        }
        let synthetic = Message::user(body);

        // Step 6: new session pointing back at the old one.
        let mut new_session = Session::new(session.ephemeral);
        new_session.compressed_from = Some(session.id.clone());
        new_session.compressed_at = Some(chrono::Utc::now());
        new_session.original_message_index = Some(tail_start);
        new_session.title = session.title.clone();
        new_session.messages = vec![synthetic];
        self.sessions.save_session(&new_session).await?;

        if let Some(root) = &self.state_root {
            let old_dir = root.join(session.id.as_str());
            let new_dir = root.join(new_session.id.as_str());
            migrate_todo_list(&old_dir, &new_dir).await;
        }

        // Reload from disk per spec: the caller's current session becomes
        // whatever round-trips through the store, not the in-memory struct.
        let reloaded = self.sessions.load_session(&new_session.id).await?;

        info!(
            old_session = %session.id,
            new_session = %reloaded.id,
            tail_start,
            "compacted session"
        );

        Ok(CompactOutcome::Compacted(reloaded))
    }

    async fn summarize(&self, messages: &[Message]) -> Result<SummarizationResponse> {
        let transcript = render_markdown_transcript(messages);
        let req = ChatRequest {
            model: self.model.clone(),
            system_prompt: SystemPromptSources {
                main_agent_custom: Some(SUMMARIZATION_SYSTEM_PROMPT.to_string()),
                ..Default::default()
            }
            .resolve(),
            messages: vec![Message::user(format!(
                "Summarize this conversation:\n\n{transcript}"
            ))],
            tools: Vec::new(),
            max_tokens: 2048,
            thinking: false,
            cache_key: None,
        };

        let mut stream = self.provider.stream(&req).await?;
        let mut content = String::new();
        while let Some(item) = stream.next().await {
            match item? {
                StreamChunk::Content { delta } => content.push_str(&delta),
                StreamChunk::Done => break,
                StreamChunk::Error { message, .. } => return Err(CompressError::Parse(message)),
                _ => {}
            }
        }

        parse_summarization_response(&content)
    }
}

fn parse_summarization_response(raw: &str) -> Result<SummarizationResponse> {
    let trimmed = raw.trim();
    let json_str = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(s), Some(e)) if e >= s => &trimmed[s..=e],
        _ => trimmed,
    };
    serde_json::from_str(json_str).map_err(|e| CompressError::Parse(format!("{e}: {json_str}")))
}

/// Render a slice of messages as markdown, inlining tool_calls and tool
/// results as code blocks rather than preserving `role: tool` shape (§4.6
/// step 5 — avoids tool_call/tool_result integrity violations in the
/// rewritten history).
fn render_markdown_transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        match message.role {
            Role::User => {
                out.push_str(&format!("**User:** {}\n\n", message.content));
            }
            Role::Assistant => {
                if !message.content.is_empty() {
                    out.push_str(&format!("**Assistant:** {}\n\n", message.content));
                }
                if let Some(calls) = &message.tool_calls {
                    for call in calls {
                        out.push_str(&format!(
                            "**Tool call `{}` ({}):**\n```json\n{}\n```\n\n",
                            call.name, call.id, call.arguments_json
                        ));
                    }
                }
            }
            Role::Tool => {
                out.push_str(&format!(
                    "**Tool result ({}):**\n```\n{}\n```\n\n",
                    message.tool_call_id.as_deref().unwrap_or("?"),
                    message.content
                ));
            }
            Role::System => {
                out.push_str(&format!("**System:** {}\n\n", message.content));
            }
        }
    }
    out
}

/// Copies the per-session todo list file, if present, from the old
/// session's state directory to the new one (§4.6 step 6). Missing file is
/// not an error — a fresh session with no todos yet is normal.
async fn migrate_todo_list(old_dir: &Path, new_dir: &Path) {
    let old_path = old_dir.join("todo.json");
    let new_path = new_dir.join("todo.json");
    if let Err(e) = tokio::fs::create_dir_all(new_dir).await {
        warn!(error = %e, "failed to create new session state dir for todo migration");
        return;
    }
    match tokio::fs::copy(&old_path, &new_path).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(error = %e, "failed to migrate todo list"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_summary_wrapped_in_prose() {
        let raw = "Sure, here you go:\n{\"summary\": \"did stuff\", \"preserved_tail_start\": 3}\nthanks";
        let parsed = parse_summarization_response(raw).unwrap();
        assert_eq!(parsed.summary, "did stuff");
        assert_eq!(parsed.preserved_tail_start, 3);
    }

    #[test]
    fn renders_tool_calls_and_results_as_code_blocks() {
        let mut assistant = Message::assistant("checking the file");
        assistant.tool_calls = Some(vec![snow_core::types::ToolCall {
            id: "t1".into(),
            name: "filesystem-read".into(),
            arguments_json: serde_json::json!({ "path": "a.rs" }),
        }]);
        let tool_result = Message::tool_result("t1", "fn main() {}");

        let rendered = render_markdown_transcript(&[assistant, tool_result]);
        assert!(rendered.contains("filesystem-read"));
        assert!(rendered.contains("```json"));
        assert!(rendered.contains("fn main()"));
    }
}
