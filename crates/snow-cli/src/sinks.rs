//! Terminal-backed implementations of the confirmation/pending/observer/
//! question callbacks the orchestrator and tool catalog are built against
//! (§4.2, §4.4 step 4, `snow_tools::ask_user::QuestionSink`). This is
//! the thin command layer's only UI: everything else in the workspace is
//! UI-agnostic by design (§1 "terminal UI rendering... out of scope").

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{oneshot, Mutex};

use snow_core::types::ToolCall;
use snow_orchestrator::RoundObserver;
use snow_provider::StreamChunk;
use snow_tools::ask_user::{AnswerReceiver, QuestionSink};
use snow_tools::dispatcher::{BatchConfirmation, ConfirmationSink, PendingSink};
use snow_tools::subagent::{SubAgentRole, SubAgentRunner};

/// Reads one line from stdin, shared by every sink below so only one of
/// them is ever waiting on the terminal at a time (the orchestrator's
/// single-turn-at-a-time scheduling model, §5, means this is never
/// actually contended in practice, but the lock still documents the
/// invariant).
pub struct Stdin {
    reader: Mutex<BufReader<tokio::io::Stdin>>,
}

impl Stdin {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { reader: Mutex::new(BufReader::new(tokio::io::stdin())) })
    }

    /// Reads one line, or `None` once stdin has hit EOF (as opposed to a
    /// blank line, which reads as `Some(String::new())`).
    pub async fn read_line(&self) -> Option<String> {
        let mut line = String::new();
        let mut reader = self.reader.lock().await;
        match reader.read_line(&mut line).await {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\n', '\r']).to_string()),
            Err(_) => None,
        }
    }
}

/// Prints the streamed assistant content as it arrives; everything else
/// (tool-call deltas, reasoning) is left to `tracing` at debug level since
/// there's no dedicated UI region to render it in (§1 out-of-scope).
pub struct StdoutObserver;

impl RoundObserver for StdoutObserver {
    fn on_chunk(&self, chunk: &StreamChunk) {
        match chunk {
            StreamChunk::Content { delta } => {
                print!("{delta}");
                let _ = std::io::stdout().flush();
            }
            StreamChunk::Error { message, .. } => tracing::warn!(message, "stream error chunk"),
            _ => {}
        }
    }

    fn on_retry(&self, status: &snow_provider::RetryStatus) {
        println!(
            "\n[retrying {}/{} in {}ms: {}]",
            status.attempt, status.max_attempts, status.next_delay_ms, status.error
        );
    }
}

/// One prompt per batch (§4.2 "Batch confirmation"): lists every pending
/// tool call once, then reads a single decision line.
pub struct TerminalConfirmationSink {
    stdin: Arc<Stdin>,
}

impl TerminalConfirmationSink {
    pub fn new(stdin: Arc<Stdin>) -> Self {
        Self { stdin }
    }
}

#[async_trait]
impl ConfirmationSink for TerminalConfirmationSink {
    async fn confirm_batch(&self, pending: &[ToolCall]) -> BatchConfirmation {
        println!("\nThe assistant wants to run:");
        for call in pending {
            println!("  - {} {}", call.name, call.arguments_json);
        }
        println!("[y] approve  [a] approve always  [n] reject  [r] reject with a reply");
        print!("> ");
        let _ = std::io::stdout().flush();

        let line = self.stdin.read_line().await.unwrap_or_default();
        match line.trim() {
            "" | "y" | "Y" => BatchConfirmation::Approve,
            "a" | "A" => BatchConfirmation::ApproveAlways,
            "n" | "N" => BatchConfirmation::Reject,
            "r" | "R" => {
                print!("reason> ");
                let _ = std::io::stdout().flush();
                let reason = self.stdin.read_line().await.unwrap_or_default();
                BatchConfirmation::RejectWithReply(reason)
            }
            other => BatchConfirmation::RejectWithReply(other.to_string()),
        }
    }
}

/// Prints the "pending" marker for time-consuming tools (§4.2 two-step
/// signalling); terminal-only, so the "done" half of the signal is just
/// the tool result appearing in the transcript.
pub struct TerminalPendingSink;

#[async_trait]
impl PendingSink for TerminalPendingSink {
    async fn mark_pending(&self, tool_call_id: &str, tool_name: &str) {
        println!("  … running {tool_name} ({tool_call_id})");
    }
}

/// Surfaces `askuser-ask_question` (always-auto-approved) to the terminal
/// and feeds the typed reply back through the tool's oneshot channel.
pub struct TerminalQuestionSink {
    stdin: Arc<Stdin>,
}

impl TerminalQuestionSink {
    pub fn new(stdin: Arc<Stdin>) -> Self {
        Self { stdin }
    }
}

#[async_trait]
impl QuestionSink for TerminalQuestionSink {
    async fn ask(&self, question: &str) -> AnswerReceiver {
        println!("\n? {question}");
        print!("> ");
        let _ = std::io::stdout().flush();
        let answer = self.stdin.read_line().await.unwrap_or_default();
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(answer);
        rx
    }
}

/// Adapts the `Arc<dyn SubAgentRunner>` the orchestrator hands `build_tools`
/// into the `Box<dyn SubAgentRunner>` `SubAgentTool::new` wants — the
/// catalog is built once, from one `Arc`, but each of `subagent-general`/
/// `subagent-explore` needs its own owned trait object.
pub struct ArcSubAgentRunner(pub Arc<dyn SubAgentRunner>);

#[async_trait]
impl SubAgentRunner for ArcSubAgentRunner {
    async fn run(&self, role: SubAgentRole, task: &str) -> Result<String, String> {
        self.0.run(role, task).await
    }
}
