//! `askuser-ask_question` (§4.2 table). New tool, always-auto-approved:
//! the model asks a clarifying question and the UI layer collects the
//! user's typed reply and injects it back as the tool result content,
//! rather than this tool doing any I/O itself.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::catalog::{Tool, ToolResult};

/// Channel the UI layer uses to deliver the user's answer once collected.
/// The orchestrator constructs one of these per call, hands the sender to
/// its UI event bus, and awaits the receiver here.
pub type AnswerReceiver = oneshot::Receiver<String>;

/// Callback the orchestrator wires up to surface the question to the UI and
/// obtain an `AnswerReceiver` for it.
#[async_trait]
pub trait QuestionSink: Send + Sync {
    async fn ask(&self, question: &str) -> AnswerReceiver;
}

pub struct AskUserTool {
    sink: Box<dyn QuestionSink>,
}

impl AskUserTool {
    pub fn new(sink: Box<dyn QuestionSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Tool for AskUserTool {
    fn name(&self) -> &str {
        "askuser-ask_question"
    }

    fn description(&self) -> &str {
        "Ask the user a clarifying question and wait for their reply before \
         continuing. Use this instead of guessing when a request is ambiguous."
    }

    fn always_auto_approved(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "question": { "type": "string" } },
            "required": ["question"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let Some(question) = input.get("question").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: question");
        };

        let receiver = self.sink.ask(question).await;
        match receiver.await {
            Ok(answer) => ToolResult::success(answer),
            Err(_) => ToolResult::error("the user closed the session before answering"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoSink;

    #[async_trait]
    impl QuestionSink for EchoSink {
        async fn ask(&self, _question: &str) -> AnswerReceiver {
            let (tx, rx) = oneshot::channel();
            let _ = tx.send("yes, use postgres".to_string());
            rx
        }
    }

    #[tokio::test]
    async fn delivers_the_users_answer() {
        let tool = AskUserTool::new(Box::new(EchoSink));
        let result = tool.execute(json!({ "question": "which database?" })).await;
        assert!(!result.is_error);
        assert_eq!(result.content, "yes, use postgres");
    }

    #[tokio::test]
    async fn reports_error_when_sender_dropped_without_answering() {
        struct SilentSink;
        #[async_trait]
        impl QuestionSink for SilentSink {
            async fn ask(&self, _question: &str) -> AnswerReceiver {
                let (_tx, rx) = oneshot::channel();
                rx
            }
        }

        let tool = AskUserTool::new(Box::new(SilentSink));
        let result = tool.execute(json!({ "question": "which database?" })).await;
        assert!(result.is_error);
    }
}
