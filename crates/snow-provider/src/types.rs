//! Dialect-independent request/response shapes (§4.1, §3).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use snow_core::types::{Message, ToolCall, UsageInfo};

/// The four wire dialects a `ChatRequest` can be sent over. Selected by
/// config (`snow-core::config::ProvidersConfig`), never sniffed at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderDialect {
    ChatCompletions,
    Responses,
    Anthropic,
    Gemini,
}

/// A tool definition as handed to the model. `strict` closes
/// `additionalProperties: false` on every object in `input_schema` for
/// dialects that support strict function-calling schemas (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    #[serde(default)]
    pub strict: bool,
}

/// The four system-prompt sources, in priority order (§4.1): a sub-agent's
/// own custom prompt wins over its role default, which wins over the main
/// agent's custom prompt, which wins over the main agent's role default.
#[derive(Debug, Clone, Default)]
pub struct SystemPromptSources {
    pub sub_agent_custom: Option<String>,
    pub sub_agent_role: Option<String>,
    pub main_agent_custom: Option<String>,
    pub main_agent_role: Option<String>,
}

impl SystemPromptSources {
    /// Resolve to the single prompt string actually sent on the wire.
    /// Input `system` messages are never forwarded verbatim — this is
    /// always rebuilt fresh per request.
    pub fn resolve(&self) -> String {
        self.sub_agent_custom
            .as_deref()
            .or(self.sub_agent_role.as_deref())
            .or(self.main_agent_custom.as_deref())
            .or(self.main_agent_role.as_deref())
            .unwrap_or_default()
            .to_string()
    }
}

/// A provider-agnostic chat request. Dialect builders translate this into
/// their own wire body; nothing here is dialect-specific.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system_prompt: String,
    /// History plus the current turn, already orphan-repaired and filtered
    /// (`subAgentInternal` messages dropped) by the caller.
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: u32,
    /// Extended/reasoning mode requested, dialect interprets as it sees fit
    /// (Anthropic: thinking budget; Responses: reasoning effort).
    pub thinking: bool,
    /// Forwarded as the prompt cache key where the dialect supports one
    /// (§4.1 "Cache key").
    pub cache_key: Option<String>,
}

/// The uniform event sequence every dialect decoder emits (§4.1 §3).
///
/// Ordering invariants (enforced by each decoder, not by this type):
/// any `ReasoningStarted` precedes its `ReasoningDelta`s; all `Content`/
/// `ToolCallDelta` precede their terminating `ToolCalls`; `Usage` may
/// arrive before or after `Done`; `Done` is always last.
#[derive(Debug, Clone)]
pub enum StreamChunk {
    Content { delta: String },
    ToolCallDelta { index: usize, id: Option<String>, name: Option<String>, arguments_delta: String },
    ToolCalls { calls: Vec<ToolCall> },
    ReasoningStarted,
    ReasoningDelta { delta: String },
    /// Opaque trailing reasoning metadata (e.g. Anthropic's thinking-block
    /// signature) — preserved verbatim, never interpreted (§9 design note).
    ReasoningData { data: Value },
    /// Anthropic's own "thinking" content, kept as a distinct kind from
    /// `ReasoningDelta` because its on-wire shape (and the `thinking` field
    /// on `Message`) is dialect-specific.
    Thinking { delta: String },
    Usage { usage: UsageInfo },
    Done,
    Error { message: String, retriable: bool },
}

impl StreamChunk {
    /// A "business" chunk resets the idle-timeout clock (§4.1); keep-alive
    /// comments never reach this type at all (filtered at the SSE layer),
    /// and `Usage`/`Done`/`Error` don't need to reset a clock about to stop.
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            StreamChunk::Content { .. }
                | StreamChunk::ToolCallDelta { .. }
                | StreamChunk::ToolCalls { .. }
                | StreamChunk::ReasoningStarted
                | StreamChunk::ReasoningDelta { .. }
                | StreamChunk::ReasoningData { .. }
                | StreamChunk::Thinking { .. }
        )
    }
}

/// Split tool messages that carry images into a text-only tool message plus
/// a following user message bearing the images — providers reject images
/// inside tool results (§4.1).
pub fn split_tool_images(messages: &[Message]) -> Vec<Message> {
    let mut out = Vec::with_capacity(messages.len());
    for m in messages {
        if m.role == snow_core::types::Role::Tool && m.images.as_ref().is_some_and(|i| !i.is_empty()) {
            let images = m.images.clone();
            let mut text_only = m.clone();
            text_only.images = None;
            out.push(text_only);

            let mut image_msg = Message::user(String::new());
            image_msg.images = images;
            out.push(image_msg);
        } else {
            out.push(m.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_priority_resolves_highest_present() {
        let sources = SystemPromptSources {
            sub_agent_custom: None,
            sub_agent_role: Some("sub-role".into()),
            main_agent_custom: Some("main-custom".into()),
            main_agent_role: Some("main-role".into()),
        };
        assert_eq!(sources.resolve(), "sub-role");
    }

    #[test]
    fn system_prompt_falls_back_to_main_role() {
        let sources = SystemPromptSources::default();
        assert_eq!(sources.resolve(), "");
        let sources = SystemPromptSources {
            main_agent_role: Some("default".into()),
            ..Default::default()
        };
        assert_eq!(sources.resolve(), "default");
    }

    #[test]
    fn tool_message_with_images_splits_into_two() {
        use snow_core::types::ImagePart;
        let mut tool_msg = Message::tool_result("call-1", "ran ok");
        tool_msg.images = Some(vec![ImagePart { mime_type: "image/png".into(), data: "abc".into() }]);

        let split = split_tool_images(&[tool_msg]);
        assert_eq!(split.len(), 2);
        assert_eq!(split[0].role, snow_core::types::Role::Tool);
        assert!(split[0].images.is_none());
        assert_eq!(split[1].role, snow_core::types::Role::User);
        assert!(split[1].images.is_some());
    }

    #[test]
    fn business_chunk_classification() {
        assert!(StreamChunk::Content { delta: "x".into() }.is_business());
        assert!(StreamChunk::Thinking { delta: "x".into() }.is_business());
        assert!(!StreamChunk::Done.is_business());
        assert!(!StreamChunk::Usage { usage: UsageInfo::default() }.is_business());
    }
}
