use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a session (UUIDv7 — time-sortable for log correlation
/// and for picking the most-recent session without a secondary index).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Per-connection identifier for the IDE bridge (random, not persisted).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnId(pub String);

impl ConnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message role. `System` never appears in a persisted session — the
/// orchestrator rebuilds the system prompt on every request (§4.1) — but the
/// variant exists because dialect builders address messages by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        write!(f, "{}", s)
    }
}

/// A model-emitted intent to invoke a named tool with JSON arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments_json: Value,
}

/// One image part attached to a user or tool message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePart {
    pub mime_type: String,
    /// Base64-encoded bytes, or a full `data:` URL — callers treat this
    /// opaquely and forward it to the dialect's multi-part image builder.
    pub data: String,
}

/// The atomic conversation unit (§3).
///
/// `reasoning`/`thinking`/`reasoning_content` are provider-specific opaque
/// blobs. They are modeled as `Option<Value>` rather than typed structs so
/// they round-trip byte-identical across turns (P9) — providers reject
/// tool-call chains that drop or reshape them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImagePart>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<Value>,
    /// true: visible in the session log for replay, but must NOT be
    /// re-sent to the LLM (sub-agent internal chatter).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sub_agent_internal: bool,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: chrono::Utc::now(),
            tool_calls: None,
            tool_call_id: None,
            images: None,
            reasoning: None,
            thinking: None,
            reasoning_content: None,
            sub_agent_internal: false,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: chrono::Utc::now(),
            tool_calls: None,
            tool_call_id: None,
            images: None,
            reasoning: None,
            thinking: None,
            reasoning_content: None,
            sub_agent_internal: false,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            timestamp: chrono::Utc::now(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            images: None,
            reasoning: None,
            thinking: None,
            reasoning_content: None,
            sub_agent_internal: false,
        }
    }

    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(calls);
        self
    }

    pub fn with_reasoning(
        mut self,
        reasoning: Option<Value>,
        thinking: Option<Value>,
        reasoning_content: Option<Value>,
    ) -> Self {
        self.reasoning = reasoning;
        self.thinking = thinking;
        self.reasoning_content = reasoning_content;
        self
    }

    pub fn sub_agent(mut self) -> Self {
        self.sub_agent_internal = true;
        self
    }
}

/// The result of executing a single tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: format!("Error: {}", content.into()),
            is_error: true,
        }
    }

    pub fn into_message(self) -> Message {
        Message::tool_result(self.tool_call_id, self.content)
    }
}

/// A session: an append-only log of messages plus compression lineage (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed_from: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_message_index: Option<usize>,
    /// Ephemeral sessions (SNOW_TASK_MODE=true) are never listed or resumed.
    #[serde(default)]
    pub ephemeral: bool,
    pub messages: Vec<Message>,
}

impl Session {
    pub fn new(ephemeral: bool) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: SessionId::new(),
            created_at: now,
            updated_at: now,
            title: String::new(),
            summary: String::new(),
            compressed_from: None,
            compressed_at: None,
            original_message_index: None,
            ephemeral,
            messages: Vec::new(),
        }
    }
}

/// Accumulated token usage for one user turn (§3, P3).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageInfo {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation_input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u64>,
}

impl UsageInfo {
    /// Fold one round's usage into the running turn total (P3).
    pub fn accumulate(&mut self, round: &UsageInfo) {
        self.prompt_tokens += round.prompt_tokens;
        self.completion_tokens += round.completion_tokens;
        self.total_tokens += round.total_tokens;
        if let Some(c) = round.cached_tokens {
            self.cached_tokens = Some(self.cached_tokens.unwrap_or(0) + c);
        }
        if let Some(c) = round.cache_creation_input_tokens {
            self.cache_creation_input_tokens =
                Some(self.cache_creation_input_tokens.unwrap_or(0) + c);
        }
        if let Some(c) = round.cache_read_input_tokens {
            self.cache_read_input_tokens = Some(self.cache_read_input_tokens.unwrap_or(0) + c);
        }
    }
}
