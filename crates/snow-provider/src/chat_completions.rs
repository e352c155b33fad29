//! OpenAI-compatible chat-completions dialect (§4.1). Request body and
//! response-type shapes are modeled on a prior agent runtime's `openai.rs`;
//! unlike that runtime's streaming path (which only forwards text deltas),
//! this decoder also accumulates streamed `tool_calls` deltas, since this
//! runtime's tool dispatcher needs them mid-round.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::StreamExt;

use snow_core::types::{Role, ToolCall, UsageInfo};

use crate::dialect::{ChunkStream, LlmProvider};
use crate::error::ProviderError;
use crate::sse::{scan, ScanError, SseItem};
use crate::types::{ChatRequest, StreamChunk};

pub struct ChatCompletionsProvider {
    client: reqwest::Client,
    provider_name: String,
    api_key: String,
    base_url: String,
    chat_path: String,
    idle_timeout: Duration,
}

impl ChatCompletionsProvider {
    pub fn new(
        provider_name: impl Into<String>,
        api_key: String,
        base_url: String,
        chat_path: String,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            provider_name: provider_name.into(),
            api_key,
            base_url,
            chat_path,
            idle_timeout,
        }
    }

    fn build_body(&self, req: &ChatRequest) -> Value {
        let mut messages = vec![json!({ "role": "system", "content": req.system_prompt })];
        for m in &req.messages {
            messages.push(message_to_openai(m));
        }

        let mut body = json!({
            "model": req.model,
            "messages": messages,
            "max_tokens": req.max_tokens,
            "stream": true,
        });

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.input_schema,
                            "strict": t.strict,
                        }
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }

        body
    }
}

fn message_to_openai(m: &snow_core::types::Message) -> Value {
    if let Some(tool_call_id) = &m.tool_call_id {
        return json!({ "role": "tool", "tool_call_id": tool_call_id, "content": m.content });
    }
    if let Some(calls) = &m.tool_calls {
        let tool_calls: Vec<Value> = calls
            .iter()
            .map(|c| {
                json!({
                    "id": c.id,
                    "type": "function",
                    "function": { "name": c.name, "arguments": c.arguments_json.to_string() },
                })
            })
            .collect();
        return json!({
            "role": "assistant",
            "content": if m.content.is_empty() { Value::Null } else { json!(m.content) },
            "tool_calls": tool_calls,
        });
    }
    let role = match m.role {
        Role::Assistant => "assistant",
        Role::User | Role::Tool | Role::System => "user",
    };
    json!({ "role": role, "content": m.content })
}

#[async_trait]
impl LlmProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn stream(&self, req: &ChatRequest) -> Result<ChunkStream, ProviderError> {
        let body = self.build_body(req);
        let url = format!("{}{}", self.base_url, self.chat_path);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            let retry_after_ms = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|s| s * 1000)
                .unwrap_or(5000);
            return Err(ProviderError::RateLimited { retry_after_ms });
        }
        if status.is_server_error() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Http5xx { status: status.as_u16(), message });
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status: status.as_u16(), message });
        }

        let byte_stream = resp.bytes_stream();
        let decoded = decode(scan(byte_stream));
        Ok(Box::pin(crate::idle::guard(decoded, self.idle_timeout)))
    }
}

fn decode(
    sse: impl futures_util::Stream<Item = Result<SseItem, ScanError>> + Send + 'static,
) -> impl futures_util::Stream<Item = Result<StreamChunk, ProviderError>> + Send + 'static {
    async_stream::stream! {
        tokio::pin!(sse);
        let mut tool_calls: Vec<PartialToolCall> = Vec::new();
        let mut saw_tool_calls = false;

        while let Some(item) = sse.next().await {
            let item = match item {
                Ok(i) => i,
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            };

            let chunk = match item {
                SseItem::Done => {
                    if saw_tool_calls {
                        let calls = tool_calls
                            .drain(..)
                            .map(|p| ToolCall {
                                id: p.id,
                                name: p.name,
                                arguments_json: serde_json::from_str(&p.arguments)
                                    .unwrap_or_else(|_| json!({})),
                            })
                            .collect();
                        yield Ok(StreamChunk::ToolCalls { calls });
                    }
                    yield Ok(StreamChunk::Done);
                    return;
                }
                SseItem::Event(ev) => ev.data,
            };

            let parsed: Result<ApiStreamChunk, _> = serde_json::from_str(&chunk);
            let Ok(parsed) = parsed else { continue };

            if let Some(usage) = parsed.usage {
                yield Ok(StreamChunk::Usage {
                    usage: UsageInfo {
                        prompt_tokens: usage.prompt_tokens as u64,
                        completion_tokens: usage.completion_tokens as u64,
                        total_tokens: (usage.prompt_tokens + usage.completion_tokens) as u64,
                        cached_tokens: None,
                        cache_creation_input_tokens: None,
                        cache_read_input_tokens: None,
                    },
                });
            }

            for choice in parsed.choices {
                if let Some(content) = choice.delta.content {
                    if !content.is_empty() {
                        yield Ok(StreamChunk::Content { delta: content });
                    }
                }
                if let Some(deltas) = choice.delta.tool_calls {
                    saw_tool_calls = true;
                    for d in deltas {
                        let index = d.index;
                        while tool_calls.len() <= index {
                            tool_calls.push(PartialToolCall::default());
                        }
                        let slot = &mut tool_calls[index];
                        if let Some(id) = &d.id {
                            slot.id = id.clone();
                        }
                        if let Some(f) = &d.function {
                            if let Some(name) = &f.name {
                                slot.name = name.clone();
                            }
                            if let Some(args) = &f.arguments {
                                slot.arguments.push_str(args);
                            }
                        }
                        yield Ok(StreamChunk::ToolCallDelta {
                            index,
                            id: d.id,
                            name: d.function.as_ref().and_then(|f| f.name.clone()),
                            arguments_delta: d
                                .function
                                .as_ref()
                                .and_then(|f| f.arguments.clone())
                                .unwrap_or_default(),
                        });
                    }
                }
            }
        }
    }
}

#[derive(Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct ApiStreamChunk {
    choices: Vec<ApiStreamChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ApiStreamChoice {
    delta: ApiStreamDelta,
}

#[derive(Deserialize, Default)]
struct ApiStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<ApiToolCallDelta>>,
}

#[derive(Deserialize)]
struct ApiToolCallDelta {
    index: usize,
    id: Option<String>,
    function: Option<ApiFunctionDelta>,
}

#[derive(Deserialize)]
struct ApiFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn sse_body(frames: &[&str]) -> impl futures_util::Stream<Item = reqwest::Result<Bytes>> {
        tokio_stream::iter(frames.iter().map(|f| Ok(Bytes::from(f.to_string()))).collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn decodes_content_deltas() {
        let frames = [
            "data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\n",
            "data: [DONE]\n\n",
        ];
        let decoded = decode(scan(sse_body(&frames)));
        tokio::pin!(decoded);
        let first = decoded.next().await.unwrap().unwrap();
        assert!(matches!(first, StreamChunk::Content { ref delta } if delta == "hi"));
        let second = decoded.next().await.unwrap().unwrap();
        assert!(matches!(second, StreamChunk::Done));
    }

    #[tokio::test]
    async fn accumulates_streamed_tool_call_and_emits_on_done() {
        let frames = [
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"c1\",\"function\":{\"name\":\"filesystem-read\",\"arguments\":\"\"}}]}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"path\\\":\\\"a.rs\\\"}\"}}]}}]}\n\n",
            "data: [DONE]\n\n",
        ];
        let decoded = decode(scan(sse_body(&frames)));
        tokio::pin!(decoded);
        let mut chunks = Vec::new();
        while let Some(c) = decoded.next().await {
            chunks.push(c.unwrap());
        }
        let tool_calls_chunk = chunks.iter().find(|c| matches!(c, StreamChunk::ToolCalls { .. }));
        match tool_calls_chunk {
            Some(StreamChunk::ToolCalls { calls }) => {
                assert_eq!(calls[0].id, "c1");
                assert_eq!(calls[0].name, "filesystem-read");
                assert_eq!(calls[0].arguments_json["path"], "a.rs");
            }
            _ => panic!("expected a ToolCalls chunk"),
        }
    }
}
