//! OpenAI Responses API dialect (§4.1). Distinct from
//! [`crate::chat_completions`] in both request shape (`input` items instead
//! of `messages`, `instructions` instead of a system message) and its typed
//! `event:`-tagged SSE stream (`response.output_text.delta`,
//! `response.function_call_arguments.delta`, `response.completed`, ...)
//! rather than chat-completions' untyped delta objects.

use std::collections::HashMap;
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

pub struct ResponsesProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    idle_timeout: Duration,
}

impl ResponsesProvider {
    pub fn new(api_key: String, base_url: String, idle_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            idle_timeout,
        }
    }

    fn build_body(&self, req: &ChatRequest) -> Value {
        let input: Vec<Value> = req.messages.iter().flat_map(message_to_input_item).collect();

        let mut body = json!({
            "model": req.model,
            "instructions": req.system_prompt,
            "input": input,
            "max_output_tokens": req.max_tokens,
            "stream": true,
        });

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                        "strict": t.strict,
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }

        if req.thinking {
            body["reasoning"] = json!({ "effort": "medium", "summary": "auto" });
        }

        body
    }
}

fn message_to_input_item(m: &snow_core::types::Message) -> Vec<Value> {
    if let Some(tool_call_id) = &m.tool_call_id {
        return vec![json!({
            "type": "function_call_output",
            "call_id": tool_call_id,
            "output": m.content,
        })];
    }
    if let Some(calls) = &m.tool_calls {
        // Each call becomes its own sibling input item, mirroring how
        // `input` is a flat list of items rather than nested content.
        return calls
            .iter()
            .map(|c| {
                json!({
                    "type": "function_call",
                    "call_id": c.id,
                    "name": c.name,
                    "arguments": c.arguments_json.to_string(),
                })
            })
            .collect();
    }
    let role = match m.role {
        Role::Assistant => "assistant",
        Role::System => "system",
        Role::User | Role::Tool => "user",
    };
    vec![json!({ "role": role, "content": m.content })]
}

#[async_trait]
impl LlmProvider for ResponsesProvider {
    fn name(&self) -> &str {
        "openai-responses"
    }

    async fn stream(&self, req: &ChatRequest) -> Result<ChunkStream, ProviderError> {
        let body = self.build_body(req);

        let resp = self
            .client
            .post(format!("{}/v1/responses", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited { retry_after_ms: 1000 });
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
        let mut current_event = String::new();
        // call_id, keyed by output_index — Responses streams function-call
        // argument deltas addressed by index, not a running id.
        let mut call_ids: HashMap<u32, (String, String)> = HashMap::new();

        while let Some(item) = sse.next().await {
            let item = match item {
                Ok(i) => i,
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            };

            let SseItem::Event(ev) = item else {
                yield Ok(StreamChunk::Done);
                return;
            };
            if let Some(name) = ev.event {
                current_event = name;
            }
            let data = ev.data;

            match current_event.as_str() {
                "response.output_text.delta" => {
                    if let Ok(d) = serde_json::from_str::<TextDelta>(&data) {
                        yield Ok(StreamChunk::Content { delta: d.delta });
                    }
                }
                "response.reasoning_summary_text.delta" => {
                    if let Ok(d) = serde_json::from_str::<TextDelta>(&data) {
                        yield Ok(StreamChunk::ReasoningDelta { delta: d.delta });
                    }
                }
                "response.output_item.added" => {
                    if let Ok(added) = serde_json::from_str::<OutputItemAdded>(&data) {
                        if added.item.item_type.as_deref() == Some("function_call") {
                            let id = added.item.call_id.unwrap_or_default();
                            let name = added.item.name.unwrap_or_default();
                            call_ids.insert(added.output_index, (id, name));
                            yield Ok(StreamChunk::ReasoningStarted);
                        }
                    }
                }
                "response.function_call_arguments.delta" => {
                    if let Ok(d) = serde_json::from_str::<FunctionCallArgsDelta>(&data) {
                        let (id, name) = call_ids
                            .get(&d.output_index)
                            .cloned()
                            .unwrap_or_default();
                        yield Ok(StreamChunk::ToolCallDelta {
                            index: d.output_index as usize,
                            id: Some(id),
                            name: Some(name),
                            arguments_delta: d.delta,
                        });
                    }
                }
                "response.output_item.done" => {
                    if let Ok(done) = serde_json::from_str::<OutputItemDone>(&data) {
                        if done.item.item_type.as_deref() == Some("function_call") {
                            let id = done.item.call_id.unwrap_or_default();
                            let name = done.item.name.unwrap_or_default();
                            let arguments_json = done
                                .item
                                .arguments
                                .as_deref()
                                .and_then(|a| serde_json::from_str::<Value>(a).ok())
                                .unwrap_or_else(|| json!({}));
                            yield Ok(StreamChunk::ToolCalls {
                                calls: vec![ToolCall { id, name, arguments_json }],
                            });
                        }
                    }
                }
                "response.completed" => {
                    if let Ok(completed) = serde_json::from_str::<ResponseCompleted>(&data) {
                        if let Some(usage) = completed.response.usage {
                            yield Ok(StreamChunk::Usage {
                                usage: UsageInfo {
                                    prompt_tokens: usage.input_tokens as u64,
                                    completion_tokens: usage.output_tokens as u64,
                                    total_tokens: (usage.input_tokens + usage.output_tokens) as u64,
                                    cached_tokens: None,
                                    cache_creation_input_tokens: None,
                                    cache_read_input_tokens: None,
                                },
                            });
                        }
                    }
                    yield Ok(StreamChunk::Done);
                    return;
                }
                "error" | "response.failed" => {
                    yield Ok(StreamChunk::Error { message: data, retriable: true });
                    return;
                }
                _ => {}
            }
        }
    }
}

#[derive(Deserialize)]
struct TextDelta {
    delta: String,
}

#[derive(Deserialize)]
struct OutputItemAdded {
    output_index: u32,
    item: OutputItem,
}

#[derive(Deserialize)]
struct OutputItemDone {
    item: OutputItem,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    item_type: Option<String>,
    call_id: Option<String>,
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct FunctionCallArgsDelta {
    output_index: u32,
    delta: String,
}

#[derive(Deserialize)]
struct ResponseCompleted {
    response: ResponseBody,
}

#[derive(Deserialize)]
struct ResponseBody {
    usage: Option<ResponseUsage>,
}

#[derive(Deserialize)]
struct ResponseUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn sse_body(frames: &[&str]) -> impl futures_util::Stream<Item = reqwest::Result<Bytes>> {
        tokio_stream::iter(frames.iter().map(|f| Ok(Bytes::from(f.to_string()))).collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn decodes_output_text_delta_and_completion() {
        let frames = [
            "event: response.output_text.delta\ndata: {\"delta\":\"hi\"}\n\n",
            "event: response.completed\ndata: {\"response\":{\"usage\":{\"input_tokens\":5,\"output_tokens\":2}}}\n\n",
        ];
        let decoded = decode(scan(sse_body(&frames)));
        tokio::pin!(decoded);
        let first = decoded.next().await.unwrap().unwrap();
        assert!(matches!(first, StreamChunk::Content { ref delta } if delta == "hi"));
        let second = decoded.next().await.unwrap().unwrap();
        assert!(matches!(second, StreamChunk::Usage { .. }));
        let third = decoded.next().await.unwrap().unwrap();
        assert!(matches!(third, StreamChunk::Done));
    }

    #[tokio::test]
    async fn decodes_function_call_lifecycle() {
        let frames = [
            "event: response.output_item.added\ndata: {\"output_index\":0,\"item\":{\"type\":\"function_call\",\"call_id\":\"c1\",\"name\":\"filesystem-read\"}}\n\n",
            "event: response.function_call_arguments.delta\ndata: {\"output_index\":0,\"delta\":\"{\\\"path\\\":\\\"a\\\"}\"}\n\n",
            "event: response.output_item.done\ndata: {\"item\":{\"type\":\"function_call\",\"call_id\":\"c1\",\"name\":\"filesystem-read\",\"arguments\":\"{\\\"path\\\":\\\"a\\\"}\"}}\n\n",
        ];
        let decoded = decode(scan(sse_body(&frames)));
        tokio::pin!(decoded);
        let mut chunks = Vec::new();
        while let Some(c) = decoded.next().await {
            chunks.push(c.unwrap());
        }
        let tool_calls = chunks.iter().find(|c| matches!(c, StreamChunk::ToolCalls { .. }));
        match tool_calls {
            Some(StreamChunk::ToolCalls { calls }) => {
                assert_eq!(calls[0].id, "c1");
                assert_eq!(calls[0].arguments_json["path"], "a");
            }
            _ => panic!("expected ToolCalls"),
        }
    }
}
