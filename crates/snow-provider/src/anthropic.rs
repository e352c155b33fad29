//! Anthropic Messages API dialect (§4.1). SSE decoding is modeled
//! directly on a prior agent runtime's `anthropic_stream.rs`; the block-type tracking
//! (`current_block_type`/tool-use accumulation) carries over almost
//! unchanged, generalized to emit the crate's own [`StreamChunk`] instead
//! of a prior agent runtime's `StreamEvent`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::StreamExt;

use snow_core::config::AnthropicConfig;
use snow_core::types::{Role, ToolCall};

use crate::dialect::{ChunkStream, LlmProvider};
use crate::error::ProviderError;
use crate::sse::{scan, ScanError, SseItem};
use crate::types::{ChatRequest, StreamChunk};

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    idle_timeout: Duration,
}

impl AnthropicProvider {
    pub fn new(config: &AnthropicConfig, idle_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            idle_timeout,
        }
    }

    fn build_body(&self, req: &ChatRequest) -> Value {
        let messages: Vec<Value> = req
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(message_to_anthropic)
            .collect();

        let mut body = json!({
            "model": req.model,
            "system": req.system_prompt,
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
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.input_schema,
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }

        if req.thinking {
            body["thinking"] = json!({ "type": "enabled", "budget_tokens": 10_000 });
        }

        body
    }
}

fn message_to_anthropic(m: &snow_core::types::Message) -> Value {
    let role = match m.role {
        Role::Assistant => "assistant",
        _ => "user",
    };

    if let Some(tool_call_id) = &m.tool_call_id {
        return json!({
            "role": "user",
            "content": [{
                "type": "tool_result",
                "tool_use_id": tool_call_id,
                "content": m.content,
            }],
        });
    }

    if let Some(calls) = &m.tool_calls {
        let mut content = Vec::new();
        if !m.content.is_empty() {
            content.push(json!({ "type": "text", "text": m.content }));
        }
        for call in calls {
            content.push(json!({
                "type": "tool_use",
                "id": call.id,
                "name": call.name,
                "input": call.arguments_json,
            }));
        }
        return json!({ "role": role, "content": content });
    }

    json!({ "role": role, "content": m.content })
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn stream(&self, req: &ChatRequest) -> Result<ChunkStream, ProviderError> {
        let body = self.build_body(req);

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
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
        let mut current_block_type = String::new();
        let mut tool_id = String::new();
        let mut tool_name = String::new();
        let mut tool_json = String::new();
        let mut usage = snow_core::types::UsageInfo::default();

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

            if let Some(event_name) = ev.event {
                current_event = event_name;
            }
            let data = ev.data;

            match current_event.as_str() {
                "message_start" => {
                    if let Ok(start) = serde_json::from_str::<MessageStart>(&data) {
                        usage.prompt_tokens = start.message.usage.input_tokens as u64;
                        if let Some(c) = start.message.usage.cache_creation_input_tokens {
                            usage.cache_creation_input_tokens = Some(c as u64);
                        }
                        if let Some(c) = start.message.usage.cache_read_input_tokens {
                            usage.cache_read_input_tokens = Some(c as u64);
                        }
                    }
                }
                "content_block_start" => {
                    if let Ok(block) = serde_json::from_str::<ContentBlockStart>(&data) {
                        current_block_type = block.content_block.block_type.clone();
                        if current_block_type == "tool_use" {
                            tool_id = block.content_block.id.unwrap_or_default();
                            tool_name = block.content_block.name.unwrap_or_default();
                            tool_json.clear();
                        }
                        if current_block_type == "thinking" {
                            yield Ok(StreamChunk::ReasoningStarted);
                        }
                    }
                }
                "content_block_delta" => {
                    if let Ok(delta) = serde_json::from_str::<ContentBlockDelta>(&data) {
                        match delta.delta.delta_type.as_str() {
                            "text_delta" => {
                                if let Some(text) = delta.delta.text {
                                    yield Ok(StreamChunk::Content { delta: text });
                                }
                            }
                            "thinking_delta" => {
                                if let Some(text) = delta.delta.thinking {
                                    yield Ok(StreamChunk::Thinking { delta: text });
                                }
                            }
                            "signature_delta" => {
                                if let Some(sig) = delta.delta.signature {
                                    yield Ok(StreamChunk::ReasoningData { data: json!({ "signature": sig }) });
                                }
                            }
                            "input_json_delta" => {
                                if let Some(partial) = delta.delta.partial_json {
                                    tool_json.push_str(&partial);
                                }
                            }
                            _ => {}
                        }
                    }
                }
                "content_block_stop" => {
                    if current_block_type == "tool_use" {
                        let input = serde_json::from_str::<Value>(&tool_json)
                            .unwrap_or_else(|_| json!({}));
                        yield Ok(StreamChunk::ToolCalls {
                            calls: vec![ToolCall {
                                id: std::mem::take(&mut tool_id),
                                name: std::mem::take(&mut tool_name),
                                arguments_json: input,
                            }],
                        });
                        tool_json.clear();
                    }
                    current_block_type.clear();
                }
                "message_delta" => {
                    if let Ok(delta) = serde_json::from_str::<MessageDelta>(&data) {
                        usage.completion_tokens = delta.usage.output_tokens as u64;
                        usage.total_tokens = usage.prompt_tokens + usage.completion_tokens;
                    }
                }
                "message_stop" => {
                    yield Ok(StreamChunk::Usage { usage });
                    yield Ok(StreamChunk::Done);
                    return;
                }
                "error" => {
                    let retriable = data.contains("overloaded") || data.contains("rate_limit");
                    yield Ok(StreamChunk::Error { message: data, retriable });
                    return;
                }
                _ => {}
            }
        }
    }
}

#[derive(Deserialize)]
struct MessageStart {
    message: MessageStartInner,
}

#[derive(Deserialize)]
struct MessageStartInner {
    usage: InputUsage,
}

#[derive(Deserialize)]
struct InputUsage {
    input_tokens: u32,
    #[serde(default)]
    cache_creation_input_tokens: Option<u32>,
    #[serde(default)]
    cache_read_input_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ContentBlockStart {
    content_block: ContentBlockMeta,
}

#[derive(Deserialize)]
struct ContentBlockMeta {
    #[serde(rename = "type")]
    block_type: String,
    id: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct ContentBlockDelta {
    delta: DeltaContent,
}

#[derive(Deserialize)]
struct DeltaContent {
    #[serde(rename = "type")]
    delta_type: String,
    text: Option<String>,
    thinking: Option<String>,
    signature: Option<String>,
    partial_json: Option<String>,
}

#[derive(Deserialize)]
struct MessageDelta {
    usage: OutputUsage,
}

#[derive(Deserialize)]
struct OutputUsage {
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
    async fn decodes_text_delta_and_done() {
        let frames = [
            "event: message_start\ndata: {\"message\":{\"usage\":{\"input_tokens\":10}}}\n\n",
            "event: content_block_start\ndata: {\"content_block\":{\"type\":\"text\"}}\n\n",
            "event: content_block_delta\ndata: {\"delta\":{\"type\":\"text_delta\",\"text\":\"hi\"}}\n\n",
            "event: content_block_stop\ndata: {}\n\n",
            "event: message_delta\ndata: {\"delta\":{},\"usage\":{\"output_tokens\":3}}\n\n",
            "event: message_stop\ndata: {}\n\n",
        ];
        let decoded = decode(scan(sse_body(&frames)));
        tokio::pin!(decoded);
        let mut chunks = Vec::new();
        while let Some(c) = decoded.next().await {
            chunks.push(c.unwrap());
        }
        assert!(matches!(&chunks[0], StreamChunk::Content { delta } if delta == "hi"));
        assert!(matches!(chunks[1], StreamChunk::Usage { .. }));
        assert!(matches!(chunks[2], StreamChunk::Done));
    }

    #[tokio::test]
    async fn decodes_tool_use_block() {
        let frames = [
            "event: content_block_start\ndata: {\"content_block\":{\"type\":\"tool_use\",\"id\":\"t1\",\"name\":\"filesystem-read\"}}\n\n",
            "event: content_block_delta\ndata: {\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{\\\"path\\\":\\\"a.rs\\\"}\"}}\n\n",
            "event: content_block_stop\ndata: {}\n\n",
            "event: message_stop\ndata: {}\n\n",
        ];
        let decoded = decode(scan(sse_body(&frames)));
        tokio::pin!(decoded);
        let first = decoded.next().await.unwrap().unwrap();
        match first {
            StreamChunk::ToolCalls { calls } => {
                assert_eq!(calls[0].id, "t1");
                assert_eq!(calls[0].name, "filesystem-read");
                assert_eq!(calls[0].arguments_json["path"], "a.rs");
            }
            other => panic!("expected ToolCalls, got {other:?}"),
        }
    }
}
