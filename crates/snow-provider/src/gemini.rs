//! Google Gemini `generateContent` dialect (§4.1). No prior module in this
//! lineage covers this wire format directly — earlier agent runtimes only
//! reached Gemini through an OpenAI-compatible endpoint (`registry.rs`'s
//! `gemini` entry).
//! Shaped the same way as [`crate::anthropic`] and [`crate::chat_completions`]
//! so the three dialect modules read as siblings.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::StreamExt;

use snow_core::config::GeminiConfig;
use snow_core::types::{Role, ToolCall, UsageInfo};

use crate::dialect::{ChunkStream, LlmProvider};
use crate::error::ProviderError;
use crate::sse::{scan, ScanError, SseItem};
use crate::types::{ChatRequest, StreamChunk};

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    idle_timeout: Duration,
}

impl GeminiProvider {
    pub fn new(config: &GeminiConfig, idle_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            idle_timeout,
        }
    }

    fn build_body(&self, req: &ChatRequest) -> Value {
        let contents: Vec<Value> = req
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(message_to_gemini)
            .collect();

        let mut body = json!({
            "contents": contents,
            "systemInstruction": { "parts": [{ "text": req.system_prompt }] },
            "generationConfig": { "maxOutputTokens": req.max_tokens },
        });

        if !req.tools.is_empty() {
            let declarations: Vec<Value> = req
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    })
                })
                .collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
        }

        body
    }
}

fn message_to_gemini(m: &snow_core::types::Message) -> Value {
    let role = match m.role {
        Role::Assistant => "model",
        _ => "user",
    };

    if let Some(tool_call_id) = &m.tool_call_id {
        return json!({
            "role": "user",
            "parts": [{
                "functionResponse": {
                    "name": tool_call_id,
                    "response": { "content": m.content },
                }
            }],
        });
    }

    if let Some(calls) = &m.tool_calls {
        let mut parts = Vec::new();
        if !m.content.is_empty() {
            parts.push(json!({ "text": m.content }));
        }
        for call in calls {
            parts.push(json!({
                "functionCall": { "name": call.name, "args": call.arguments_json },
            }));
        }
        return json!({ "role": role, "parts": parts });
    }

    json!({ "role": role, "parts": [{ "text": m.content }] })
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn stream(&self, req: &ChatRequest) -> Result<ChunkStream, ProviderError> {
        let body = self.build_body(req);
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, req.model, self.api_key
        );

        let resp = self.client.post(&url).json(&body).send().await?;

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
        let mut call_index = 0usize;

        while let Some(item) = sse.next().await {
            let item = match item {
                Ok(i) => i,
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            };

            let data = match item {
                SseItem::Done => {
                    yield Ok(StreamChunk::Done);
                    return;
                }
                SseItem::Event(ev) => ev.data,
            };

            let parsed: Result<GenerateContentChunk, _> = serde_json::from_str(&data);
            let Ok(parsed) = parsed else { continue };

            if let Some(usage) = parsed.usage_metadata {
                yield Ok(StreamChunk::Usage {
                    usage: UsageInfo {
                        prompt_tokens: usage.prompt_token_count as u64,
                        completion_tokens: usage.candidates_token_count.unwrap_or(0) as u64,
                        total_tokens: usage.total_token_count.unwrap_or(0) as u64,
                        cached_tokens: usage.cached_content_token_count.map(|c| c as u64),
                        cache_creation_input_tokens: None,
                        cache_read_input_tokens: None,
                    },
                });
            }

            for candidate in parsed.candidates {
                let Some(content) = candidate.content else { continue };
                for part in content.parts {
                    if let Some(text) = part.text {
                        if part.thought.unwrap_or(false) {
                            yield Ok(StreamChunk::ReasoningDelta { delta: text });
                        } else {
                            yield Ok(StreamChunk::Content { delta: text });
                        }
                    }
                    if let Some(call) = part.function_call {
                        yield Ok(StreamChunk::ToolCalls {
                            calls: vec![ToolCall {
                                id: format!("gemini-call-{call_index}"),
                                name: call.name,
                                arguments_json: call.args,
                            }],
                        });
                        call_index += 1;
                    }
                }
            }
        }
    }
}

#[derive(Deserialize)]
struct GenerateContentChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default, rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
    #[serde(default)]
    thought: Option<bool>,
    #[serde(rename = "functionCall")]
    function_call: Option<FunctionCall>,
}

#[derive(Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: u32,
    #[serde(default, rename = "candidatesTokenCount")]
    candidates_token_count: Option<u32>,
    #[serde(default, rename = "totalTokenCount")]
    total_token_count: Option<u32>,
    #[serde(default, rename = "cachedContentTokenCount")]
    cached_content_token_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn sse_body(frames: &[&str]) -> impl futures_util::Stream<Item = reqwest::Result<Bytes>> {
        tokio_stream::iter(frames.iter().map(|f| Ok(Bytes::from(f.to_string()))).collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn decodes_text_part() {
        let frames = [
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"hi\"}]}}]}\n\n",
            "data: [DONE]\n\n",
        ];
        let decoded = decode(scan(sse_body(&frames)));
        tokio::pin!(decoded);
        let first = decoded.next().await.unwrap().unwrap();
        assert!(matches!(first, StreamChunk::Content { ref delta } if delta == "hi"));
    }

    #[tokio::test]
    async fn decodes_function_call() {
        let frames = [
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"functionCall\":{\"name\":\"filesystem-read\",\"args\":{\"path\":\"a.rs\"}}}]}}]}\n\n",
            "data: [DONE]\n\n",
        ];
        let decoded = decode(scan(sse_body(&frames)));
        tokio::pin!(decoded);
        let first = decoded.next().await.unwrap().unwrap();
        match first {
            StreamChunk::ToolCalls { calls } => {
                assert_eq!(calls[0].name, "filesystem-read");
                assert_eq!(calls[0].arguments_json["path"], "a.rs");
            }
            other => panic!("expected ToolCalls, got {other:?}"),
        }
    }
}
