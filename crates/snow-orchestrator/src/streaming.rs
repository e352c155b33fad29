//! Per-round stream accumulation (§4.4 step 4-5). Consumes a
//! provider's `ChunkStream` to completion, assembling the assistant
//! message's content, tool_calls (indexed by `StreamChunk::ToolCallDelta`'s
//! `index` field, per §4.1), and the reasoning/thinking/reasoning_content
//! blobs that must round-trip byte-identical (P9). Detects the empty-
//! response condition (§4.4 step 5) that the outer retry loop in
//! `snow-provider::retry` treats as retriable.

use futures_util::StreamExt;

use snow_core::types::{Message, ToolCall, UsageInfo};
use snow_provider::{ChunkStream, ProviderError, StreamChunk};

/// Forwarded once per chunk so the UI layer can render streaming content
/// and a 10Hz-throttled token counter (§4.4 step 4) — throttling itself is
/// the UI's concern, not this accumulator's; it sees every chunk.
pub trait RoundObserver: Send + Sync {
    fn on_chunk(&self, chunk: &StreamChunk);

    /// One `onRetry` notification per retriable round failure (§4.1, §3).
    /// Default no-op — most observers only care about chunk content.
    fn on_retry(&self, _status: &snow_provider::RetryStatus) {}
}

/// An observer that does nothing — the default for contexts (tests,
/// sub-agent runs with no UI) that don't need streaming feedback.
pub struct NullObserver;
impl RoundObserver for NullObserver {
    fn on_chunk(&self, _chunk: &StreamChunk) {}
}

#[derive(Default)]
struct PartialToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// What one round produced.
pub struct RoundResult {
    pub message: Message,
    pub usage: UsageInfo,
}

/// Drains `stream` to completion, building the assistant message for this
/// round. Returns `ProviderError::EmptyResponse` if the round closed with
/// neither content nor tool_calls (§4.4 step 5) — the caller's outer retry
/// loop treats that as retriable.
pub async fn accumulate(
    mut stream: ChunkStream,
    observer: &dyn RoundObserver,
) -> Result<RoundResult, ProviderError> {
    let mut content = String::new();
    let mut thinking = String::new();
    let mut reasoning_text = String::new();
    let mut reasoning_content = None;
    let mut tool_calls: Vec<PartialToolCall> = Vec::new();
    let mut finished_tool_calls: Option<Vec<ToolCall>> = None;
    let mut usage = UsageInfo::default();

    while let Some(item) = stream.next().await {
        let chunk = item?;
        observer.on_chunk(&chunk);

        match chunk {
            StreamChunk::Content { delta } => content.push_str(&delta),
            StreamChunk::Thinking { delta } => thinking.push_str(&delta),
            StreamChunk::ReasoningStarted => {}
            StreamChunk::ReasoningDelta { delta } => reasoning_text.push_str(&delta),
            StreamChunk::ReasoningData { data } => reasoning_content = Some(data),
            StreamChunk::ToolCallDelta { index, id, name, arguments_delta } => {
                if tool_calls.len() <= index {
                    tool_calls.resize_with(index + 1, PartialToolCall::default);
                }
                let entry = &mut tool_calls[index];
                if let Some(id) = id {
                    entry.id = Some(id);
                }
                if let Some(name) = name {
                    entry.name = Some(name);
                }
                entry.arguments.push_str(&arguments_delta);
            }
            StreamChunk::ToolCalls { calls } => finished_tool_calls = Some(calls),
            StreamChunk::Usage { usage: round_usage } => usage.accumulate(&round_usage),
            // §9 open question: `finish_reason` (absorbed into dialect decoders
            // before this layer) is never terminal on its own — only `Done` or
            // stream EOF ends a round, so usage arriving after it still folds in.
            StreamChunk::Done => break,
            StreamChunk::Error { message, retriable } => {
                return Err(if retriable {
                    ProviderError::Unavailable(message)
                } else {
                    ProviderError::Parse(message)
                });
            }
        }
    }

    let calls = finished_tool_calls.unwrap_or_else(|| {
        tool_calls
            .into_iter()
            .filter_map(|p| {
                let id = p.id?;
                let name = p.name?;
                let arguments_json = serde_json::from_str(&p.arguments).unwrap_or(serde_json::json!({}));
                Some(ToolCall { id, name, arguments_json })
            })
            .collect()
    });

    if content.is_empty() && calls.is_empty() && thinking.is_empty() {
        return Err(ProviderError::EmptyResponse);
    }

    let mut message = Message::assistant(content).with_reasoning(
        if reasoning_text.is_empty() { None } else { Some(serde_json::Value::String(reasoning_text)) },
        if thinking.is_empty() { None } else { Some(serde_json::Value::String(thinking)) },
        reasoning_content,
    );
    if !calls.is_empty() {
        message = message.with_tool_calls(calls);
    }

    Ok(RoundResult { message, usage })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;

    fn chunk_stream(chunks: Vec<Result<StreamChunk, ProviderError>>) -> ChunkStream {
        Box::pin(futures_util::stream::iter(chunks)) as Pin<Box<dyn futures_util::Stream<Item = _> + Send>>
    }

    #[tokio::test]
    async fn accumulates_content_only_round() {
        let stream = chunk_stream(vec![
            Ok(StreamChunk::Content { delta: "Hello, ".into() }),
            Ok(StreamChunk::Content { delta: "world".into() }),
            Ok(StreamChunk::Usage { usage: UsageInfo { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15, ..Default::default() } }),
            Ok(StreamChunk::Done),
        ]);

        let result = accumulate(stream, &NullObserver).await.unwrap();
        assert_eq!(result.message.content, "Hello, world");
        assert!(result.message.tool_calls.is_none());
        assert_eq!(result.usage.total_tokens, 15);
    }

    #[tokio::test]
    async fn accumulates_tool_call_deltas_by_index() {
        let stream = chunk_stream(vec![
            Ok(StreamChunk::ToolCallDelta { index: 0, id: Some("c1".into()), name: Some("filesystem-glob".into()), arguments_delta: "{\"pat".into() }),
            Ok(StreamChunk::ToolCallDelta { index: 0, id: None, name: None, arguments_delta: "tern\":\"*\"}".into() }),
            Ok(StreamChunk::Done),
        ]);

        let result = accumulate(stream, &NullObserver).await.unwrap();
        let calls = result.message.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "filesystem-glob");
        assert_eq!(calls[0].arguments_json["pattern"], "*");
    }

    #[tokio::test]
    async fn prefers_explicit_tool_calls_chunk_over_deltas() {
        let explicit = vec![ToolCall { id: "x".into(), name: "code-search".into(), arguments_json: serde_json::json!({}) }];
        let stream = chunk_stream(vec![
            Ok(StreamChunk::ToolCallDelta { index: 0, id: Some("ignored".into()), name: Some("ignored".into()), arguments_delta: "{}".into() }),
            Ok(StreamChunk::ToolCalls { calls: explicit.clone() }),
            Ok(StreamChunk::Done),
        ]);

        let result = accumulate(stream, &NullObserver).await.unwrap();
        let calls = result.message.tool_calls.unwrap();
        assert_eq!(calls[0].id, "x");
    }

    #[tokio::test]
    async fn empty_round_is_empty_response_error() {
        let stream = chunk_stream(vec![Ok(StreamChunk::Done)]);
        let err = accumulate(stream, &NullObserver).await.unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse));
    }

    #[tokio::test]
    async fn usage_arriving_after_done_is_never_observed_done_is_terminal() {
        // Done always ends the round (§9 open question) — a usage chunk
        // trailing it in the raw transport is the dialect decoder's problem,
        // not this accumulator's; it simply never sees a post-Done chunk.
        let stream = chunk_stream(vec![
            Ok(StreamChunk::Content { delta: "hi".into() }),
            Ok(StreamChunk::Done),
        ]);
        let result = accumulate(stream, &NullObserver).await.unwrap();
        assert_eq!(result.usage.total_tokens, 0);
    }
}
