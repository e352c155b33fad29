//! Dialect-independent Server-Sent Events line scanner (§4.1 §3).
//!
//! Every dialect decoder is built on top of this: it turns a raw byte
//! stream into `(event, data)` pairs, leaving payload interpretation to the
//! caller. Modeled on a prior agent runtime's `stream.rs` line scanner, generalized
//! to run as a standalone async generator rather than a per-call parser.

use bytes::Bytes;
use futures_util::Stream;
use tokio_stream::StreamExt;

/// One decoded SSE frame. `event` is `None` when the server omitted an
/// `event:` line (most chat-completions-style servers always do).
#[derive(Debug, Clone)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Sentinel yielded once the scanner sees `data: [DONE]` — the clean
/// termination marker shared by chat-completions and Anthropic dialects.
#[derive(Debug, Clone)]
pub enum SseItem {
    Event(SseEvent),
    Done,
}

/// Everything that can go wrong scanning a byte stream into SSE frames.
#[derive(Debug, Clone)]
pub enum ScanError {
    /// The underlying byte stream (the HTTP body) errored.
    Io(String),
    /// The stream closed with an unterminated frame still buffered — no
    /// `data: [DONE]`/equivalent and no trailing blank line ever arrived.
    /// §4.1: "A non-empty buffer at EOF is a retriable error."
    Incomplete { data_count: usize, last_event_type: Option<String>, buffer_len: usize, buffer_preview: String },
}

impl From<ScanError> for crate::error::ProviderError {
    fn from(e: ScanError) -> Self {
        match e {
            ScanError::Io(msg) => crate::error::ProviderError::Parse(msg),
            ScanError::Incomplete { data_count, last_event_type, buffer_len, buffer_preview } => {
                crate::error::ProviderError::IncompleteStream { data_count, last_event_type, buffer_len, buffer_preview }
            }
        }
    }
}

/// Scan a byte stream into SSE frames, buffering partial lines across
/// chunk boundaries. Comment lines (`:` prefix) and blank lines separating
/// frames are consumed silently; a frame is only ever flushed when both an
/// accumulated `data:` field and a line boundary are seen, matching the SSE
/// spec's "dispatch on blank line" rule closely enough for every dialect
/// this crate talks to (none of them use multi-line multi-field frames).
pub fn scan<S>(byte_stream: S) -> impl Stream<Item = Result<SseItem, ScanError>> + Send + 'static
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    async_stream::stream! {
        tokio::pin!(byte_stream);
        let mut buf = String::new();
        let mut pending_event: Option<String> = None;
        let mut pending_data: Vec<String> = Vec::new();
        let mut data_count = 0usize;
        let mut last_event_type: Option<String> = None;

        while let Some(chunk) = byte_stream.next().await {
            let chunk = match chunk {
                Ok(b) => b,
                Err(e) => {
                    yield Err(ScanError::Io(e.to_string()));
                    return;
                }
            };
            buf.push_str(&String::from_utf8_lossy(&chunk));

            loop {
                let Some(nl) = buf.find('\n') else { break };
                let raw_line = buf[..nl].to_string();
                buf.drain(..=nl);
                let line = raw_line.strip_suffix('\r').unwrap_or(&raw_line);

                if line.is_empty() {
                    if pending_data.is_empty() && pending_event.is_none() {
                        continue;
                    }
                    let data = pending_data.join("\n");
                    let event = pending_event.take();
                    pending_data.clear();
                    data_count += 1;
                    if event.is_some() {
                        last_event_type = event.clone();
                    }
                    if data == "[DONE]" {
                        yield Ok(SseItem::Done);
                    } else {
                        yield Ok(SseItem::Event(SseEvent { event, data }));
                    }
                    continue;
                }
                if line.starts_with(':') {
                    continue;
                }
                if let Some(rest) = line.strip_prefix("event:") {
                    pending_event = Some(rest.trim_start().to_string());
                } else if let Some(rest) = line.strip_prefix("data:") {
                    pending_data.push(rest.trim_start().to_string());
                }
            }
        }

        // EOF. Anything still buffered (an unterminated `data:`/`event:`
        // frame, or stray partial text with no trailing newline) means the
        // connection dropped mid-frame rather than closing cleanly.
        let leftover_len = buf.len() + pending_data.iter().map(|s| s.len() + 1).sum::<usize>();
        if !pending_data.is_empty() || !buf.is_empty() {
            let mut preview = pending_data.join("\n");
            if !buf.is_empty() {
                if !preview.is_empty() {
                    preview.push('\n');
                }
                preview.push_str(&buf);
            }
            preview.truncate(200);
            yield Err(ScanError::Incomplete {
                data_count,
                last_event_type,
                buffer_len: leftover_len,
                buffer_preview: preview,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt as _;

    fn byte_stream(chunks: Vec<&'static str>) -> impl Stream<Item = reqwest::Result<Bytes>> {
        tokio_stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))))
    }

    #[tokio::test]
    async fn scans_basic_data_lines() {
        let s = scan(byte_stream(vec!["data: {\"a\":1}\n\n", "data: [DONE]\n\n"]));
        tokio::pin!(s);
        let first = s.next().await.unwrap().unwrap();
        match first {
            SseItem::Event(e) => assert_eq!(e.data, "{\"a\":1}"),
            SseItem::Done => panic!("expected event"),
        }
        let second = s.next().await.unwrap().unwrap();
        assert!(matches!(second, SseItem::Done));
    }

    #[tokio::test]
    async fn skips_comments_and_honors_event_field() {
        let s = scan(byte_stream(vec![
            ": keep-alive\nevent: content_block_delta\ndata: {\"x\":2}\n\n",
        ]));
        tokio::pin!(s);
        let item = s.next().await.unwrap().unwrap();
        match item {
            SseItem::Event(e) => {
                assert_eq!(e.event.as_deref(), Some("content_block_delta"));
                assert_eq!(e.data, "{\"x\":2}");
            }
            SseItem::Done => panic!("expected event"),
        }
    }

    #[tokio::test]
    async fn frame_split_across_chunk_boundary() {
        let s = scan(byte_stream(vec!["data: {\"par", "tial\":true}\n\n"]));
        tokio::pin!(s);
        let item = s.next().await.unwrap().unwrap();
        match item {
            SseItem::Event(e) => assert_eq!(e.data, "{\"partial\":true}"),
            SseItem::Done => panic!("expected event"),
        }
    }
}
