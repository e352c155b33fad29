//! The provider-agnostic streaming trait (§4.1 §3). Modeled directly
//! on a prior agent runtime's `LlmProvider` trait in `provider.rs`, generalized from
//! its `send`/`send_stream` pair to a single stream-returning method since
//! every dialect this crate talks to is always consumed as a stream.

use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;

use crate::error::ProviderError;
use crate::types::{ChatRequest, StreamChunk};

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ProviderError>> + Send>>;

/// One dialect implementation (chat-completions, responses, anthropic,
/// gemini). Each owns its own `reqwest::Client` and endpoint/auth details;
/// `snow-orchestrator` only ever talks to this trait.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Issue the request and return a stream of uniform chunks. The
    /// returned stream is already idle-guarded (`crate::idle::guard`) by
    /// the implementor — callers don't wrap it again.
    async fn stream(&self, req: &ChatRequest) -> Result<ChunkStream, ProviderError>;
}
