//! Idle-timeout guard for an in-flight stream (§4.1 "Idle timeout").
//!
//! The clock resets only on a "business" chunk (`StreamChunk::is_business`)
//! — keep-alive comments never reach this layer at all, and the terminal
//! `Usage`/`Done`/`Error` events don't need to keep a clock running that is
//! about to stop anyway. Modeled on a prior agent runtime's `router.rs` retry-wrapper
//! shape, but wrapping a stream instead of a single future.

use std::time::Duration;

use futures_util::Stream;
use tokio_stream::StreamExt;

use crate::error::ProviderError;
use crate::types::StreamChunk;

/// Wrap `inner` so that if no business chunk arrives within `timeout`, the
/// stream yields one `Err(ProviderError::IdleTimeout)` item and ends.
pub fn guard<S>(inner: S, timeout: Duration) -> impl Stream<Item = Result<StreamChunk, ProviderError>>
where
    S: Stream<Item = Result<StreamChunk, ProviderError>> + Send + 'static,
{
    async_stream::stream! {
        tokio::pin!(inner);
        loop {
            match tokio::time::timeout(timeout, inner.next()).await {
                Ok(Some(item)) => yield item,
                Ok(None) => return,
                Err(_elapsed) => {
                    yield Err(ProviderError::IdleTimeout { secs: timeout.as_secs() });
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt as _;

    #[tokio::test]
    async fn passes_through_business_chunks_before_timeout() {
        let s = tokio_stream::iter(vec![
            Ok(StreamChunk::Content { delta: "a".into() }),
            Ok(StreamChunk::Done),
        ]);
        let guarded = guard(s, Duration::from_secs(5));
        tokio::pin!(guarded);
        let items: Vec<_> = guarded.collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Ok(StreamChunk::Done)));
    }

    #[tokio::test]
    async fn times_out_when_inner_stalls() {
        let s = async_stream::stream! {
            tokio::time::sleep(Duration::from_millis(50)).await;
            yield Ok(StreamChunk::Done);
        };
        let guarded = guard(s, Duration::from_millis(10));
        tokio::pin!(guarded);
        let first = guarded.next().await.unwrap();
        assert!(matches!(first, Err(ProviderError::IdleTimeout { .. })));
        assert!(guarded.next().await.is_none());
    }
}
