//! Outer retry loop for a whole streaming round (§4.1 §7, §4.4 step 2).
//!
//! Unlike a prior agent runtime's `ProviderRouter` (which retries a single request and
//! fails over across providers with a growing backoff), this wraps an
//! entire round — request plus full stream consumption — and never replays
//! a partial stream: on failure the whole round is reissued from scratch.
//! Fixed 5s delay, capped at 10 attempts, matching the documented behavior precisely
//! (a prior agent runtime's provider-level retry stays in `dialect` modules for
//! transport-level hiccups; this loop is the session-level safety net).

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::warn;

use snow_core::config::{OUTER_RETRY_DELAY_SECS, OUTER_RETRY_MAX_ATTEMPTS};

use crate::error::ProviderError;

pub const MAX_ATTEMPTS: u32 = OUTER_RETRY_MAX_ATTEMPTS;
pub const RETRY_DELAY: Duration = Duration::from_secs(OUTER_RETRY_DELAY_SECS);

/// One `onRetry(error, attempt, nextDelayMs)` notification (§4.1, §3) —
/// sent each time a round fails retriably and before the fixed delay, so
/// the UI/WS layer can render a "retrying (attempt N/MAX)..." banner.
#[derive(Debug, Clone)]
pub struct RetryStatus {
    pub error: String,
    pub attempt: u32,
    pub max_attempts: u32,
    pub next_delay_ms: u64,
}

/// Run `make_attempt` up to [`MAX_ATTEMPTS`] times, sleeping [`RETRY_DELAY`]
/// between attempts, stopping as soon as an attempt succeeds or returns a
/// non-retriable error. `retry_sink`, when supplied, receives one
/// [`RetryStatus`] per retriable failure — the caller decides what to do
/// with it (forward to a `RoundObserver`, drop it in tests, ...).
pub async fn with_retry<T, F, Fut>(
    retry_sink: Option<&mpsc::UnboundedSender<RetryStatus>>,
    mut make_attempt: F,
) -> Result<T, ProviderError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut last_err = ProviderError::Unavailable("no attempts made".to_string());

    for attempt in 1..=MAX_ATTEMPTS {
        match make_attempt(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retriable() && attempt < MAX_ATTEMPTS => {
                warn!(attempt, max = MAX_ATTEMPTS, err = %e, "round failed, retrying");
                if let Some(sink) = retry_sink {
                    let _ = sink.send(RetryStatus {
                        error: e.to_string(),
                        attempt,
                        max_attempts: MAX_ATTEMPTS,
                        next_delay_ms: RETRY_DELAY.as_millis() as u64,
                    });
                }
                last_err = e;
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let calls = AtomicU32::new(0);
        let result = with_retry(None, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ProviderError>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stops_immediately_on_non_retriable_error() {
        let calls = AtomicU32::new(0);
        let result = with_retry(None, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(ProviderError::Parse("bad json".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_retriable_error_up_to_cap() {
        let calls = AtomicU32::new(0);
        let result = with_retry(None, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(ProviderError::EmptyResponse) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn sends_one_retry_status_per_retriable_failure() {
        let calls = AtomicU32::new(0);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = with_retry(Some(&tx), |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(ProviderError::EmptyResponse) }
        })
        .await;
        assert!(result.is_err());
        drop(tx);

        let mut statuses = Vec::new();
        while let Some(status) = rx.recv().await {
            statuses.push(status);
        }
        assert_eq!(statuses.len(), (MAX_ATTEMPTS - 1) as usize);
        assert_eq!(statuses[0].attempt, 1);
        assert_eq!(statuses[0].max_attempts, MAX_ATTEMPTS);
        assert_eq!(statuses[0].next_delay_ms, RETRY_DELAY.as_millis() as u64);
    }
}
