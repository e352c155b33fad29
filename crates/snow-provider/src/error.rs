//! Error taxonomy for the Streaming Provider Client (§4.1, §7).

use thiserror::Error;

/// Every error a dialect client or the retry/idle wrappers can produce.
///
/// `is_retriable` is the single predicate the outer retry loop (§4.4
/// step 2) consults — it mirrors, in spirit, `SnowError::code()` in
/// `snow-core`, but lives here because only this crate knows which HTTP
/// statuses and SSE failure modes are transient.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("[API_ERROR] [RETRIABLE] provider returned {status}: {message}")]
    Http5xx { status: u16, message: String },

    /// Non-retriable 4xx (everything except 408/429, which are retriable).
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("[API_ERROR] [RETRIABLE] rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// A non-empty buffer remained when the byte stream closed without a
    /// clean terminator (`data: [DONE]` or dialect-equivalent).
    #[error(
        "[API_ERROR] [RETRIABLE] stream terminated unexpectedly with incomplete data \
         (dataCount={data_count}, lastEventType={last_event_type:?}, \
         bufferLength={buffer_len}, bufferPreview={buffer_preview:?})"
    )]
    IncompleteStream {
        data_count: usize,
        last_event_type: Option<String>,
        buffer_len: usize,
        buffer_preview: String,
    },

    #[error("[RETRIABLE] stream idle timeout: no business chunk for {secs}s")]
    IdleTimeout { secs: u64 },

    #[error("[RETRIABLE] EMPTY_RESPONSE: round closed with no content and no tool_calls")]
    EmptyResponse,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Classify per §4.1/§7: network errors, connect-reset family, 5xx,
    /// 408/429, EMPTY_RESPONSE, and `[RETRIABLE]`-tagged messages retry;
    /// everything else (parse errors, non-408/429 4xx, user cancellation)
    /// surfaces to the user and ends the turn.
    pub fn is_retriable(&self) -> bool {
        match self {
            ProviderError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            ProviderError::Http5xx { .. } => true,
            ProviderError::Api { status, .. } => *status == 408 || *status == 429,
            ProviderError::RateLimited { .. } => true,
            ProviderError::IncompleteStream { .. } => true,
            ProviderError::IdleTimeout { .. } => true,
            ProviderError::EmptyResponse => true,
            ProviderError::Unavailable(_) => true,
            ProviderError::Parse(_) => false,
            ProviderError::Cancelled => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
