//! Error taxonomy for the Context Compressor (§4.6).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompressError {
    #[error("session store error: {0}")]
    Session(#[from] snow_sessions::SessionError),

    #[error("provider error: {0}")]
    Provider(#[from] snow_provider::ProviderError),

    /// `beforeCompress` hard-blocked compaction (exit code >= 2, §4.6 step 3).
    #[error("beforeCompress hook blocked with exit code {exit_code}: {reason}")]
    HookBlocked { reason: String, exit_code: u8 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse summarization response: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, CompressError>;
