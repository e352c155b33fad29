//! Error taxonomy for the Conversation Orchestrator (§4.4, §7).
//!
//! Composes the per-crate errors the orchestrator's turn loop touches
//! (session store, provider, compressor, hooks) the same way
//! `snow-compress::CompressError` composes `SessionError`/`ProviderError` —
//! one variant per source, `#[from]` where the orchestrator never adds
//! context, explicit wrapping where it does.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("session store error: {0}")]
    Session(#[from] snow_sessions::SessionError),

    #[error("provider error: {0}")]
    Provider(#[from] snow_provider::ProviderError),

    #[error("compression error: {0}")]
    Compress(#[from] snow_compress::CompressError),

    #[error("hook blocked with exit code {exit_code}: {reason}")]
    HookBlocked { reason: String, exit_code: u8 },

    #[error("no provider configured for model routing key '{0}'")]
    NoProvider(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("turn aborted by user")]
    Aborted,

    #[error("internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    /// Short error code, same convention as `SnowError::code()` /
    /// `SessionError::code()` — surfaced in WS error frames.
    pub fn code(&self) -> &'static str {
        match self {
            OrchestratorError::Session(_) => "SESSION_ERROR",
            OrchestratorError::Provider(_) => "PROVIDER_ERROR",
            OrchestratorError::Compress(_) => "COMPRESS_ERROR",
            OrchestratorError::HookBlocked { .. } => "HOOK_BLOCKED",
            OrchestratorError::NoProvider(_) => "NO_PROVIDER",
            OrchestratorError::Io(_) => "IO_ERROR",
            OrchestratorError::Serialization(_) => "SERIALIZATION_ERROR",
            OrchestratorError::Aborted => "ABORTED",
            OrchestratorError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
