use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnowError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session not found: {id}")]
    SessionNotFound { id: String },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Tool not found: {name}")]
    ToolNotFound { name: String },

    #[error("Permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("Terminal error: {0}")]
    Terminal(String),

    #[error("Hook blocked with exit code {exit_code}: {reason}")]
    HookBlocked { exit_code: u8, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("User aborted")]
    Aborted,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SnowError {
    /// Short error code surfaced in WS error frames and tool-result prefixes.
    pub fn code(&self) -> &'static str {
        match self {
            SnowError::Config(_) => "CONFIG_ERROR",
            SnowError::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            SnowError::Provider(_) => "PROVIDER_ERROR",
            SnowError::ToolNotFound { .. } => "TOOL_NOT_FOUND",
            SnowError::PermissionDenied { .. } => "PERMISSION_DENIED",
            SnowError::Terminal(_) => "TERMINAL_ERROR",
            SnowError::HookBlocked { .. } => "HOOK_BLOCKED",
            SnowError::Serialization(_) => "SERIALIZATION_ERROR",
            SnowError::Io(_) => "IO_ERROR",
            SnowError::Timeout { .. } => "TIMEOUT",
            SnowError::Aborted => "ABORTED",
            SnowError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, SnowError>;
