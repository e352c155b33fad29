use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {id}")]
    NotFound { id: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No snapshot manifest for session {id}")]
    NoManifest { id: String },

    #[error("Snapshot commit gave up after {attempts} attempts, {dropped} entries dropped")]
    CommitExhausted { attempts: u32, dropped: usize },
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::NotFound { .. } => "SESSION_NOT_FOUND",
            SessionError::Serialization(_) => "SERIALIZATION_ERROR",
            SessionError::Io(_) => "IO_ERROR",
            SessionError::NoManifest { .. } => "NO_MANIFEST",
            SessionError::CommitExhausted { .. } => "COMMIT_EXHAUSTED",
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
