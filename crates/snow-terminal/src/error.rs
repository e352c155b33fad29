//! Error types for the snow-terminal crate.

use thiserror::Error;

/// All errors that can originate from terminal operations.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// PTY allocation or child-process spawn failed.
    #[error("PTY spawn error: {0}")]
    PtySpawn(String),

    /// The requested session ID does not exist in the manager.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Underlying I/O failure (read, write, flush).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Operation exceeded its time budget.
    #[error("ETIMEDOUT: operation timed out after {ms}ms")]
    Timeout { ms: u64, stdout: String, stderr: String },

    /// Command was rejected by the safety checker before spawning.
    #[error("Command blocked: {reason}")]
    CommandBlocked { reason: String },

    /// Command would kill this process's own pid/pgid.
    #[error("Self-destructive command blocked: {reason}")]
    SelfDestructive { reason: String },

    /// The requested background job ID does not exist.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// SSH passthrough could not resolve a stored config for the host.
    #[error("No SSH config found for host: {0}")]
    SshConfigNotFound(String),

    /// The command was aborted by the caller's cancellation signal.
    #[error("Command aborted by user")]
    Aborted,
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, TerminalError>;
