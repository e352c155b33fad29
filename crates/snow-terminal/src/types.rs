//! Shared data types for snow-terminal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ExecMode
// ---------------------------------------------------------------------------

/// Selects how a command or shell interaction is executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ExecMode {
    /// Fire-and-forget: spawn, capture stdout/stderr, return.
    OneShot,
    /// Persistent PTY session with full interactive I/O.
    Interactive,
    /// Long-running background process.
    Background,
}

// ---------------------------------------------------------------------------
// SessionId / JobId
// ---------------------------------------------------------------------------

/// Opaque identifier for a PTY session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}
impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque identifier for a background job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}
impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ExecResult / ExecOptions (§4.7, §6)
// ---------------------------------------------------------------------------

/// Result of a terminal command (§4.7 contract): `{stdout, stderr, exitCode,
/// command, executedAt}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub command: String,
    pub executed_at: chrono::DateTime<chrono::Utc>,
}

/// Configuration knobs for command execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecOptions {
    /// Timeout in seconds. Clamped to [1, 300] (§5: default 30s, up to 300s).
    pub timeout_secs: u64,
    /// Maximum characters in stdout/stderr before middle-omission truncation.
    pub max_output_chars: usize,
    /// When true, the safety checker is bypassed entirely.
    pub skip_safety: bool,
    /// Caller has told us this command is expected to prompt interactively
    /// (e.g. an explicit `sudo` or `ssh` invocation) — forces the interactive
    /// watcher on regardless of pattern match (§4.7).
    pub is_interactive: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_output_chars: 30_000,
            skip_safety: false,
            is_interactive: false,
        }
    }
}

impl ExecOptions {
    pub(crate) fn effective_timeout_secs(&self) -> u64 {
        self.timeout_secs.clamp(1, 300)
    }
}

// ---------------------------------------------------------------------------
// Output streaming (§4.7 "output batching")
// ---------------------------------------------------------------------------

/// One batched chunk of live output forwarded to the UI while a command runs.
///
/// The executor buffers up to 15 lines or 80ms of silence before flushing a
/// single `OutputChunk` — see `manager::exec_streaming`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputChunk {
    pub stream: OutputStream,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Raised by the interactive-input watcher when the child's tail output
/// looks like it is blocking on a prompt (§4.7).
#[derive(Debug, Clone)]
pub struct InteractivePrompt {
    pub tail: String,
}

// ---------------------------------------------------------------------------
// JobStatus / BackgroundJob
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    TimedOut,
    /// Moved to background via the "move to background" (Ctrl+B) path — the
    /// caller stopped waiting, but the process manager still owns the child.
    Backgrounded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundJob {
    pub id: JobId,
    pub command: String,
    pub started_at: u64,
    pub status: JobStatus,
    pub result: Option<ExecResult>,
}

impl BackgroundJob {
    pub(crate) fn new(id: JobId, command: impl Into<String>) -> Self {
        let started_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self {
            id,
            command: command.into(),
            started_at,
            status: JobStatus::Running,
            result: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionInfo
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub shell: String,
    pub cwd: String,
    pub created_at: u64,
    pub is_alive: bool,
}

// ---------------------------------------------------------------------------
// Working directory target (§4.7 SSH passthrough)
// ---------------------------------------------------------------------------

/// A `cwd` is either a local path or `ssh://user@host:port/path` (§4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecTarget {
    Local { cwd: String },
    Ssh { user: String, host: String, port: u16, path: String },
}

impl ExecTarget {
    pub fn parse(cwd: &str) -> Self {
        match cwd.strip_prefix("ssh://") {
            None => Self::Local { cwd: cwd.to_string() },
            Some(rest) => {
                // user@host:port/path — port and path are optional.
                let (auth_host, path) = rest.split_once('/').unwrap_or((rest, ""));
                let (user, host_port) = auth_host.split_once('@').unwrap_or(("", auth_host));
                let (host, port) = host_port
                    .split_once(':')
                    .map(|(h, p)| (h, p.parse().unwrap_or(22)))
                    .unwrap_or((host_port, 22));
                Self::Ssh {
                    user: user.to_string(),
                    host: host.to_string(),
                    port,
                    path: format!("/{path}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_local_cwd() {
        assert_eq!(
            ExecTarget::parse("/home/user/project"),
            ExecTarget::Local { cwd: "/home/user/project".to_string() }
        );
    }

    #[test]
    fn parses_ssh_target_with_port() {
        let t = ExecTarget::parse("ssh://deploy@build.example.com:2222/srv/app");
        assert_eq!(
            t,
            ExecTarget::Ssh {
                user: "deploy".to_string(),
                host: "build.example.com".to_string(),
                port: 2222,
                path: "/srv/app".to_string(),
            }
        );
    }

    #[test]
    fn parses_ssh_target_default_port() {
        let t = ExecTarget::parse("ssh://user@host/path");
        assert_eq!(
            t,
            ExecTarget::Ssh {
                user: "user".to_string(),
                host: "host".to_string(),
                port: 22,
                path: "/path".to_string(),
            }
        );
    }
}
