//! snow-terminal — the Terminal Executor (§4.7).
//!
//! Provides three execution modes:
//! - `OneShot`: fire-and-forget command via `exec`/`exec_streaming` (async,
//!   with timeout, safety, interactive-input detection, output batching)
//! - `Interactive`: persistent PTY session (SSH, sudo, vim, …)
//! - `Background`: long-running process tracked by `JobId`, plus the
//!   "move to background" (Ctrl+B) escape hatch for a running `exec`.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use snow_terminal::manager::TerminalManager;
//! use snow_terminal::types::ExecOptions;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut mgr = TerminalManager::new();
//!
//!     let result = mgr
//!         .exec("echo hello", "/tmp", ExecOptions::default(), Default::default())
//!         .await
//!         .unwrap();
//!     println!("{}", result.stdout);
//! }
//! ```

pub mod error;
pub mod manager;
pub mod safety;
pub mod session;
pub mod truncate;
pub mod types;

pub use error::{Result, TerminalError};
pub use types::{
    BackgroundJob, ExecMode, ExecOptions, ExecResult, ExecTarget, JobId, JobStatus, OutputChunk,
    OutputStream, SessionId, SessionInfo,
};
