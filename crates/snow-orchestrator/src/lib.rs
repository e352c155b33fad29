//! snow-orchestrator — the Conversation Orchestration Engine (§4.4).
//!
//! Ties together `snow-provider` (streaming request loop), `snow-tools`
//! (dispatch), `snow-sessions` (persistence + snapshots), `snow-compress`
//! (auto-compaction), and `snow-hooks` (lifecycle hooks) around one
//! `Orchestrator` per active session. See [`orchestrator::Orchestrator`] for
//! the entry point.

pub mod context_window;
pub mod error;
pub mod folder_notebook;
pub mod orchestrator;
pub mod orphan_repair;
pub mod pinned;
pub mod streaming;

pub use error::{OrchestratorError, Result};
pub use orchestrator::Orchestrator;
pub use streaming::{NullObserver, RoundObserver};
