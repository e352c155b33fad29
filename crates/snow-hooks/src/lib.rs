//! snow-hooks — the Hook System (§4.8).
//!
//! A `HookEngine` dispatches named, prioritized `HookDefinition`s against a
//! fixed vocabulary of `HookEvent`s. Before-timing hooks run synchronously
//! and can `Block` or `Modify` the event; After-timing hooks are fire-and-
//! forget observers spawned onto their own Tokio task.
//!
//! `onSessionStart`, `beforeCompress`, and `onStop` are all Before hooks:
//! the first two can hard-block (`exit_code >= 2`) or soft-block
//! (`exit_code == 1`) the action they guard, and `onStop`'s block decision
//! is what actually ends the orchestrator's turn loop.

pub mod engine;
pub mod error;
pub mod types;

pub use engine::HookEngine;
pub use error::{HookError, Result};
pub use types::{HookAction, HookContext, HookDefinition, HookEvent, HookHandler, HookResult, HookTiming};
