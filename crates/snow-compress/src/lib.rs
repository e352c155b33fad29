//! snow-compress — the Context Compressor (§4.6).
//!
//! Grounded on a prior agent runtime's `pipeline::compact::compact_session_if_needed`:
//! same overall shape (threshold check, cheap-model call, rewrite), but the
//! spec replaces fact-extraction-into-memory with a summary-plus-preserved-
//! tail rewrite of the session itself, triggered both automatically (from
//! `snow-orchestrator`, after tool execution and before enqueuing pending
//! user messages) and manually via `/compact`.

pub mod compact;
pub mod error;

pub use compact::{CompactOutcome, Compressor};
pub use error::{CompressError, Result};
