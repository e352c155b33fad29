//! `snow-sessions` stores the `Session`/`Message` types defined in
//! `snow-core::types` — no separate session struct here. This module only
//! adds store-local helpers.

pub use snow_core::types::{Message, Session, SessionId};
