//! snow-sessions — the Session Store and Snapshot Store (§4.5, §2 point 1).

pub mod error;
pub mod manager;
pub mod snapshot;
pub mod types;

pub use error::{Result, SessionError};
pub use manager::{SessionStore, SessionSummary};
pub use snapshot::{SnapshotEntry, SnapshotFileEntry, SnapshotStore};
pub use types::{Message, Session, SessionId};
