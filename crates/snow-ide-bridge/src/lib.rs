//! snow-ide-bridge — the IDE Bridge (§4.10, wire protocol only).
//!
//! A localhost WebSocket server using `snow-protocol`'s frame shapes.
//! Unlike earlier gateway servers in this lineage, there is no connect-
//! challenge/auth handshake — this bridge only ever binds to a port on the
//! local machine for a single trusted editor extension, so the handshake's
//! job (keeping untrusted clients off a process-wide admin channel) doesn't
//! apply here.

pub mod analysis;
pub mod connection;
pub mod state;

pub use state::{bind_and_serve, BridgeHandle};
