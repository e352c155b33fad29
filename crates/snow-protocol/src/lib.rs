//! snow-protocol — wire messages shared by the IDE bridge WebSocket (§4.10).

pub mod messages;
pub mod port_discovery;
pub mod types;

pub use messages::{IdePush, IdeRequest, IdeResponse};
pub use port_discovery::PortDiscoveryFile;
