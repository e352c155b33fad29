//! snow-core — shared types, configuration, and error taxonomy for the
//! snow-cli conversation orchestration engine.

pub mod config;
pub mod error;
pub mod types;

pub use config::SnowConfig;
pub use error::{Result, SnowError};
pub use types::{
    ConnId, ImagePart, Message, Role, Session, SessionId, ToolCall, ToolResult, UsageInfo,
};

/// Install a `tracing-subscriber` env-filter formatter. Call once at process
/// startup (`snow-cli`'s `main`); safe to call more than once in tests.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
