//! snow-provider — the streaming LLM request loop (§4.1).
//!
//! A uniform [`types::StreamChunk`] event model sits on top of four wire
//! dialects (`chat_completions`, `responses`, `anthropic`, `gemini`); every
//! dialect client implements [`dialect::LlmProvider`] and is wrapped in an
//! idle-timeout guard before it ever reaches `snow-orchestrator`. The outer
//! retry loop (whole-round, not partial-stream replay) lives in [`retry`].

pub mod anthropic;
pub mod chat_completions;
pub mod dialect;
pub mod error;
pub mod gemini;
pub mod idle;
pub mod registry;
pub mod request;
pub mod responses;
pub mod retry;
pub mod sse;
pub mod types;

pub use dialect::{ChunkStream, LlmProvider};
pub use error::{ProviderError, Result};
pub use request::build_request;
pub use retry::RetryStatus;
pub use types::{ChatRequest, ProviderDialect, StreamChunk, SystemPromptSources, ToolDefinition};

use std::sync::Arc;
use std::time::Duration;

use snow_core::config::{OpenAiCompatEntry, ProvidersConfig};

use anthropic::AnthropicProvider;
use chat_completions::ChatCompletionsProvider;
use gemini::GeminiProvider;
use responses::ResponsesProvider;

/// Build every configured provider as a boxed [`LlmProvider`], keyed by the
/// id the orchestrator's model-routing config names (`"anthropic"`,
/// `"openai"`, `"openai-responses"`, `"gemini"`, or an `openai_compat` id).
pub fn build_providers(
    config: &ProvidersConfig,
    idle_timeout: Duration,
) -> Vec<(String, Arc<dyn LlmProvider>)> {
    let mut providers: Vec<(String, Arc<dyn LlmProvider>)> = Vec::new();

    if let Some(anthropic_cfg) = &config.anthropic {
        providers.push((
            "anthropic".to_string(),
            Arc::new(AnthropicProvider::new(anthropic_cfg, idle_timeout)),
        ));
    }

    if let Some(openai_cfg) = &config.openai {
        providers.push((
            "openai".to_string(),
            Arc::new(ChatCompletionsProvider::new(
                "openai",
                openai_cfg.api_key.clone(),
                openai_cfg.base_url.clone(),
                "/v1/chat/completions".to_string(),
                idle_timeout,
            )),
        ));
        providers.push((
            "openai-responses".to_string(),
            Arc::new(ResponsesProvider::new(
                openai_cfg.api_key.clone(),
                openai_cfg.base_url.clone(),
                idle_timeout,
            )),
        ));
    }

    if let Some(gemini_cfg) = &config.gemini {
        providers.push((
            "gemini".to_string(),
            Arc::new(GeminiProvider::new(gemini_cfg, idle_timeout)),
        ));
    }

    for entry in &config.openai_compat {
        providers.push((
            entry.id.clone(),
            Arc::new(build_compat_provider(entry, idle_timeout)),
        ));
    }

    providers
}

fn build_compat_provider(entry: &OpenAiCompatEntry, idle_timeout: Duration) -> ChatCompletionsProvider {
    if let Some(base_url) = &entry.base_url {
        return ChatCompletionsProvider::new(
            entry.id.clone(),
            entry.api_key.clone(),
            base_url.clone(),
            entry.chat_path.clone().unwrap_or_else(|| "/v1/chat/completions".to_string()),
            idle_timeout,
        );
    }

    match registry::lookup(&entry.id) {
        Some(known) => ChatCompletionsProvider::new(
            entry.id.clone(),
            entry.api_key.clone(),
            known.base_url.to_string(),
            known.chat_path.to_string(),
            idle_timeout,
        ),
        None => ChatCompletionsProvider::new(
            entry.id.clone(),
            entry.api_key.clone(),
            String::new(),
            "/v1/chat/completions".to_string(),
            idle_timeout,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snow_core::config::{AnthropicConfig, OpenAiCompatEntry};

    #[test]
    fn builds_configured_anthropic_provider() {
        let config = ProvidersConfig {
            anthropic: Some(AnthropicConfig {
                api_key: "sk-test".into(),
                base_url: "https://api.anthropic.com".into(),
            }),
            openai: None,
            gemini: None,
            openai_compat: Vec::new(),
        };
        let providers = build_providers(&config, Duration::from_secs(180));
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].0, "anthropic");
        assert_eq!(providers[0].1.name(), "anthropic");
    }

    #[test]
    fn resolves_openai_compat_entry_from_registry() {
        let config = ProvidersConfig {
            anthropic: None,
            openai: None,
            gemini: None,
            openai_compat: vec![OpenAiCompatEntry {
                id: "groq".into(),
                api_key: "gsk-test".into(),
                base_url: None,
                chat_path: None,
                model: None,
            }],
        };
        let providers = build_providers(&config, Duration::from_secs(180));
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].0, "groq");
    }
}
