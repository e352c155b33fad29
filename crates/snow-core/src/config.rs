use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const IDE_BRIDGE_PORT_RANGE: std::ops::RangeInclusive<u16> = 9527..=9537;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_TERMINAL_TIMEOUT_SECS: u64 = 30;
pub const MAX_TERMINAL_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_COMPRESSION_THRESHOLD_PCT: u8 = 80;
pub const SNAPSHOT_COMMIT_MAX_ATTEMPTS: u32 = 10;
pub const SNAPSHOT_COMMIT_TIMEOUT_SECS: u64 = 5;
pub const OUTER_RETRY_MAX_ATTEMPTS: u32 = 10;
pub const OUTER_RETRY_DELAY_SECS: u64 = 5;

/// Top-level config (snow.toml + SNOW_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnowConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub ide_bridge: IdeBridgeConfig,
    #[serde(default)]
    pub terminal: TerminalConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for SnowConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            providers: ProvidersConfig::default(),
            ide_bridge: IdeBridgeConfig::default(),
            terminal: TerminalConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_advanced_model")]
    pub advanced_model: String,
    #[serde(default = "default_basic_model")]
    pub basic_model: String,
    #[serde(default)]
    pub yolo_mode: bool,
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold_pct: u8,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            advanced_model: default_advanced_model(),
            basic_model: default_basic_model(),
            yolo_mode: false,
            compression_threshold_pct: default_compression_threshold(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub anthropic: Option<AnthropicConfig>,
    pub openai: Option<OpenAiProviderConfig>,
    pub gemini: Option<GeminiConfig>,
    /// Additional OpenAI-compatible (`chat-completions` dialect) endpoints,
    /// tried in order after the primary provider.
    #[serde(default)]
    pub openai_compat: Vec<OpenAiCompatEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    pub api_key: String,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

/// A single OpenAI-compatible provider entry. Well-known provider IDs are
/// resolved automatically by `snow-provider`'s registry (groq, deepseek,
/// openrouter, xai, mistral, perplexity, together, fireworks, cerebras,
/// sambanova, hyperbolic, novita, lepton, featherless, requesty, glama,
/// chutes, cohere, moonshot, glm, doubao, qwen, zai, yi, minimax, hunyuan,
/// stepfun, lmstudio, llamacpp, localai, litellm). Unknown IDs require
/// `base_url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiCompatEntry {
    pub id: String,
    pub api_key: String,
    pub base_url: Option<String>,
    pub chat_path: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdeBridgeConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_port_discovery_path")]
    pub port_discovery_path: String,
}

impl Default for IdeBridgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port_discovery_path: default_port_discovery_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    #[serde(default = "default_terminal_timeout")]
    pub default_timeout_secs: u64,
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,
    #[serde(default)]
    pub skip_safety: bool,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_terminal_timeout(),
            max_output_chars: default_max_output_chars(),
            skip_safety: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_home")]
    pub home: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            home: default_home(),
        }
    }
}

impl StorageConfig {
    pub fn sessions_dir(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.home).join("sessions")
    }

    pub fn snapshots_dir(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.home).join("snapshots")
    }

    pub fn notebooks_dir(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.home).join("notebooks")
    }

    pub fn permissions_path(&self, workspace: &str) -> std::path::PathBuf {
        let slug = workspace.replace(['/', '\\', ':'], "_");
        std::path::Path::new(&self.home)
            .join("permissions")
            .join(format!("{}.json", slug))
    }
}

fn bool_true() -> bool {
    true
}
fn default_advanced_model() -> String {
    "claude-sonnet-4-6".to_string()
}
fn default_basic_model() -> String {
    "claude-haiku-4-6".to_string()
}
fn default_compression_threshold() -> u8 {
    DEFAULT_COMPRESSION_THRESHOLD_PCT
}
fn default_idle_timeout() -> u64 {
    DEFAULT_IDLE_TIMEOUT_SECS
}
fn default_terminal_timeout() -> u64 {
    DEFAULT_TERMINAL_TIMEOUT_SECS
}
fn default_max_output_chars() -> usize {
    30_000
}
fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_home() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.snow-cli", home)
}
fn default_port_discovery_path() -> String {
    let tmp = std::env::var("TMPDIR").unwrap_or_else(|_| "/tmp".to_string());
    format!("{}/snow-cli-ports.json", tmp.trim_end_matches('/'))
}

impl SnowConfig {
    /// Load config from a TOML file with `SNOW_*` env var overrides, the
    /// same figment layering this lineage's config loader has always used.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: SnowConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("SNOW_").split("_"))
            .extract()
            .map_err(|e| crate::error::SnowError::Config(e.to_string()))?;

        Ok(config)
    }

    /// `SNOW_TASK_MODE=true` forces every new session to be ephemeral (§6).
    pub fn task_mode() -> bool {
        std::env::var("SNOW_TASK_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.snow-cli/snow.toml", home)
}
