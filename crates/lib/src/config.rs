//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.aircooled/config.json`) and environment.
//! The model credential is never stored in code: `OPENAI_API_KEY` wins over `model.apiKey`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Proxy server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Hosted model endpoint and sampling settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Optional instruction payload overrides.
    #[serde(default)]
    pub prompts: PromptsConfig,

    /// Client-side settings (proxy address, export layout).
    #[serde(default)]
    pub client: ClientConfig,
}

/// Proxy bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// HTTP port (default 3001).
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_server_bind")]
    pub bind: String,
}

fn default_server_port() -> u16 {
    3001
}

fn default_server_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            bind: default_server_bind(),
        }
    }
}

/// OpenAI-compatible chat-completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    /// Base URL up to and including the API version (default "https://api.openai.com/v1").
    #[serde(default = "default_model_base_url")]
    pub base_url: String,

    /// Model id passed as-is to the provider.
    #[serde(default = "default_model_name")]
    pub model: String,

    /// API key. Overridden by OPENAI_API_KEY env.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Sampling temperature; kept low so replies are near-deterministic.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Output bound for chat replies.
    #[serde(default = "default_chat_max_tokens")]
    pub chat_max_tokens: u32,

    /// Output bound for summary reports.
    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,

    /// Upper bound on one model call, in seconds.
    #[serde(default = "default_model_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_model_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model_name() -> String {
    "gpt-4-1106-preview".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_chat_max_tokens() -> u32 {
    1000
}

fn default_summary_max_tokens() -> u32 {
    800
}

fn default_model_timeout_secs() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_model_base_url(),
            model: default_model_name(),
            api_key: None,
            temperature: default_temperature(),
            chat_max_tokens: default_chat_max_tokens(),
            summary_max_tokens: default_summary_max_tokens(),
            request_timeout_secs: default_model_timeout_secs(),
        }
    }
}

/// Instruction payload files. Relative paths are resolved against the config file's parent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptsConfig {
    /// Persona / scope payload for `/api/chat`. Omit to use the built-in payload.
    #[serde(default)]
    pub chat_file: Option<PathBuf>,

    /// Report payload for `/api/summary`. Omit to use the built-in payload.
    #[serde(default)]
    pub summary_file: Option<PathBuf>,
}

/// Settings used by the terminal and desktop clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Where the proxy is reachable (default "http://127.0.0.1:3001").
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,

    /// Column width for exported summary documents.
    #[serde(default = "default_page_width")]
    pub page_width: usize,

    /// Lines per page for exported summary documents.
    #[serde(default = "default_lines_per_page")]
    pub lines_per_page: usize,

    /// Upper bound on one proxy call, in seconds. Longer than the model timeout so the proxy's
    /// fallback arrives first.
    #[serde(default = "default_client_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_proxy_url() -> String {
    "http://127.0.0.1:3001".to_string()
}

fn default_page_width() -> usize {
    90
}

fn default_lines_per_page() -> usize {
    60
}

fn default_client_timeout_secs() -> u64 {
    150
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            proxy_url: default_proxy_url(),
            page_width: default_page_width(),
            lines_per_page: default_lines_per_page(),
            request_timeout_secs: default_client_timeout_secs(),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Resolve the model credential: env OPENAI_API_KEY overrides config.
pub fn resolve_api_key(config: &Config) -> Option<String> {
    non_empty_env("OPENAI_API_KEY").or_else(|| {
        config
            .model
            .api_key
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("AIRCOOLED_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".aircooled").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path, the default path, or AIRCOOLED_CONFIG_PATH.
/// Missing file => default config.
/// Returns the config and the path that was used (for resolving prompt files).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Directory holding the config file (`.` when the path has no parent).
pub fn config_dir(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Resolve a prompt file path: absolute paths are kept, relative ones join the config directory.
pub fn resolve_prompt_path(file: &Path, config_path: &Path) -> PathBuf {
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        config_dir(config_path).join(file)
    }
}
