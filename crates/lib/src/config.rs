//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.linebot/config.json`) and environment.
//! Credentials are usually supplied through the environment; the file carries everything else.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const ENV_CHANNEL_SECRET: &str = "LINE_CHANNEL_SECRET";
pub const ENV_ACCESS_TOKEN: &str = "LINE_ACCESS_TOKEN";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Channel settings (LINE).
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Generation API settings (OpenAI-compatible chat completions).
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// HTTP port (default 3000).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Per-channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(default)]
    pub line: LineChannelConfig,
}

/// LINE Messaging API channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineChannelConfig {
    /// Channel secret used to verify x-line-signature. Overridden by LINE_CHANNEL_SECRET env.
    pub channel_secret: Option<String>,
    /// Channel access token for the reply API. Overridden by LINE_ACCESS_TOKEN env.
    pub access_token: Option<String>,
    /// Messaging API base URL (default https://api.line.me).
    pub api_base: Option<String>,
}

/// Which prompt wording to send to the generation API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PromptStyle {
    /// Short system instruction; the consulting template with the user's text embedded is the user message.
    #[default]
    Embedded,
    /// The consulting guide is the system message and the user's text is sent as-is.
    SystemGuide,
}

/// Generation API config. Absent api key means echo mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// API key. Overridden by OPENAI_API_KEY env.
    pub api_key: Option<String>,
    /// API base URL (default https://api.openai.com/v1).
    pub base_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub prompt_style: PromptStyle,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f64 {
    0.1
}

fn default_max_tokens() -> u32 {
    350
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            prompt_style: PromptStyle::default(),
        }
    }
}

/// Credentials resolved from environment and config. Blank values count as absent.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub channel_secret: Option<String>,
    pub access_token: Option<String>,
    pub api_key: Option<String>,
}

impl Credentials {
    /// Resolve all credentials: env overrides config.
    pub fn resolve(config: &Config) -> Self {
        Self {
            channel_secret: env_or(ENV_CHANNEL_SECRET, config.channels.line.channel_secret.as_deref()),
            access_token: env_or(ENV_ACCESS_TOKEN, config.channels.line.access_token.as_deref()),
            api_key: env_or(ENV_OPENAI_API_KEY, config.generation.api_key.as_deref()),
        }
    }

    /// Names of the required LINE variables that are missing, in a fixed order.
    pub fn missing_line_vars(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.channel_secret.is_none() {
            missing.push(ENV_CHANNEL_SECRET);
        }
        if self.access_token.is_none() {
            missing.push(ENV_ACCESS_TOKEN);
        }
        missing
    }
}

/// Trim and drop empty strings.
fn non_blank(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

fn env_or(var: &str, fallback: Option<&str>) -> Option<String> {
    std::env::var(var)
        .ok()
        .and_then(|s| non_blank(&s))
        .or_else(|| fallback.and_then(non_blank))
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("LINEBOT_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".linebot").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path, or the default path. Missing file => default config.
/// Returns the config and the path that was used.
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
