//! Runtime configuration for llm-relay.
//!
//! Configuration can be loaded from a JSON file or constructed programmatically.
//! The upstream API key is never stored in the file; only the name of the
//! environment variable that holds it is.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "llm-relay", about = "Streaming relay proxy for OpenAI-compatible LLM APIs")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address.
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub listen: String,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Upstream endpoint configuration.
    pub upstream: UpstreamConfig,

    /// Generation parameter defaults and bounds.
    pub generation: GenerationConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:8080").
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Remote inference endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the OpenAI-compatible API (no trailing slash needed).
    pub base_url: String,

    /// Name of the environment variable holding the bearer token.
    pub api_key_env: String,

    /// User-Agent header sent with every upstream request.
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://models.mixlayer.ai/v1".to_string(),
            api_key_env: "MIXLAYER_API_KEY".to_string(),
            user_agent: "llm-relay".to_string(),
        }
    }
}

impl UpstreamConfig {
    /// Read the bearer token from the configured environment variable.
    ///
    /// A missing variable yields an empty credential; the upstream rejects
    /// the request as unauthorized rather than this process pre-checking it.
    pub fn resolve_api_key(&self) -> String {
        match std::env::var(&self.api_key_env) {
            Ok(key) => key,
            Err(_) => {
                tracing::warn!(
                    var = self.api_key_env,
                    "API key environment variable not set, sending empty credential"
                );
                String::new()
            }
        }
    }

    /// Full URL of the chat-completions route.
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Generation parameter defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Model used when the request does not name one.
    pub default_model: String,

    /// max_tokens used when the request does not set one.
    pub default_max_tokens: u32,

    /// Upper bound applied to requested max_tokens.
    pub max_tokens_limit: u32,

    /// max_tokens for the raw diagnostic probe.
    pub probe_max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_model: "meta/llama3.3-70b-instruct".to_string(),
            default_max_tokens: 1000,
            max_tokens_limit: 4096,
            probe_max_tokens: 100,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }
}
