use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_API_KEY_ENV, DEFAULT_BUS_WRITE_TIMEOUT_MS, DEFAULT_CONVERSATION_CAPACITY,
    DEFAULT_HISTORY_CAPACITY, DEFAULT_MESSAGE_QUEUE_CAPACITY, DEFAULT_NATS_URL,
    DEFAULT_PROMPT_TIMEOUT_MS, DEFAULT_PROVIDER_MODEL, DEFAULT_PROVIDER_URL,
    DEFAULT_QUEUE_BUFFER, DEFAULT_WORKERS, HTTP_REQUEST_TIMEOUT_SECS, TOPIC_PROMPT,
};
use crate::dispatch::QueueFullPolicy;

/// Main configuration structure.
///
/// Built once at startup and handed to constructors by reference; nothing
/// mutates it after components are live.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Worker pool and prompt queue
    #[serde(default)]
    pub dispatcher: DispatcherSettings,

    /// Conversation registry
    #[serde(default)]
    pub sessions: SessionSettings,

    /// Language-model provider
    #[serde(default)]
    pub provider: ProviderSettings,

    /// Outbound bus
    #[serde(default)]
    pub bus: BusSettings,

    /// Inbound message handling
    #[serde(default)]
    pub inbound: InboundSettings,
}

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherSettings {
    /// Number of workers (concurrent provider calls)
    pub workers: usize,
    /// Bound of the inbound prompt queue
    pub queue_buffer: usize,
    /// Time a prompt may wait for its answer
    pub prompt_timeout_ms: u64,
    /// Reject or wait when the prompt queue is full
    pub queue_full_policy: QueueFullPolicy,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_buffer: DEFAULT_QUEUE_BUFFER,
            prompt_timeout_ms: DEFAULT_PROMPT_TIMEOUT_MS,
            queue_full_policy: QueueFullPolicy::default(),
        }
    }
}

/// Session registry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Maximum number of live conversations
    pub capacity: usize,
    /// Answers kept per conversation
    pub history_capacity: usize,
    /// Evict the oldest conversation instead of rejecting a new one
    pub evict_oldest_when_full: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CONVERSATION_CAPACITY,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            evict_oldest_when_full: false,
        }
    }
}

/// Provider configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Base URL of the OpenAI-compatible API
    pub base_url: String,
    /// Model name sent with every request
    pub model: String,
    /// Environment variable containing API key
    pub api_key_env: String,
    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PROVIDER_URL.to_string(),
            model: DEFAULT_PROVIDER_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            request_timeout_secs: HTTP_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ProviderSettings {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .with_context(|| format!("Environment variable {} is not set", self.api_key_env))
    }
}

/// Which bus implementation to publish to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    /// In-process stand-in, no broker needed
    #[default]
    Memory,
    /// NATS broker
    Nats,
}

/// Outbound bus configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusSettings {
    pub kind: BusKind,
    /// Broker address (NATS only)
    pub url: String,
    /// Deadline for one publish
    pub write_timeout_ms: u64,
    /// Topic answers and chat events are published to
    pub topic: String,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            kind: BusKind::default(),
            url: DEFAULT_NATS_URL.to_string(),
            write_timeout_ms: DEFAULT_BUS_WRITE_TIMEOUT_MS,
            topic: TOPIC_PROMPT.to_string(),
        }
    }
}

/// Inbound configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundSettings {
    /// Bound of the raw inbound message queue
    pub message_queue_capacity: usize,
}

impl Default for InboundSettings {
    fn default() -> Self {
        Self {
            message_queue_capacity: DEFAULT_MESSAGE_QUEUE_CAPACITY,
        }
    }
}

/// Load configuration from multiple sources
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let global_config = get_config_dir()?.join("config.toml");
    let local_config = PathBuf::from(".chatgate/config.toml");
    build_figment(Some(&global_config), Some(&local_config), explicit)
        .extract()
        .context("Failed to load configuration")
}

/// Defaults, then each existing file in order, then `CHATGATE_` variables
fn build_figment(global: Option<&Path>, local: Option<&Path>, explicit: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    for path in [global, local].into_iter().flatten() {
        if path.exists() {
            figment = figment.merge(Toml::file(path));
        }
    }

    // An explicit file must exist; figment reports it missing otherwise
    if let Some(path) = explicit {
        figment = figment.merge(Toml::file_exact(path));
    }

    // e.g. CHATGATE_DISPATCHER__WORKERS=4
    figment.merge(Env::prefixed("CHATGATE_").split("__"))
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "chatgate") {
        Ok(proj_dirs.config_dir().to_path_buf())
    } else {
        // Fallback to home directory
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("Could not determine home directory")?;
        Ok(PathBuf::from(home).join(".config").join("chatgate"))
    }
}

/// Save configuration to file
pub fn save_config(config: &Config, path: Option<PathBuf>) -> Result<PathBuf> {
    let path = match path {
        Some(p) => p,
        None => get_config_dir()?.join("config.toml"),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let toml_string = toml::to_string_pretty(config)?;
    std::fs::write(&path, toml_string)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(path)
}

/// Create a default configuration file if it doesn't exist
pub fn init_config(path: Option<PathBuf>) -> Result<Option<PathBuf>> {
    let path = match path {
        Some(p) => p,
        None => get_config_dir()?.join("config.toml"),
    };

    if path.exists() {
        return Ok(None);
    }

    save_config(&Config::default(), Some(path)).map(Some)
}
