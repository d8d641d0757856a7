//! Configuration management.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables prefixed with `JINA_MCP` (nested keys separated by
//! `__`, e.g. `JINA_MCP_SERVER__PORT=9000`). The upstream API key also falls
//! back to `JINA_API_KEY`.

mod file_config;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::upstream::{DEFAULT_READER_ENDPOINT, DEFAULT_SEARCH_ENDPOINT};

pub use file_config::{write_default_config, ConfigFileError};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// API keys for the upstream service
    #[serde(default)]
    pub api_keys: ApiKeys,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream endpoints and timeout
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// SSE keep-alive and queue settings
    #[serde(default)]
    pub sse: SseConfig,

    /// Logging output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// API keys for external services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeys {
    /// Jina API key, sent upstream as a bearer token. Falls back to
    /// `JINA_API_KEY` whenever the file leaves it unset.
    #[serde(default = "default_jina_key")]
    pub jina: Option<String>,
}

impl Default for ApiKeys {
    fn default() -> Self {
        Self {
            jina: default_jina_key(),
        }
    }
}

fn default_jina_key() -> Option<String> {
    std::env::var("JINA_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty())
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// One of debug, info, warn, error (warning and critical are aliases)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            debug: false,
        }
    }
}

impl ServerConfig {
    /// `host:port` bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Log level normalised to a tracing filter directive
    pub fn tracing_level(&self) -> Option<&'static str> {
        if self.debug {
            return Some("debug");
        }
        normalize_log_level(&self.log_level)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Map a configured level name to a tracing directive
pub fn normalize_log_level(level: &str) -> Option<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" | "critical" => Some("error"),
        _ => None,
    }
}

/// Upstream API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_reader_endpoint")]
    pub reader_endpoint: String,

    #[serde(default = "default_search_endpoint")]
    pub search_endpoint: String,

    /// When set, overrides both endpoints with `{base}/v1/reader` and
    /// `{base}/v1/search`
    #[serde(default)]
    pub base_url: Option<String>,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            reader_endpoint: default_reader_endpoint(),
            search_endpoint: default_search_endpoint(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Effective reader endpoint
    pub fn reader_url(&self) -> String {
        match self.base_url {
            Some(ref base) => format!("{}/v1/reader", base.trim_end_matches('/')),
            None => self.reader_endpoint.clone(),
        }
    }

    /// Effective search endpoint
    pub fn search_url(&self) -> String {
        match self.base_url {
            Some(ref base) => format!("{}/v1/search", base.trim_end_matches('/')),
            None => self.search_endpoint.clone(),
        }
    }
}

fn default_reader_endpoint() -> String {
    DEFAULT_READER_ENDPOINT.to_string()
}

fn default_search_endpoint() -> String {
    DEFAULT_SEARCH_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

/// SSE connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SseConfig {
    /// Seconds without traffic before a ping is sent
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Reconnect interval suggested to clients, in milliseconds
    #[serde(default = "default_retry_ms")]
    pub retry_ms: u64,

    /// Maximum queued events per connection
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            retry_ms: default_retry_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl SseConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn retry(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }
}

fn default_idle_timeout() -> u64 {
    30
}

fn default_retry_ms() -> u64 {
    30_000
}

fn default_queue_capacity() -> usize {
    256
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, endpoint) in [
            ("upstream.reader_endpoint", self.upstream.reader_url()),
            ("upstream.search_endpoint", self.upstream.search_url()),
        ] {
            url::Url::parse(&endpoint)
                .map_err(|e| ConfigError::Invalid(format!("{} '{}': {}", name, endpoint, e)))?;
        }

        if self.upstream.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "upstream.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.sse.idle_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "sse.idle_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.sse.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "sse.queue_capacity must be greater than zero".to_string(),
            ));
        }
        if normalize_log_level(&self.server.log_level).is_none() {
            return Err(ConfigError::Invalid(format!(
                "unknown server.log_level '{}'",
                self.server.log_level
            )));
        }

        Ok(())
    }
}

/// Load configuration from an optional file plus the environment
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix("JINA_MCP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: Config = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

/// Locate a config file in the default locations
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("jina-mcp.toml");
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("jina-mcp").join("config.toml"))
        .filter(|path| path.is_file())
}
