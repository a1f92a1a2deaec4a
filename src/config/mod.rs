//! Configuration management for Sleuth
//!
//! Settings are loaded from a TOML file, then overridden by `SLEUTH_SECTION__KEY`
//! environment variables. Secrets never live in the file: each section names the
//! environment variable holding its credential, resolved once into [`Credentials`].

use crate::error::{Result, SleuthError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub slack: SlackConfig,
    pub confluence: ConfluenceConfig,
    pub search: SearchConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Webhook server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// "development" or "production" (controls log format)
    pub env: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub db_path: PathBuf,
    pub max_connections: u32,
}

/// Slack workspace configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    pub bot_token_env: String,
    pub signing_secret_env: String,
    /// Channel searched for past discussions (empty searches everywhere)
    #[serde(default)]
    pub channel_id: String,
    pub trigger_emoji: String,
    pub api_base: String,
    /// Base used for message permalinks
    pub workspace_url: String,
}

/// Confluence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfluenceConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub username: String,
    pub api_token_env: String,
    pub space_key: String,
}

/// Search and ranking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub similarity_threshold: f64,
    pub max_results: usize,
    pub days_back: u32,
    pub source_timeout_secs: u64,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

/// Event dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Accepted events waiting for a worker
    pub queue_size: usize,
    /// Inquiries processed at the same time
    pub max_concurrent: usize,
    /// Deadline for one whole inquiry pipeline
    pub deadline_secs: u64,
    /// Deadline for posting the threaded reply
    pub reply_timeout_secs: u64,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SleuthError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| SleuthError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Load from the given path, or fall back to defaults when no file exists
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        match Self::load(&path) {
            Ok(config) => Ok(config),
            Err(SleuthError::ConfigNotFound { path }) => {
                tracing::warn!("No config file at {:?}, using defaults", path);
                let mut config = Self::default();
                config.apply_env_overrides();
                ConfigValidator::validate(&config)?;
                Ok(config)
            }
            Err(e) => Err(e),
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SleuthError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| SleuthError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: SLEUTH_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("SLEUTH_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "SERVER__BIND_ADDR" => self.server.bind_addr = value.to_string(),
            "SERVER__ENV" => self.server.env = value.to_string(),
            "STORAGE__DB_PATH" => self.storage.db_path = PathBuf::from(value),
            "SLACK__CHANNEL_ID" => self.slack.channel_id = value.to_string(),
            "SLACK__TRIGGER_EMOJI" => self.slack.trigger_emoji = value.to_string(),
            "CONFLUENCE__BASE_URL" => self.confluence.base_url = value.to_string(),
            "CONFLUENCE__USERNAME" => self.confluence.username = value.to_string(),
            "CONFLUENCE__SPACE_KEY" => self.confluence.space_key = value.to_string(),
            "SEARCH__SIMILARITY_THRESHOLD" => {
                self.search.similarity_threshold = parse_value(path, value)?;
            }
            "SEARCH__MAX_RESULTS" => self.search.max_results = parse_value(path, value)?,
            "SEARCH__DAYS_BACK" => self.search.days_back = parse_value(path, value)?,
            "LLM__BASE_URL" => self.llm.base_url = value.to_string(),
            "LLM__MODEL" => self.llm.model = value.to_string(),
            "LLM__TEMPERATURE" => self.llm.temperature = parse_value(path, value)?,
            "LLM__MAX_TOKENS" => self.llm.max_tokens = parse_value(path, value)?,
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SleuthError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("sleuth").join("config.toml"))
    }
}

fn parse_value<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| SleuthError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
            },
            server: ServerConfig {
                bind_addr: "0.0.0.0:8080".to_string(),
                env: "development".to_string(),
            },
            storage: StorageConfig {
                db_path: PathBuf::from("~/.sleuth/inquiries.db"),
                max_connections: 16,
            },
            slack: SlackConfig {
                bot_token_env: "SLACK_BOT_TOKEN".to_string(),
                signing_secret_env: "SLACK_SIGNING_SECRET".to_string(),
                channel_id: String::new(),
                trigger_emoji: "eyes".to_string(),
                api_base: "https://slack.com/api".to_string(),
                workspace_url: "https://slack.com".to_string(),
            },
            confluence: ConfluenceConfig {
                base_url: String::new(),
                username: String::new(),
                api_token_env: "CONFLUENCE_API_TOKEN".to_string(),
                space_key: "DOCS".to_string(),
            },
            search: SearchConfig {
                similarity_threshold: 0.7,
                max_results: 10,
                days_back: 90,
                source_timeout_secs: 10,
            },
            llm: LlmConfig {
                base_url: "http://localhost:4000".to_string(),
                api_key_env: "LITELLM_API_KEY".to_string(),
                model: "gpt-4o-mini".to_string(),
                temperature: 0.3,
                max_tokens: 1000,
                timeout_secs: 30,
            },
            pipeline: PipelineConfig {
                queue_size: 256,
                max_concurrent: 8,
                deadline_secs: 120,
                reply_timeout_secs: 10,
            },
        }
    }
}

/// Secrets resolved from the environment variables named in [`Config`]
///
/// A missing or empty variable resolves to `None`; each consumer decides whether
/// that disables a feature (Confluence search) or fails closed (signature checks).
#[derive(Clone, Default)]
pub struct Credentials {
    pub slack_bot_token: Option<String>,
    pub slack_signing_secret: Option<String>,
    pub confluence_api_token: Option<String>,
    pub llm_api_key: Option<String>,
}

impl Credentials {
    /// Resolve credentials from the process environment
    pub fn from_env(config: &Config) -> Self {
        Self {
            slack_bot_token: read_secret(&config.slack.bot_token_env),
            slack_signing_secret: read_secret(&config.slack.signing_secret_env),
            confluence_api_token: read_secret(&config.confluence.api_token_env),
            llm_api_key: read_secret(&config.llm.api_key_env),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("slack_bot_token", &mask(&self.slack_bot_token))
            .field("slack_signing_secret", &mask(&self.slack_signing_secret))
            .field("confluence_api_token", &mask(&self.confluence_api_token))
            .field("llm_api_key", &mask(&self.llm_api_key))
            .finish()
    }
}

fn read_secret(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
