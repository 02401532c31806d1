//! Configuration loading, validation, and management for reasonchain.
//!
//! Loads configuration from `~/.reasonchain/config.toml` with environment
//! variable overrides. Validates all settings at load time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.reasonchain/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Minimum verifier confidence for a run to be accepted
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Snippets requested from the retriever per sub-question
    #[serde(default = "default_top_k")]
    pub retrieval_top_k: usize,

    /// Evidence snippets attached to an accepted answer
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,

    /// Joins evidence snippets into the synthesizer's context
    #[serde(default = "default_context_separator")]
    pub context_separator: String,

    /// Fan retrieval calls out concurrently
    #[serde(default)]
    pub parallel_retrieval: bool,

    /// Per-call timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Whole-run retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Language model backend
    #[serde(default)]
    pub model: ModelConfig,
}

fn default_confidence_threshold() -> f64 {
    0.7
}
fn default_top_k() -> usize {
    5
}
fn default_max_sources() -> usize {
    3
}
fn default_context_separator() -> String {
    " ".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Budget for one language model call, 0 disables
    #[serde(default = "default_model_timeout_ms")]
    pub model_ms: u64,

    /// Budget for one retriever call, 0 disables
    #[serde(default = "default_retrieval_timeout_ms")]
    pub retrieval_ms: u64,
}

fn default_model_timeout_ms() -> u64 {
    60_000
}
fn default_retrieval_timeout_ms() -> u64 {
    10_000
}

impl TimeoutConfig {
    pub fn model(&self) -> Option<Duration> {
        non_zero_millis(self.model_ms)
    }

    pub fn retrieval(&self) -> Option<Duration> {
        non_zero_millis(self.retrieval_ms)
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            model_ms: default_model_timeout_ms(),
            retrieval_ms: default_retrieval_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per run, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    1
}
fn default_backoff_ms() -> u64 {
    500
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Backend name ("openrouter", "openai", "ollama", ...)
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override the provider's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    2048
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            api_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ChainConfig {
    /// Load configuration from the default path (~/.reasonchain/config.toml).
    ///
    /// Environment overrides:
    /// - `REASONCHAIN_API_KEY`, then `OPENROUTER_API_KEY`, then `OPENAI_API_KEY`
    ///   (only when the file sets no key)
    /// - `REASONCHAIN_PROVIDER`, `REASONCHAIN_MODEL`
    /// - `REASONCHAIN_CONFIDENCE_THRESHOLD`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if self.model.api_key.is_none() {
            self.model.api_key = lookup("REASONCHAIN_API_KEY")
                .or_else(|| lookup("OPENROUTER_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(provider) = lookup("REASONCHAIN_PROVIDER") {
            self.model.provider = provider;
        }

        if let Some(model) = lookup("REASONCHAIN_MODEL") {
            self.model.model = model;
        }

        if let Some(raw) = lookup("REASONCHAIN_CONFIDENCE_THRESHOLD") {
            self.confidence_threshold = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "REASONCHAIN_CONFIDENCE_THRESHOLD is not a number: {raw}"
                ))
            })?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".reasonchain")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::ValidationError(
                "confidence_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if self.model.temperature < 0.0 || self.model.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            retrieval_top_k: default_top_k(),
            max_sources: default_max_sources(),
            context_separator: default_context_separator(),
            parallel_retrieval: false,
            timeouts: TimeoutConfig::default(),
            retry: RetryConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for reasonchain_core::Error {
    fn from(err: ConfigError) -> Self {
        reasonchain_core::Error::Config {
            message: err.to_string(),
        }
    }
}
