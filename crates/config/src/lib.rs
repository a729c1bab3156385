//! Configuration loading, validation, and management for filescope.
//!
//! Loads configuration from `~/.filescope/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Hard upper bound on files in the context buffer.
pub const MAX_CONTEXT_FILES: usize = 5;

/// Hard upper bound on cached requests offered to the similarity arbiter.
pub const MAX_SIMILARITY_CANDIDATES: usize = 5;

/// Summary text used when none can be generated.
pub const DEFAULT_SUMMARY_FALLBACK: &str = "No conversation summary available.";

/// The root configuration structure.
///
/// Maps directly to `~/.filescope/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model for every capability without its own override
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Cache store settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Context negotiation settings
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Similarity arbiter settings
    #[serde(default)]
    pub arbiter: ArbiterConfig,

    /// Conversation summarizer settings
    #[serde(default)]
    pub summarizer: SummarizerConfig,

    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("cache", &self.cache)
            .field("selection", &self.selection)
            .field("arbiter", &self.arbiter)
            .field("summarizer", &self.summarizer)
            .field("log", &self.log)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Cache store behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entry time-to-live; also the sweep interval
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Soft entry cap, oldest evicted first
    #[serde(default = "default_soft_cap")]
    pub soft_cap: usize,

    /// How many recent entries the similarity arbiter may see (at most 5)
    #[serde(default = "default_similarity_candidates")]
    pub similarity_candidates: usize,

    /// Run the periodic TTL sweep
    #[serde(default = "default_true")]
    pub sweep: bool,
}

fn default_ttl_secs() -> u64 {
    30 * 60
}
fn default_soft_cap() -> usize {
    100
}
fn default_similarity_candidates() -> usize {
    MAX_SIMILARITY_CANDIDATES
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            soft_cap: default_soft_cap(),
            similarity_candidates: default_similarity_candidates(),
            sweep: true,
        }
    }
}

/// Context negotiator behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Context buffer capacity (at most 5)
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_selection_max_tokens")]
    pub max_tokens: u32,

    /// 0 disables the timeout
    #[serde(default = "default_selection_timeout")]
    pub timeout_secs: u64,

    /// Glob patterns ignored in addition to the built-in set
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_ignore_patterns: Vec<String>,
}

fn default_max_files() -> usize {
    MAX_CONTEXT_FILES
}
fn default_selection_max_tokens() -> u32 {
    1024
}
fn default_selection_timeout() -> u64 {
    60
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            model: None,
            temperature: 0.0,
            max_tokens: default_selection_max_tokens(),
            timeout_secs: default_selection_timeout(),
            extra_ignore_patterns: vec![],
        }
    }
}

/// Similarity arbiter behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbiterConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// 0 disables the timeout
    #[serde(default = "default_arbiter_timeout")]
    pub timeout_secs: u64,
}

fn default_arbiter_timeout() -> u64 {
    20
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: None,
            timeout_secs: default_arbiter_timeout(),
        }
    }
}

/// Conversation summarizer behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// 0 disables the timeout
    #[serde(default = "default_summarizer_timeout")]
    pub timeout_secs: u64,

    /// Used verbatim when summarization fails
    #[serde(default = "default_summary_fallback")]
    pub fallback: String,
}

fn default_summarizer_timeout() -> u64 {
    30
}
fn default_summary_fallback() -> String {
    DEFAULT_SUMMARY_FALLBACK.into()
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            model: None,
            timeout_secs: default_summarizer_timeout(),
            fallback: default_summary_fallback(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.filescope/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `FILESCOPE_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from an explicit path, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("FILESCOPE_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("FILESCOPE_PROVIDER") {
            config.default_provider = provider;
        }

        if let Ok(model) = std::env::var("FILESCOPE_MODEL") {
            config.default_model = model;
        }

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

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".filescope")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "cache.ttl_secs must be greater than 0".into(),
            ));
        }

        if self.cache.soft_cap == 0 {
            return Err(ConfigError::ValidationError(
                "cache.soft_cap must be at least 1".into(),
            ));
        }

        if !(1..=MAX_SIMILARITY_CANDIDATES).contains(&self.cache.similarity_candidates) {
            return Err(ConfigError::ValidationError(format!(
                "cache.similarity_candidates must be between 1 and {MAX_SIMILARITY_CANDIDATES}"
            )));
        }

        if !(1..=MAX_CONTEXT_FILES).contains(&self.selection.max_files) {
            return Err(ConfigError::ValidationError(format!(
                "selection.max_files must be between 1 and {MAX_CONTEXT_FILES}"
            )));
        }

        if self.selection.temperature < 0.0 || self.selection.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "selection.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Model for the negotiator call.
    pub fn selection_model(&self) -> &str {
        self.selection.model.as_deref().unwrap_or(&self.default_model)
    }

    /// Model for the similarity arbiter call.
    pub fn arbiter_model(&self) -> &str {
        self.arbiter.model.as_deref().unwrap_or(&self.default_model)
    }

    /// Model for the summarizer call.
    pub fn summarizer_model(&self) -> &str {
        self.summarizer.model.as_deref().unwrap_or(&self.default_model)
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            cache: CacheConfig::default(),
            selection: SelectionConfig::default(),
            arbiter: ArbiterConfig::default(),
            summarizer: SummarizerConfig::default(),
            log: LogConfig::default(),
            providers: HashMap::new(),
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
