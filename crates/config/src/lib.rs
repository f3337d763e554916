//! Configuration loading, validation, and management for Loopwright.
//!
//! Loads configuration from `~/.loopwright/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.loopwright/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the reasoning service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider name (openrouter, openai, ollama, ...)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Override the provider's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model used for every decision request
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Loop, planning and replanning limits
    #[serde(default)]
    pub agent: AgentSettings,

    /// Retry policy for decision requests
    #[serde(default)]
    pub provider_retry: RetrySettings,

    /// Built-in action settings
    #[serde(default)]
    pub tools: ToolsSettings,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    4096
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
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("provider_retry", &self.provider_retry)
            .field("tools", &self.tools)
            .finish()
    }
}

/// What the coordinator does when an attempt runs out of iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationLimitPolicy {
    /// Stop the run and report the limit
    #[default]
    Stop,
    /// Treat the limit as an implicit revision request
    Replan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Decision/execute steps allowed per attempt
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Replanning cycles allowed per run
    #[serde(default = "default_max_replans")]
    pub max_replans: u32,

    #[serde(default)]
    pub on_iteration_limit: IterationLimitPolicy,

    /// Extra "reformat as JSON" requests when a plan fails to parse
    #[serde(default)]
    pub plan_parse_retries: u32,

    /// Per HTTP attempt; each retry gets a fresh one
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Whole decision request, retries and backoff included. Derived from
    /// the attempt timeout and retry policy when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_timeout_secs: Option<u64>,

    /// Ask a person before each action runs
    #[serde(default)]
    pub require_approval: bool,

    /// Log every turn at info level
    #[serde(default)]
    pub verbose: bool,

    /// Name of the action that abandons the current plan
    #[serde(default = "default_revision_action")]
    pub revision_action: String,
}

fn default_max_iterations() -> u32 {
    10
}
fn default_max_replans() -> u32 {
    3
}
fn default_request_timeout_secs() -> u64 {
    120
}
fn default_revision_action() -> String {
    "request_revision".into()
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_replans: default_max_replans(),
            on_iteration_limit: IterationLimitPolicy::default(),
            plan_parse_retries: 0,
            request_timeout_secs: default_request_timeout_secs(),
            decision_timeout_secs: None,
            require_approval: false,
            verbose: false,
            revision_action: default_revision_action(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay; doubles per attempt
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}
fn default_base_delay_ms() -> u64 {
    500
}

impl RetrySettings {
    /// Total backoff slept between attempts when every retry is used.
    pub fn total_backoff(&self) -> Duration {
        (0..self.max_retries)
            .map(|retry| Duration::from_millis(self.base_delay_ms).saturating_mul(2u32.saturating_pow(retry)))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsSettings {
    #[serde(default = "default_shell_timeout_secs")]
    pub shell_timeout_secs: u64,

    /// Empty = every command allowed
    #[serde(default)]
    pub allowed_commands: Vec<String>,

    /// Empty = every root allowed
    #[serde(default)]
    pub allowed_roots: Vec<String>,

    #[serde(default = "default_forbidden_paths")]
    pub forbidden_paths: Vec<String>,

    /// Files larger than this are truncated when read
    #[serde(default = "default_max_read_bytes")]
    pub max_read_bytes: usize,
}

fn default_shell_timeout_secs() -> u64 {
    30
}
fn default_forbidden_paths() -> Vec<String> {
    vec![
        "/etc/shadow".into(),
        "/proc".into(),
        "/sys".into(),
        "~/.ssh".into(),
        "~/.gnupg".into(),
        "~/.aws".into(),
    ]
}
fn default_max_read_bytes() -> usize {
    64 * 1024
}

impl Default for ToolsSettings {
    fn default() -> Self {
        Self {
            shell_timeout_secs: default_shell_timeout_secs(),
            allowed_commands: vec![],
            allowed_roots: vec![],
            forbidden_paths: default_forbidden_paths(),
            max_read_bytes: default_max_read_bytes(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.loopwright/config.toml).
    ///
    /// Also checks environment variables:
    /// - `LOOPWRIGHT_API_KEY` (highest priority), `OPENROUTER_API_KEY`, `OPENAI_API_KEY`
    /// - `LOOPWRIGHT_PROVIDER`, `LOOPWRIGHT_MODEL`, `LOOPWRIGHT_BASE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load `path`, then apply the environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
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

    /// Apply environment overrides through `lookup`.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("LOOPWRIGHT_API_KEY")
                .or_else(|| lookup("OPENROUTER_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(provider) = lookup("LOOPWRIGHT_PROVIDER") {
            self.provider = provider;
        }
        if let Some(model) = lookup("LOOPWRIGHT_MODEL") {
            self.model = model;
        }
        if let Some(url) = lookup("LOOPWRIGHT_BASE_URL") {
            self.base_url = Some(url);
        }
    }

    /// Upper bound on one decision request as seen by the agent loop.
    ///
    /// Unless set explicitly, every attempt may use its full timeout and
    /// every backoff may be slept, so retries are never cut short.
    pub fn decision_timeout(&self) -> Duration {
        if let Some(secs) = self.agent.decision_timeout_secs {
            return Duration::from_secs(secs);
        }
        let attempt = Duration::from_secs(self.agent.request_timeout_secs);
        attempt
            .saturating_mul(self.provider_retry.max_retries.saturating_add(1))
            .saturating_add(self.provider_retry.total_backoff())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".loopwright")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.agent.revision_action.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "agent.revision_action must not be empty".into(),
            ));
        }

        if self.agent.decision_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "agent.decision_timeout_secs must be at least 1".into(),
            ));
        }

        if self.tools.shell_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "tools.shell_timeout_secs must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            base_url: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            agent: AgentSettings::default(),
            provider_retry: RetrySettings::default(),
            tools: ToolsSettings::default(),
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
