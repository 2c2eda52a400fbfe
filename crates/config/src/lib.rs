//! Configuration loading, validation, and management for the Functions.do gateway.
//!
//! Loads configuration from `~/.functionsdo/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.functionsdo/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key used when a per-provider key isn't set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Primary classifier/generative LLM provider name.
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model string passed to the default provider.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature for generative/agentic completions.
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response.
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Gateway HTTP server configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Tier timeout ladder.
    #[serde(default)]
    pub tiers: TierConfig,

    /// Rate limiter defaults.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// CSRF middleware configuration.
    #[serde(default)]
    pub csrf: CsrfConfig,

    /// Classifier configuration.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// TypeScript compile service configuration.
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// Per-tenant storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Provider-specific configurations (classifier fallback chain, generative tier).
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Maximum steps a cascade may declare.
    #[serde(default = "default_max_cascade_steps")]
    pub max_cascade_steps: usize,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_max_cascade_steps() -> usize {
    20
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
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("gateway", &self.gateway)
            .field("tiers", &self.tiers)
            .field("rate_limit", &self.rate_limit)
            .field("csrf", &self.csrf)
            .field("classifier", &self.classifier)
            .field("compiler", &self.compiler)
            .field("storage", &self.storage)
            .field("providers", &self.providers)
            .field("max_cascade_steps", &self.max_cascade_steps)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    /// Max request body size in bytes (10 MB default).
    #[serde(default = "default_body_limit")]
    pub max_body_bytes: usize,
}

fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_body_limit() -> usize {
    10 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_body_bytes: default_body_limit(),
        }
    }
}

/// Default timeouts per tier, forming the strict ladder (5s / 30s / 5m / 24h).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    #[serde(default = "default_code_timeout_ms")]
    pub code_timeout_ms: u64,
    #[serde(default = "default_generative_timeout_ms")]
    pub generative_timeout_ms: u64,
    #[serde(default = "default_agentic_timeout_ms")]
    pub agentic_timeout_ms: u64,
    #[serde(default = "default_human_timeout_ms")]
    pub human_timeout_ms: u64,
}

fn default_code_timeout_ms() -> u64 {
    5_000
}
fn default_generative_timeout_ms() -> u64 {
    30_000
}
fn default_agentic_timeout_ms() -> u64 {
    5 * 60_000
}
fn default_human_timeout_ms() -> u64 {
    24 * 60 * 60_000
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            code_timeout_ms: default_code_timeout_ms(),
            generative_timeout_ms: default_generative_timeout_ms(),
            agentic_timeout_ms: default_agentic_timeout_ms(),
            human_timeout_ms: default_human_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_ip_capacity")]
    pub ip_capacity: u32,
    #[serde(default = "default_window_ms")]
    pub ip_window_ms: u64,
    #[serde(default = "default_fn_capacity")]
    pub function_capacity: u32,
    #[serde(default = "default_window_ms")]
    pub function_window_ms: u64,
}

fn default_ip_capacity() -> u32 {
    120
}
fn default_fn_capacity() -> u32 {
    60
}
fn default_window_ms() -> u64 {
    60_000
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            ip_capacity: default_ip_capacity(),
            ip_window_ms: default_window_ms(),
            function_capacity: default_fn_capacity(),
            function_window_ms: default_window_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfConfig {
    #[serde(default = "default_csrf_cookie_name")]
    pub cookie_name: String,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

fn default_csrf_cookie_name() -> String {
    "csrf".into()
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_csrf_cookie_name(),
            exclude_patterns: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries_per_provider: u32,
    /// Fallback provider names, tried in order after the primary.
    #[serde(default)]
    pub fallback_providers: Vec<String>,
}

fn default_cache_capacity() -> usize {
    1000
}
fn default_max_retries() -> u32 {
    2
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_capacity: default_cache_capacity(),
            max_retries_per_provider: default_max_retries(),
            fallback_providers: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    #[serde(default)]
    pub esbuild_path: Option<String>,
    #[serde(default)]
    pub force_regex: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            esbuild_path: None,
            force_regex: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: String,
}

fn default_storage_backend() -> String {
    "memory".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (`~/.functionsdo/config.toml`),
    /// applying environment variable overrides.
    ///
    /// - `FUNCTIONSDO_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    /// - `ANTHROPIC_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("FUNCTIONSDO_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("FUNCTIONSDO_PROVIDER") {
            config.default_provider = provider;
        }
        if let Ok(model) = std::env::var("FUNCTIONSDO_MODEL") {
            config.default_model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no config file found, using defaults");
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

    pub fn config_dir() -> PathBuf {
        dirs_home().join(".functionsdo")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.gateway.max_body_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.max_body_bytes must be > 0".into(),
            ));
        }
        if self.max_cascade_steps == 0 {
            return Err(ConfigError::ValidationError(
                "max_cascade_steps must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            gateway: GatewayConfig::default(),
            tiers: TierConfig::default(),
            rate_limit: RateLimitConfig::default(),
            csrf: CsrfConfig::default(),
            classifier: ClassifierConfig::default(),
            compiler: CompilerConfig::default(),
            storage: StorageConfig::default(),
            providers: HashMap::new(),
            max_cascade_steps: default_max_cascade_steps(),
        }
    }
}

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

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
