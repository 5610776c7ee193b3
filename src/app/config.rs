use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{
    CODE_CACHE_TTL_DAYS, DEFAULT_LITELLM_PROXY_URL, DEFAULT_MAX_ATTEMPTS, DEFAULT_MODEL_NAME,
    DEFAULT_MODEL_PROVIDER, DEFAULT_STATS_API_URL, GENERATION_MAX_TOKENS, GENERATION_TEMPERATURE,
    MODEL_REQUEST_TIMEOUT_SECS, RESPONSE_CACHE_TTL_HOURS, SANDBOX_MAX_OPERATIONS,
    SANDBOX_TIMEOUT_SECS, STATS_BACKOFF_BASE_MS, STATS_MAX_RETRIES, STATS_REQUEST_TIMEOUT_SECS,
};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Statistics service configuration
    #[serde(default)]
    pub stats_api: StatsApiConfig,

    /// Code-generation model configuration
    #[serde(default)]
    pub model: ModelSettings,

    /// On-disk cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Script sandbox and repair loop configuration
    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// Season used when a question names no year (defaults to the current season)
    #[serde(default)]
    pub default_season: Option<i32>,
}

/// Statistics service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsApiConfig {
    /// Base URL of the stats API
    pub base_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Retries for connection/timeout failures
    pub max_retries: u32,
    /// Initial backoff between retries (doubles each time)
    pub backoff_ms: u64,
}

impl Default for StatsApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_STATS_API_URL.to_string(),
            timeout_secs: STATS_REQUEST_TIMEOUT_SECS,
            max_retries: STATS_MAX_RETRIES,
            backoff_ms: STATS_BACKOFF_BASE_MS,
        }
    }
}

/// Model settings for code generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Set to false to disable the AI path entirely
    pub enabled: bool,
    /// Model provider (ollama, openai, anthropic, gemini, ...)
    pub provider: String,
    /// Model name
    pub name: String,
    /// OpenAI-compatible endpoint (LiteLLM proxy by default)
    pub proxy_url: String,
    /// Environment variable holding the bearer token, if any
    pub api_key_env: Option<String>,
    /// Temperature for generation
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: usize,
    /// Request timeout
    pub timeout_secs: u64,
}

impl ModelSettings {
    /// Model identifier in provider/name form
    pub fn model_id(&self) -> String {
        format!("{}/{}", self.provider, self.name)
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: DEFAULT_MODEL_PROVIDER.to_string(),
            name: DEFAULT_MODEL_NAME.to_string(),
            proxy_url: DEFAULT_LITELLM_PROXY_URL.to_string(),
            api_key_env: Some("LITELLM_MASTER_KEY".to_string()),
            temperature: GENERATION_TEMPERATURE,
            max_tokens: GENERATION_MAX_TOKENS,
            timeout_secs: MODEL_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache root (defaults to the platform cache directory)
    pub directory: Option<PathBuf>,
    /// Lifetime of current-season API responses
    pub response_ttl_hours: u64,
    /// Lifetime of generated code snippets
    pub code_ttl_days: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: None,
            response_ttl_hours: RESPONSE_CACHE_TTL_HOURS,
            code_ttl_days: CODE_CACHE_TTL_DAYS,
        }
    }
}

/// Sandbox configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Wall-clock limit for one script run
    pub timeout_secs: u64,
    /// Engine operation budget for one script run
    pub max_operations: u64,
    /// Generation attempts before giving up
    pub max_attempts: u32,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_secs: SANDBOX_TIMEOUT_SECS,
            max_operations: SANDBOX_MAX_OPERATIONS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Load configuration from multiple sources
pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir()?;
    let global_config = config_dir.join("config.toml");
    let local_config = PathBuf::from(".dugout/config.toml");

    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    if global_config.exists() {
        figment = figment.merge(Toml::file(&global_config));
    }

    if local_config.exists() {
        figment = figment.merge(Toml::file(&local_config));
    }

    // Environment variables (DUGOUT_ prefix, __ for nesting: DUGOUT_MODEL__NAME)
    figment = figment.merge(Env::prefixed("DUGOUT_").split("__"));

    figment
        .extract()
        .context("Failed to load configuration")
}

/// Load configuration from an explicit file, still honouring environment overrides
pub fn load_config_from(path: &Path) -> Result<Config> {
    Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("DUGOUT_").split("__"))
        .extract()
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "dugout") {
        let config_dir = proj_dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;
        Ok(config_dir.to_path_buf())
    } else {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("Could not determine home directory")?;
        let config_dir = PathBuf::from(home).join(".config").join("dugout");
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }
}

/// Resolve the cache root from config or the platform cache directory
pub fn cache_root(config: &Config) -> Result<PathBuf> {
    if let Some(dir) = &config.cache.directory {
        return Ok(dir.clone());
    }
    // ~/.cache/dugout on Linux, ~/Library/Caches/dugout on macOS
    if let Some(proj_dirs) = ProjectDirs::from("", "", "dugout") {
        Ok(proj_dirs.cache_dir().to_path_buf())
    } else {
        let home = std::env::var("HOME").context("Could not determine home directory")?;
        Ok(PathBuf::from(home).join(".cache").join("dugout"))
    }
}

/// Save configuration to file
pub fn save_config(config: &Config, path: Option<PathBuf>) -> Result<()> {
    let path = if let Some(p) = path {
        p
    } else {
        get_config_dir()?.join("config.toml")
    };

    let toml_string = toml::to_string_pretty(config)?;
    std::fs::write(&path, toml_string)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}

/// Create a default configuration file if it doesn't exist
pub fn init_config() -> Result<PathBuf> {
    let config_file = get_config_dir()?.join("config.toml");

    if !config_file.exists() {
        save_config(&Config::default(), Some(config_file.clone()))?;
    }

    Ok(config_file)
}
