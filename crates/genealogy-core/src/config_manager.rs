use crate::{GenealogyError, PreferredSource, ViewMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for GenealogyError {
    fn from(err: ConfigError) -> Self {
        GenealogyError::Config(err.to_string())
    }
}

/// Main configuration for the genealogy engine
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenealogyConfig {
    /// Remote endpoint configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Request cache settings
    #[serde(default)]
    pub cache: CacheSettings,

    /// Navigation behaviour
    #[serde(default)]
    pub navigation: NavigationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote genealogy API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL, e.g. "https://portal.example.com"
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Matrix (placement) tree endpoint
    #[serde(default = "default_matrix_tree_path")]
    pub matrix_tree_path: String,

    /// Sponsor (referral) tree endpoint
    #[serde(default = "default_sponsor_tree_path")]
    pub sponsor_tree_path: String,

    /// Identifier to node id resolution endpoint
    #[serde(default = "default_resolve_root_path")]
    pub resolve_root_path: String,

    /// Default admin root endpoint
    #[serde(default = "default_admin_root_path")]
    pub default_root_path: String,

    /// Bearer token sent with every request
    #[serde(default)]
    pub api_token: Option<String>,

    /// Upper bound for one call in seconds, retries included
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry, doubled for each further retry (ms)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            matrix_tree_path: default_matrix_tree_path(),
            sponsor_tree_path: default_sponsor_tree_path(),
            resolve_root_path: default_resolve_root_path(),
            default_root_path: default_admin_root_path(),
            api_token: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Short-lived cache for identical requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// How long an identical request is answered from memory (seconds)
    #[serde(default = "default_response_ttl_secs")]
    pub response_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            response_ttl_secs: default_response_ttl_secs(),
        }
    }
}

/// Navigation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// "admin" or "self"
    #[serde(default)]
    pub mode: ViewMode,

    /// "matrix", "sponsor" or "auto" (admin mode only)
    #[serde(default)]
    pub preferred_source: PreferredSource,

    /// Levels fetched per tree request, root included
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Children shown under the current root
    #[serde(default = "default_branching_factor")]
    pub branching_factor: usize,

    /// Load the default admin root on mount instead of waiting for a search
    #[serde(default)]
    pub auto_load_default_root: bool,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            mode: ViewMode::default(),
            preferred_source: PreferredSource::default(),
            max_depth: default_max_depth(),
            branching_factor: default_branching_factor(),
            auto_load_default_root: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "pretty", "json", "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

// Default value functions
fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_matrix_tree_path() -> String {
    "/api/genealogy/matrix-tree".to_string()
}
fn default_sponsor_tree_path() -> String {
    "/api/genealogy/sponsor-tree".to_string()
}
fn default_resolve_root_path() -> String {
    "/api/genealogy/resolve-root".to_string()
}
fn default_admin_root_path() -> String {
    "/api/genealogy/default-root".to_string()
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_backoff_ms() -> u64 {
    250
}
fn default_response_ttl_secs() -> u64 {
    30
}
fn default_max_depth() -> u32 {
    6
} // root plus five levels of children
fn default_branching_factor() -> usize {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

/// Configuration manager with layered sources
pub struct ConfigManager {
    config: GenealogyConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (.genealogy.toml)
    /// 3. Sensible defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_dotenv();

        let (config, config_path) = Self::load_config_file()?;
        Self::finish(config, config_path)
    }

    /// Load an explicit config file, still honouring environment overrides.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        Self::load_dotenv();

        let config = Self::read_toml_file(path)?;
        Self::finish(config, Some(path.to_path_buf()))
    }

    /// Wrap an already-built configuration after validating it.
    pub fn from_config(config: GenealogyConfig) -> Result<Self, ConfigError> {
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: None,
        })
    }

    fn finish(config: GenealogyConfig, config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = Self::apply_env_overrides(config);
        Self::validate_config(&config)?;

        info!("Configuration loaded");
        match config_path {
            Some(ref path) => info!("   Config file: {}", path.display()),
            None => info!("   Config file: NONE (using defaults)"),
        }
        info!("   API base URL: {}", config.api.base_url);
        info!(
            "   Mode: {}, preferred source: {}",
            config.navigation.mode, config.navigation.preferred_source
        );

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Load .env file if it exists
    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            }
            return;
        }

        if let Some(home) = dirs::home_dir() {
            let home_env = home.join(".genealogy.env");
            if home_env.exists() {
                if let Err(e) = dotenv::from_path(&home_env) {
                    warn!("Failed to load .genealogy.env: {}", e);
                }
            }
        }
    }

    /// Find and load config file
    /// Search order:
    /// 1. ./.genealogy.toml (current directory)
    /// 2. ~/.genealogy/config.toml (user config)
    /// 3. Use defaults
    fn load_config_file() -> Result<(GenealogyConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(".genealogy.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".genealogy").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        Ok((GenealogyConfig::default(), None))
    }

    /// Read TOML config file
    fn read_toml_file(path: &Path) -> Result<GenealogyConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config: GenealogyConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: GenealogyConfig) -> GenealogyConfig {
        // API
        if let Ok(url) = std::env::var("GENEALOGY_BASE_URL") {
            config.api.base_url = url;
        }
        if let Ok(token) = std::env::var("GENEALOGY_API_TOKEN") {
            config.api.api_token = Some(token);
        }
        if let Ok(timeout) = std::env::var("GENEALOGY_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                config.api.timeout_secs = secs;
            }
        }
        if let Ok(retries) = std::env::var("GENEALOGY_MAX_RETRIES") {
            if let Ok(n) = retries.parse() {
                config.api.max_retries = n;
            }
        }

        // Cache
        if let Ok(ttl) = std::env::var("GENEALOGY_CACHE_TTL_SECS") {
            if let Ok(secs) = ttl.parse() {
                config.cache.response_ttl_secs = secs;
            }
        }

        // Navigation
        if let Ok(mode) = std::env::var("GENEALOGY_MODE") {
            match mode.parse() {
                Ok(mode) => config.navigation.mode = mode,
                Err(e) => warn!("Ignoring GENEALOGY_MODE: {}", e),
            }
        }
        if let Ok(source) = std::env::var("GENEALOGY_SOURCE") {
            match source.parse() {
                Ok(source) => config.navigation.preferred_source = source,
                Err(e) => warn!("Ignoring GENEALOGY_SOURCE: {}", e),
            }
        }
        if let Ok(depth) = std::env::var("GENEALOGY_MAX_DEPTH") {
            if let Ok(d) = depth.parse() {
                config.navigation.max_depth = d;
            }
        }

        // Logging. Directive lists ("genealogy_client=debug") are left to the
        // subscriber's EnvFilter.
        if let Ok(level) = std::env::var("RUST_LOG") {
            let level = level.trim().to_lowercase();
            if LOG_LEVELS.contains(&level.as_str()) {
                config.logging.level = level;
            }
        }

        config
    }

    /// Validate configuration
    fn validate_config(config: &GenealogyConfig) -> Result<(), ConfigError> {
        if config.api.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "api.base_url must not be empty".to_string(),
            ));
        }

        if config.navigation.max_depth == 0 {
            return Err(ConfigError::ValidationError(
                "navigation.max_depth must be at least 1".to_string(),
            ));
        }

        if config.navigation.branching_factor == 0 {
            return Err(ConfigError::ValidationError(
                "navigation.branching_factor must be at least 1".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                config.logging.level
            )));
        }

        match config.logging.format.as_str() {
            "pretty" | "json" | "compact" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, json, compact",
                    other
                )))
            }
        }

        Ok(())
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &GenealogyConfig {
        &self.config
    }

    /// Get the path to the config file that was loaded, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Create a default config file
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = GenealogyConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GenealogyConfig::default();
        assert_eq!(config.navigation.max_depth, 6);
        assert_eq!(config.navigation.branching_factor, 5);
        assert_eq!(config.navigation.mode, ViewMode::Admin);
        assert_eq!(config.navigation.preferred_source, PreferredSource::Auto);
        assert!(!config.navigation.auto_load_default_root);
    }

    #[test]
    fn test_config_validation() {
        let config = GenealogyConfig::default();
        assert!(ConfigManager::validate_config(&config).is_ok());

        let mut bad_config = config.clone();
        bad_config.navigation.max_depth = 0;
        assert!(ConfigManager::validate_config(&bad_config).is_err());

        let mut bad_config = config.clone();
        bad_config.logging.format = "xml".to_string();
        assert!(ConfigManager::validate_config(&bad_config).is_err());

        let mut bad_config = config;
        bad_config.api.base_url = "  ".to_string();
        assert!(ConfigManager::validate_config(&bad_config).is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: GenealogyConfig = toml::from_str(
            r#"
            [navigation]
            mode = "self"
            "#,
        )
        .unwrap();
        assert_eq!(config.navigation.mode, ViewMode::SelfScoped);
        assert_eq!(config.navigation.max_depth, 6);
        assert_eq!(config.api.max_retries, 2);
    }
}
