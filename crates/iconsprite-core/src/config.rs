use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
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

/// Main configuration for IconSprite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpriteConfig {
    /// Class attribute for the aggregate container; empty omits the attribute
    #[serde(default)]
    pub class: String,

    /// File name of the emitted sprite artifact
    #[serde(default = "default_output")]
    pub output: String,

    /// Upper bound on icon resolutions running in parallel during one compose
    #[serde(default = "default_max_concurrent_loads")]
    pub max_concurrent_loads: usize,

    /// Icon source directory per reference prefix
    #[serde(default)]
    pub prefixes: BTreeMap<String, PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Project scanning settings used by the command-line host
    #[serde(default)]
    pub scan: ScanConfig,
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self {
            class: String::new(),
            output: default_output(),
            max_concurrent_loads: default_max_concurrent_loads(),
            prefixes: BTreeMap::new(),
            logging: LoggingConfig::default(),
            scan: ScanConfig::default(),
        }
    }
}

impl SpriteConfig {
    /// Convenience builder used by tests and embedding hosts
    pub fn with_prefix(mut self, prefix: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.prefixes.insert(prefix.into(), dir.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = class.into();
        self
    }

    pub fn prefix_names(&self) -> Vec<&str> {
        self.prefixes.keys().map(String::as_str).collect()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "pretty", "compact"
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// File extensions (without the dot) whose contents are scanned for references
    #[serde(default = "default_include_extensions")]
    pub include_extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            include_extensions: default_include_extensions(),
        }
    }
}

fn default_output() -> String {
    "sprite.svg".to_string()
}
fn default_max_concurrent_loads() -> usize {
    16
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}
fn default_include_extensions() -> Vec<String> {
    ["html", "md", "js", "jsx", "ts", "tsx", "vue", "svelte", "njk", "hbs"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Configuration manager with file discovery and environment overrides
pub struct ConfigManager {
    config: SpriteConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables
    /// 2. Config file (./iconsprite.toml, then ~/.config/iconsprite/config.toml)
    /// 3. Defaults
    pub fn load() -> Result<Self, ConfigError> {
        let local = Path::new("iconsprite.toml");
        if local.exists() {
            return Self::load_from(local);
        }
        if let Some(dir) = dirs::config_dir() {
            let user = dir.join("iconsprite").join("config.toml");
            if user.exists() {
                return Self::load_from(&user);
            }
        }

        info!("No config file found, using defaults");
        let config = Self::apply_env_overrides(SpriteConfig::default());
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: None,
        })
    }

    /// Load a specific config file, then apply environment overrides
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let mut config = Self::read_toml_file(path)?;
        if let Some(base) = path.parent() {
            Self::resolve_relative_dirs(&mut config, base);
        }
        let config = Self::apply_env_overrides(config);
        Self::validate_config(&config)?;

        info!(
            "Loaded configuration from {} ({} prefixes)",
            path.display(),
            config.prefixes.len()
        );
        Ok(Self {
            config,
            config_path: Some(path.to_path_buf()),
        })
    }

    /// Read TOML config file
    fn read_toml_file(path: &Path) -> Result<SpriteConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<SpriteConfig, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn resolve_relative_dirs(config: &mut SpriteConfig, base: &Path) {
        for dir in config.prefixes.values_mut() {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: SpriteConfig) -> SpriteConfig {
        if let Ok(class) = std::env::var("ICONSPRITE_CLASS") {
            config.class = class;
        }
        if let Ok(output) = std::env::var("ICONSPRITE_OUTPUT") {
            config.output = output;
        }
        if let Ok(limit) = std::env::var("ICONSPRITE_MAX_CONCURRENT_LOADS") {
            match limit.parse() {
                Ok(n) => config.max_concurrent_loads = n,
                Err(_) => warn!("Ignoring ICONSPRITE_MAX_CONCURRENT_LOADS={}", limit),
            }
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.logging.level = level;
        }
        config
    }

    /// Validate configuration
    pub fn validate_config(config: &SpriteConfig) -> Result<(), ConfigError> {
        for prefix in config.prefixes.keys() {
            if prefix.is_empty() || prefix.contains(crate::types::ID_SEPARATOR) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid prefix {:?}: must be non-empty and must not contain '{}'",
                    prefix,
                    crate::types::ID_SEPARATOR
                )));
            }
        }

        if config.max_concurrent_loads == 0 {
            return Err(ConfigError::ValidationError(
                "max_concurrent_loads must be at least 1".to_string(),
            ));
        }

        if config.output.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "output must name a file".to_string(),
            ));
        }

        // RUST_LOG may carry directives; only plain levels are checked
        let level = config.logging.level.as_str();
        if !level.contains('=') && !level.contains(',') {
            match level {
                "trace" | "debug" | "info" | "warn" | "error" => {}
                other => {
                    return Err(ConfigError::ValidationError(format!(
                        "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                        other
                    )))
                }
            }
        }

        Ok(())
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &SpriteConfig {
        &self.config
    }

    pub fn into_config(self) -> SpriteConfig {
        self.config
    }

    /// Get the path to the config file that was loaded, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Create a default config file
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let mut config = SpriteConfig::default();
        config.prefixes.insert("icons".to_string(), PathBuf::from("icons"));
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            }
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}
