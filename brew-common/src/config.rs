//! Configuration loading and resolution
//!
//! Every setting follows the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable config file never aborts startup; it is logged
//! and the compiled defaults are used instead.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable overriding the backend base URL
pub const ENV_API_URL: &str = "BREW_TUNER_API_URL";
/// Environment variable holding the session token
pub const ENV_TOKEN: &str = "BREW_TUNER_TOKEN";
/// Environment variable pointing at an alternate config file
pub const ENV_CONFIG: &str = "BREW_TUNER_CONFIG";
/// Environment variable overriding the dataset directory
pub const ENV_DATA_DIR: &str = "BREW_TUNER_DATA_DIR";

/// Compiled fallback values
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub api_base_url: String,
    pub dataset_dir: PathBuf,
    pub poll_interval_ms: u64,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn new() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api/v1".to_string(),
            dataset_dir: PathBuf::from("data"),
            poll_interval_ms: 2000,
            log_level: "info".to_string(),
        }
    }
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging section of the TOML file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset (e.g. "info", "brew_tuner=debug")
    pub level: Option<String>,
}

/// On-disk configuration (`config.toml`)
///
/// ```toml
/// api_base_url = "https://coffee.example/api/v1"
/// token = "..."
/// dataset_dir = "/srv/coffee/data"
/// poll_interval_ms = 2000
///
/// [logging]
/// level = "debug"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TomlConfig {
    pub api_base_url: Option<String>,
    pub token: Option<String>,
    pub dataset_dir: Option<PathBuf>,
    pub poll_interval_ms: Option<u64>,
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Read and parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}

/// Fully resolved client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub token: Option<String>,
    pub dataset_dir: PathBuf,
    pub poll_interval: Duration,
    pub log_level: String,
}

/// Resolves [`ClientConfig`] from CLI overrides, environment, TOML and defaults
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli_api_url: Option<String>,
    cli_token: Option<String>,
    cli_config_path: Option<PathBuf>,
    cli_dataset_dir: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_url(mut self, url: Option<String>) -> Self {
        self.cli_api_url = url;
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.cli_token = token;
        self
    }

    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.cli_config_path = path;
        self
    }

    pub fn with_dataset_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.cli_dataset_dir = dir;
        self
    }

    /// Path of the TOML file that would be consulted, if any
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_config_path {
            return Some(path.clone());
        }
        if let Some(path) = non_empty_env(ENV_CONFIG) {
            return Some(PathBuf::from(path));
        }
        default_config_path()
    }

    pub fn resolve(&self) -> ClientConfig {
        let defaults = CompiledDefaults::new();
        let file = self.load_file();

        let api_base_url = self
            .cli_api_url
            .clone()
            .or_else(|| non_empty_env(ENV_API_URL))
            .or(file.api_base_url)
            .unwrap_or(defaults.api_base_url);

        let token = self
            .cli_token
            .clone()
            .or_else(|| non_empty_env(ENV_TOKEN))
            .or(file.token)
            .filter(|t| !t.trim().is_empty());

        let dataset_dir = self
            .cli_dataset_dir
            .clone()
            .or_else(|| non_empty_env(ENV_DATA_DIR).map(PathBuf::from))
            .or(file.dataset_dir)
            .unwrap_or(defaults.dataset_dir);

        let poll_interval_ms = match file.poll_interval_ms {
            Some(0) => {
                warn!("poll_interval_ms = 0 is not allowed, using {}", defaults.poll_interval_ms);
                defaults.poll_interval_ms
            }
            Some(ms) => ms,
            None => defaults.poll_interval_ms,
        };

        ClientConfig {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            token,
            dataset_dir,
            poll_interval: Duration::from_millis(poll_interval_ms),
            log_level: file.logging.level.unwrap_or(defaults.log_level),
        }
    }

    fn load_file(&self) -> TomlConfig {
        let Some(path) = self.config_path() else {
            debug!("No config directory for this platform, using defaults");
            return TomlConfig::default();
        };

        if !path.exists() {
            debug!("Config file {} not found, using defaults", path.display());
            return TomlConfig::default();
        }

        match TomlConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring config file: {}", e);
                TomlConfig::default()
            }
        }
    }
}

/// `<config dir>/brew-tuner/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("brew-tuner").join("config.toml"))
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
