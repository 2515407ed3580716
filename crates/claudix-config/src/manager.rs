//! Configuration manager implementation

use std::path::{Path, PathBuf};

use claudix_common::LogLevel;
use config::{Config, Environment, File, FileFormat};
use tracing::debug;

use crate::{
    error::{ConfigError, Result},
    types::{BridgeConfig, ConfigManager as ConfigManagerTrait},
};

/// Configuration manager
pub struct ConfigManager {
    /// Configuration file path
    config_path: PathBuf,
    /// Environment prefix
    env_prefix: String,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
            env_prefix: "CLAUDIX".to_string(),
        }
    }

    /// Create with custom config path
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            config_path: path,
            env_prefix: "CLAUDIX".to_string(),
        }
    }

    /// Override the environment variable prefix
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Path the manager reads from and writes to
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get default config path
    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("claudix")
            .join("bridge.toml")
    }
}

impl ConfigManagerTrait for ConfigManager {
    fn load_config(&mut self) -> Result<BridgeConfig> {
        debug!(path = %self.config_path.display(), "Loading bridge configuration");

        // Nested keys use a double underscore: CLAUDIX_RPC__TIMEOUT_MS
        let builder = Config::builder()
            .add_source(
                File::from(self.config_path.clone())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        let bridge_config: BridgeConfig = config.try_deserialize()?;
        self.validate_config(&bridge_config)?;
        Ok(bridge_config)
    }

    fn save_config(&self, config: &BridgeConfig) -> Result<()> {
        self.validate_config(config)?;
        let toml = toml::to_string(config)?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.config_path, toml)?;
        Ok(())
    }

    fn validate_config(&self, config: &BridgeConfig) -> Result<()> {
        let namespace = config.namespace.as_str();
        if namespace.is_empty() {
            return Err(ConfigError::Validation(
                "Namespace must not be empty".to_string(),
            ));
        }
        if namespace.contains('.') || namespace.chars().any(char::is_whitespace) {
            return Err(ConfigError::Validation(format!(
                "Namespace '{}' must be a single segment without dots or whitespace",
                namespace
            )));
        }
        if config.rpc.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "RPC timeout must be greater than 0".to_string(),
            ));
        }
        if config.logging.level.parse::<LogLevel>().is_err() {
            return Err(ConfigError::Validation(format!(
                "Unknown log level '{}'",
                config.logging.level
            )));
        }
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
