//! Core configuration types and data structures

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Namespace every bridge-owned settings key lives under
pub const DEFAULT_NAMESPACE: &str = "claudix";

/// Main bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Settings namespace
    pub namespace: Namespace,
    /// RPC configuration
    pub rpc: RpcConfig,
    /// Session selection configuration
    pub sessions: SessionConfig,
    /// Native settings persistence
    pub settings: SettingsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Settings key namespace (e.g. `claudix` in `claudix.selectedModel`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Namespace(pub String);

impl Namespace {
    /// Borrow the namespace string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build a fully qualified key such as `claudix.selectedModel`
    pub fn key(&self, name: &str) -> String {
        format!("{}.{}", self.0, name)
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Namespace(DEFAULT_NAMESPACE.to_string())
    }
}

/// RPC configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RpcConfig {
    /// Upper bound for a single remote call in milliseconds
    pub timeout_ms: u64,
}

impl RpcConfig {
    /// Timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

/// How the sync bridge picks a session when several are live
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionPolicy {
    /// First initialized, undisposed session in enumeration order
    #[default]
    FirstActive,
    /// Initialized, undisposed session whose window was focused last
    MostRecentlyFocused,
}

/// Session selection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SessionConfig {
    /// Selection policy
    pub policy: SessionPolicy,
}

/// Native settings persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SettingsConfig {
    /// Settings document path; `None` uses the platform config directory
    pub path: Option<PathBuf>,
}

impl SettingsConfig {
    /// Resolve the settings document path
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => path.clone(),
            None => dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(DEFAULT_NAMESPACE)
                .join("settings.json"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level (`trace`, `debug`, `info`, `warn`, `error`)
    pub level: String,
    /// Include targets, thread ids and source locations
    pub debug: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            debug: false,
        }
    }
}

/// Configuration manager trait
pub trait ConfigManager {
    /// Load configuration
    fn load_config(&mut self) -> Result<BridgeConfig, crate::error::ConfigError>;
    /// Save configuration
    fn save_config(&self, config: &BridgeConfig) -> Result<(), crate::error::ConfigError>;
    /// Validate configuration
    fn validate_config(&self, config: &BridgeConfig) -> Result<(), crate::error::ConfigError>;
}
