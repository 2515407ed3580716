//! Claudix bridge configuration
//!
//! Runtime knobs of the host bridge: the settings namespace, RPC timeouts,
//! session selection policy, where native settings are persisted and how
//! verbose logging is. Loaded from an optional TOML file layered under
//! `CLAUDIX_*` environment variables.

pub mod error;
pub mod manager;
pub mod types;

pub use error::{ConfigError, Result};
pub use manager::ConfigManager;
pub use types::{
    BridgeConfig, ConfigManager as ConfigManagerTrait, LoggingConfig, Namespace, RpcConfig, SessionConfig,
    SessionPolicy, SettingsConfig, DEFAULT_NAMESPACE,
};
