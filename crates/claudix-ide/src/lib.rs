//! Claudix IDE bridge
//!
//! Connects the host IDE to an out-of-process extension runtime: the RPC
//! channel between them, the layered configuration model the runtime reads,
//! the built-in host commands, and the bridge that syncs IDE-native settings
//! into the runtime's configuration.

pub mod configuration_model;
pub mod configuration_proxy;
pub mod error;
pub mod host;
pub mod host_commands;
pub mod layered_configuration;
pub mod rpc;
pub mod session;
pub mod settings;
pub mod sync_bridge;
pub mod uri;

// Re-export commonly used types
pub use configuration_model::{
    validate_model, ConfigurationChange, ConfigurationContents, ConfigurationLayer,
    ConfigurationModel, ConfigurationOverride, ConfigurationTarget, FolderConfiguration,
    OverrideChange,
};
pub use configuration_proxy::{
    serve_configuration, ConfigurationProxy, ConfigurationService, RemoteConfigurationProxy,
};
pub use error::{IdeError, IdeResult};
pub use host::{IdeHost, ResourceHandle, UiAction};
pub use host_commands::{command_ids, register_host_commands, CommandService};
pub use layered_configuration::LayeredConfiguration;
pub use rpc::{
    CallOptions, MemoryTransport, RpcChannel, RpcFault, RpcHandler, RpcMessage, RpcRouter,
    RpcTransport,
};
pub use session::{select_session, Session, SessionProvider, SessionRegistry};
pub use settings::{
    EnvironmentVariable, JsonSettingsStore, MemorySettingsStore, SettingsState, SettingsStore,
};
pub use sync_bridge::{SettingsSyncBridge, SyncOutcome};
pub use uri::{Uri, UriComponents};
