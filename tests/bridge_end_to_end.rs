//! Host and extension runtime wired together over one in-memory channel
//!
//! The host serves the built-in commands, the runtime serves its layered
//! configuration, and each side calls the other.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use claudix_commands::CommandRegistry;
use claudix_common::{init_logging, LogLevel};
use claudix_config::{BridgeConfig, ConfigManager, ConfigManagerTrait, Namespace};
use claudix_ide::*;
use parking_lot::Mutex;
use serde_json::{json, Value};

/// Host backed by the real file system
#[derive(Default)]
struct FsHost {
    actions: Mutex<Vec<UiAction>>,
}

#[async_trait]
impl IdeHost for FsHost {
    async fn file_exists(&self, uri: &Uri) -> IdeResult<bool> {
        Ok(uri.fs_path()?.is_file())
    }

    async fn create_file(&self, uri: &Uri) -> IdeResult<()> {
        let path = uri.fs_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::File::create(&path)?;
        Ok(())
    }

    async fn resolve_resource(&self, uri: &Uri) -> IdeResult<ResourceHandle> {
        let path = uri.fs_path()?;
        if path.exists() {
            Ok(ResourceHandle {
                uri: uri.clone(),
                path,
            })
        } else {
            Err(IdeError::resource_access(format!("{} does not exist", uri)))
        }
    }

    async fn run_on_ui_thread(&self, action: UiAction) -> IdeResult<()> {
        self.actions.lock().push(action);
        Ok(())
    }
}

struct Wired {
    host: Arc<FsHost>,
    session: Arc<Session>,
    sessions: Arc<SessionRegistry>,
    configuration: Arc<LayeredConfiguration>,
    runtime: RpcChannel,
}

fn wire() -> Result<Wired> {
    let (host_end, runtime_end) = MemoryTransport::pair();

    let host = Arc::new(FsHost::default());
    let registry = Arc::new(CommandRegistry::new());
    register_host_commands(&registry, host.clone())?;
    let host_router = RpcRouter::new().with_handler(Arc::new(CommandService::new(registry)));
    let host_channel = Arc::new(RpcChannel::spawn(
        Arc::new(host_end),
        Some(Arc::new(host_router)),
    ));

    let configuration = Arc::new(LayeredConfiguration::new());
    let runtime_router = RpcRouter::new().with_handler(serve_configuration(configuration.clone()));
    let runtime = RpcChannel::spawn(Arc::new(runtime_end), Some(Arc::new(runtime_router)));

    let session = Arc::new(Session::new("main-window").with_channel(host_channel));
    let sessions = Arc::new(SessionRegistry::new());
    sessions.add(session.clone());

    Ok(Wired {
        host,
        session,
        sessions,
        configuration,
        runtime,
    })
}

fn file_arg(path: &Path) -> Result<Value> {
    Ok(serde_json::to_value(Uri::file(path)?)?)
}

#[tokio::test]
async fn test_settings_flow_from_ide_to_runtime() -> Result<()> {
    init_logging(LogLevel::Debug, false);
    let dir = tempfile::tempdir()?;
    let wired = wire()?;

    let store = Arc::new(JsonSettingsStore::new(
        dir.path().join("settings.json"),
        Namespace::default(),
    ));
    let bridge = SettingsSyncBridge::new(store, wired.sessions.clone(), BridgeConfig::default());

    bridge.initialize_session(&wired.session).await?;
    assert_eq!(
        wired
            .configuration
            .resolve("claudix.selectedModel", None, false)
            .await,
        Some(json!("default"))
    );

    let outcome = bridge
        .apply(SettingsState {
            selected_model: "claude-3-5-sonnet".to_string(),
            environment_variables: vec![EnvironmentVariable::new("ANTHROPIC_BASE_URL", "http://localhost")],
        })
        .await?;
    assert!(outcome.is_propagated());

    // The runtime reads its configuration the way an extension would
    assert_eq!(
        wired
            .configuration
            .resolve("selectedModel", Some("claudix"), false)
            .await,
        Some(json!("claude-3-5-sonnet"))
    );
    assert_eq!(
        wired.configuration.resolve("claudix", None, false).await,
        Some(json!({
            "selectedModel": "claude-3-5-sonnet",
            "environmentVariables": [{"name": "ANTHROPIC_BASE_URL", "value": "http://localhost"}]
        }))
    );
    Ok(())
}

#[tokio::test]
async fn test_runtime_executes_host_commands() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let wired = wire()?;
    let options = CallOptions::default();
    let target = dir.path().join("notes").join("todo.md");

    let commands = wired
        .runtime
        .call("$getCommands", Value::Null, &options)
        .await?;
    let commands: Vec<String> = serde_json::from_value(commands)?;
    assert!(commands.contains(&command_ids::DIFF.to_string()));
    assert!(commands.contains(&command_ids::ENSURE_FILE.to_string()));

    // Revealing a file that does not exist yet is a silent no-op
    let revealed = wired
        .runtime
        .call(
            "$executeCommand",
            json!([command_ids::REVEAL_IN_EXPLORER, [file_arg(&target)?]]),
            &options,
        )
        .await?;
    assert_eq!(revealed, Value::Null);
    assert!(wired.host.actions.lock().is_empty());

    let created = wired
        .runtime
        .call(
            "$executeCommand",
            json!([command_ids::ENSURE_FILE, [file_arg(&target)?]]),
            &options,
        )
        .await?;
    assert_eq!(created, json!(true));
    assert!(target.is_file());

    wired
        .runtime
        .call(
            "$executeCommand",
            json!([command_ids::REVEAL_FILE_IN_OS, [file_arg(&target)?]]),
            &options,
        )
        .await?;
    match wired.host.actions.lock().as_slice() {
        [UiAction::Reveal { resource, in_os }] => {
            assert!(*in_os);
            assert_eq!(resource.path, target);
        }
        other => panic!("unexpected UI actions: {:?}", other),
    }

    let missing = wired
        .runtime
        .call("$executeCommand", json!(["claudix.unknown", []]), &options)
        .await;
    assert!(matches!(missing, Err(IdeError::RemoteCall(ref msg)) if msg.contains("-32601")));
    Ok(())
}

#[tokio::test]
async fn test_bridge_configured_from_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config_path = dir.path().join("bridge.toml");
    let settings_path = dir.path().join("state").join("settings.json");
    std::fs::write(
        &config_path,
        format!(
            "namespace = \"acme\"\n\n[rpc]\ntimeout_ms = 1500\n\n[settings]\npath = {:?}\n",
            settings_path.to_string_lossy()
        ),
    )?;

    let mut manager =
        ConfigManager::with_path(config_path).with_env_prefix("CLAUDIX_E2E_UNSET");
    let config = manager.load_config()?;
    assert_eq!(config.namespace.as_str(), "acme");
    assert_eq!(config.rpc.timeout_ms, 1500);

    let wired = wire()?;
    wired.session.mark_initialized();
    let store = Arc::new(JsonSettingsStore::new(
        config.settings.resolved_path(),
        config.namespace.clone(),
    ));
    let bridge = SettingsSyncBridge::new(store, wired.sessions.clone(), config);

    let outcome = bridge
        .apply(SettingsState {
            selected_model: "opus".to_string(),
            environment_variables: Vec::new(),
        })
        .await?;
    assert!(outcome.is_propagated());

    let document: Value = serde_json::from_str(&std::fs::read_to_string(&settings_path)?)?;
    assert_eq!(document["acme.selectedModel"], json!("opus"));
    assert_eq!(
        bridge.get_configuration("acme.selectedModel", None, false).await?,
        Some(json!("opus"))
    );
    Ok(())
}
