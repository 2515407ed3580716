//! Built-in host commands and the command RPC service
//!
//! The built-ins are thin: they decode arguments, resolve URIs through the
//! [`IdeHost`] and hand the work to the UI thread. A resource the IDE cannot
//! resolve is logged and reported as a `null` result.

use std::sync::Arc;

use async_trait::async_trait;
use claudix_commands::{
    CommandArgs, CommandDescriptor, CommandError, CommandHandler, CommandRegistry, ReturnType,
};
use claudix_common::format_error;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::IdeError;
use crate::host::{IdeHost, UiAction};
use crate::rpc::{positional_arg, RpcFault, RpcHandler};
use crate::uri::{Uri, UriComponents};

/// Identifiers of the built-in commands
pub mod command_ids {
    pub const DIFF: &str = "_workbench.diff";
    pub const REVEAL_IN_EXPLORER: &str = "revealInExplorer";
    pub const REVEAL_FILE_IN_OS: &str = "revealFileInOS";
    pub const OPEN_SETTINGS: &str = "workbench.action.openSettings";
    pub const ENSURE_FILE: &str = "_claudix.ensureFile";
}

/// RPC method names served by [`CommandService`]
pub mod methods {
    pub const EXECUTE_COMMAND: &str = "$executeCommand";
    pub const GET_COMMANDS: &str = "$getCommands";
}

const BUILTINS: [(&str, &str, ReturnType); 5] = [
    (command_ids::DIFF, "openDiff", ReturnType::Void),
    (command_ids::REVEAL_IN_EXPLORER, "reveal", ReturnType::Void),
    (command_ids::REVEAL_FILE_IN_OS, "revealInOs", ReturnType::Void),
    (command_ids::OPEN_SETTINGS, "openSettings", ReturnType::Void),
    (command_ids::ENSURE_FILE, "ensureFile", ReturnType::Bool),
];

/// Register every built-in command against `host`
///
/// Stops at the first id that is already taken.
pub fn register_host_commands(
    registry: &CommandRegistry,
    host: Arc<dyn IdeHost>,
) -> claudix_commands::Result<()> {
    let handler: Arc<dyn CommandHandler> = Arc::new(HostCommands { host });
    for (id, method, return_type) in BUILTINS {
        let handler = handler.clone();
        registry.register(
            CommandDescriptor::with_factory(id, method, move || handler.clone())
                .with_return_type(return_type),
        )?;
    }
    Ok(())
}

struct HostCommands {
    host: Arc<dyn IdeHost>,
}

impl HostCommands {
    fn uri_arg(
        command: &str,
        args: &CommandArgs,
        index: usize,
        name: &str,
    ) -> claudix_commands::Result<Uri> {
        let components: UriComponents = args.required(command, index, name)?;
        Uri::from_components(&components)
            .map_err(|e| CommandError::invalid_arguments(command, e.to_string()))
    }

    async fn open_diff(&self, args: CommandArgs) -> claudix_commands::Result<Value> {
        let command = command_ids::DIFF;
        let left = Self::uri_arg(command, &args, 0, "left")?;
        let right = Self::uri_arg(command, &args, 1, "right")?;
        let title: Option<String> = args.optional(command, 2, "title")?;

        let outcome = async {
            let left = self.host.resolve_resource(&left).await?;
            let right = self.host.resolve_resource(&right).await?;
            self.host
                .run_on_ui_thread(UiAction::OpenDiff { left, right, title })
                .await
        }
        .await;
        Ok(absorb(command, outcome))
    }

    async fn reveal(&self, args: CommandArgs, in_os: bool) -> claudix_commands::Result<Value> {
        let command = if in_os {
            command_ids::REVEAL_FILE_IN_OS
        } else {
            command_ids::REVEAL_IN_EXPLORER
        };
        let uri = Self::uri_arg(command, &args, 0, "uri")?;

        let outcome = async {
            let resource = self.host.resolve_resource(&uri).await?;
            self.host
                .run_on_ui_thread(UiAction::Reveal { resource, in_os })
                .await
        }
        .await;
        Ok(absorb(command, outcome))
    }

    async fn open_settings(&self, args: CommandArgs) -> claudix_commands::Result<Value> {
        let command = command_ids::OPEN_SETTINGS;
        let query: Option<String> = args.optional(command, 0, "query")?;
        let outcome = self
            .host
            .run_on_ui_thread(UiAction::OpenSettings { query })
            .await;
        Ok(absorb(command, outcome))
    }

    async fn ensure_file(&self, args: CommandArgs) -> claudix_commands::Result<Value> {
        let command = command_ids::ENSURE_FILE;
        let uri = Self::uri_arg(command, &args, 0, "uri")?;

        let outcome = async {
            if !self.host.file_exists(&uri).await? {
                debug!(uri = %uri, "Creating missing file");
                self.host.create_file(&uri).await?;
            }
            self.host.file_exists(&uri).await
        }
        .await;

        match outcome {
            Ok(exists) => Ok(Value::Bool(exists)),
            Err(e) => Ok(absorb(command, Err(e))),
        }
    }
}

fn absorb(command: &str, outcome: Result<(), IdeError>) -> Value {
    if let Err(e) = outcome {
        warn!(command, error = %format_error(&e), "Host command could not complete");
    }
    Value::Null
}

#[async_trait]
impl CommandHandler for HostCommands {
    async fn call(&self, method: &str, args: CommandArgs) -> claudix_commands::Result<Value> {
        match method {
            "openDiff" => self.open_diff(args).await,
            "reveal" => self.reveal(args, false).await,
            "revealInOs" => self.reveal(args, true).await,
            "openSettings" => self.open_settings(args).await,
            "ensureFile" => self.ensure_file(args).await,
            other => Err(CommandError::UnknownMethod {
                command: "host".to_string(),
                method: other.to_string(),
            }),
        }
    }
}

/// Lets the extension runtime run registered commands over RPC
pub struct CommandService {
    registry: Arc<CommandRegistry>,
}

impl CommandService {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl RpcHandler for CommandService {
    async fn handle(&self, method: &str, args: Value) -> Result<Value, RpcFault> {
        match method {
            methods::EXECUTE_COMMAND => {
                let id: String = positional_arg(&args, 0, "id")?;
                let command_args = CommandArgs::from_value(
                    args.as_array()
                        .and_then(|items| items.get(1))
                        .cloned()
                        .unwrap_or(Value::Null),
                );
                self.registry
                    .invoke(&id, command_args)
                    .await
                    .map_err(|e| match e {
                        CommandError::NotFound(_) => {
                            RpcFault::new(RpcFault::METHOD_NOT_FOUND, e.to_string())
                        }
                        CommandError::InvalidArguments { .. } => RpcFault::invalid_params(e.to_string()),
                        other => RpcFault::internal(other.to_string()),
                    })
            }
            methods::GET_COMMANDS => Ok(json!(self.registry.list())),
            other => Err(RpcFault::method_not_found(other)),
        }
    }
}
