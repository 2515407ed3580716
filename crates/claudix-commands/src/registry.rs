use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{CommandError, Result};
use crate::types::{CommandArgs, CommandDescriptor};

static GLOBAL_REGISTRY: Lazy<Arc<CommandRegistry>> = Lazy::new(|| Arc::new(CommandRegistry::new()));

#[derive(Default)]
struct RegistryTable {
    by_id: HashMap<String, Arc<CommandDescriptor>>,
    order: Vec<String>,
}

/// Registry mapping command ids to their handlers
///
/// Registration is first-wins: a second descriptor with an id already in the
/// table is rejected with [`CommandError::DuplicateCommand`]. The table lock
/// is never held across a handler's `.await`.
pub struct CommandRegistry {
    table: RwLock<RegistryTable>,
}

impl CommandRegistry {
    /// Create a new empty command registry
    pub fn new() -> Self {
        Self {
            table: RwLock::new(RegistryTable::default()),
        }
    }

    /// Process-wide registry shared by the host integration
    pub fn global() -> Arc<CommandRegistry> {
        GLOBAL_REGISTRY.clone()
    }

    /// Register a command
    pub fn register(&self, descriptor: CommandDescriptor) -> Result<()> {
        if descriptor.id.is_empty() || descriptor.id.chars().any(char::is_whitespace) {
            return Err(CommandError::InvalidCommandId(format!(
                "'{}' must be non-empty and contain no whitespace",
                descriptor.id
            )));
        }
        if descriptor.method.is_empty() {
            return Err(CommandError::InvalidCommandId(format!(
                "'{}' has an empty method name",
                descriptor.id
            )));
        }

        let mut table = self.table.write();
        if table.by_id.contains_key(&descriptor.id) {
            warn!(command = %descriptor.id, "Rejecting duplicate command registration");
            return Err(CommandError::DuplicateCommand(descriptor.id));
        }

        info!(command = %descriptor.id, method = %descriptor.method, "Registered command");
        table.order.push(descriptor.id.clone());
        table
            .by_id
            .insert(descriptor.id.clone(), Arc::new(descriptor));
        Ok(())
    }

    /// Get a command by id
    pub fn lookup(&self, command_id: &str) -> Result<Arc<CommandDescriptor>> {
        self.table
            .read()
            .by_id
            .get(command_id)
            .cloned()
            .ok_or_else(|| CommandError::NotFound(command_id.to_string()))
    }

    /// Dispatch a command and return its result
    pub async fn invoke(&self, command_id: &str, args: CommandArgs) -> Result<Value> {
        let descriptor = self.lookup(command_id)?;
        let handler = descriptor.handler();

        debug!(
            command = %descriptor.id,
            method = %descriptor.method,
            positional = args.positional.len(),
            named = args.named.len(),
            "Invoking command"
        );

        let value = match handler.call(&descriptor.method, args).await {
            Ok(value) => value,
            Err(e) => {
                warn!(command = %descriptor.id, error = %e, "Command failed");
                return Err(e);
            }
        };

        if let Some(expected) = descriptor.return_type {
            if !expected.accepts(&value) {
                return Err(CommandError::InvalidReturn {
                    command: descriptor.id.clone(),
                    expected: expected.to_string(),
                    actual: json_kind(&value).to_string(),
                });
            }
        }

        Ok(value)
    }

    /// Check if a command exists
    pub fn contains(&self, command_id: &str) -> bool {
        self.table.read().by_id.contains_key(command_id)
    }

    /// Command ids in registration order
    pub fn list(&self) -> Vec<String> {
        self.table.read().order.clone()
    }

    /// Get the number of registered commands
    pub fn len(&self) -> usize {
        self.table.read().by_id.len()
    }

    /// Whether no command is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{handler_fn, CommandHandler};
    use crate::types::ReturnType;
    use serde_json::json;

    fn constant(value: Value) -> Arc<dyn CommandHandler> {
        handler_fn(move |_args| {
            let value = value.clone();
            async move { Ok::<_, CommandError>(value) }
        })
    }

    #[test]
    fn test_register_command() {
        let registry = CommandRegistry::new();
        let cmd = CommandDescriptor::new("test", "run", constant(Value::Null));
        assert!(registry.register(cmd).is_ok());
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("test"));
    }

    #[test]
    fn test_register_duplicate_command() {
        let registry = CommandRegistry::new();
        let cmd1 = CommandDescriptor::new("test", "run", constant(json!(1)));
        let cmd2 = CommandDescriptor::new("test", "run", constant(json!(2)));
        assert!(registry.register(cmd1).is_ok());
        assert!(matches!(
            registry.register(cmd2),
            Err(CommandError::DuplicateCommand(id)) if id == "test"
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_invalid_ids() {
        let registry = CommandRegistry::new();
        assert!(registry
            .register(CommandDescriptor::new("", "run", constant(Value::Null)))
            .is_err());
        assert!(registry
            .register(CommandDescriptor::new("has space", "run", constant(Value::Null)))
            .is_err());
        assert!(registry
            .register(CommandDescriptor::new("ok", "", constant(Value::Null)))
            .is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lookup_nonexistent_command() {
        let registry = CommandRegistry::new();
        assert!(matches!(
            registry.lookup("nonexistent"),
            Err(CommandError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_preserves_registration_order() {
        let registry = CommandRegistry::new();
        for id in ["b", "a", "c"] {
            registry
                .register(CommandDescriptor::new(id, "run", constant(Value::Null)))
                .unwrap();
        }
        assert_eq!(registry.list(), vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_invoke_first_registration_wins() {
        let registry = CommandRegistry::new();
        registry
            .register(CommandDescriptor::new("cmd", "run", constant(json!("first"))))
            .unwrap();
        let _ = registry.register(CommandDescriptor::new("cmd", "run", constant(json!("second"))));

        let result = registry.invoke("cmd", CommandArgs::new()).await.unwrap();
        assert_eq!(result, json!("first"));
    }

    #[tokio::test]
    async fn test_invoke_checks_return_type() {
        let registry = CommandRegistry::new();
        registry
            .register(
                CommandDescriptor::new("flag", "run", constant(json!("not a bool")))
                    .with_return_type(ReturnType::Bool),
            )
            .unwrap();

        assert!(matches!(
            registry.invoke("flag", CommandArgs::new()).await,
            Err(CommandError::InvalidReturn { .. })
        ));
    }

    #[tokio::test]
    async fn test_invoke_propagates_handler_error() {
        let registry = CommandRegistry::new();
        registry
            .register(CommandDescriptor::new(
                "boom",
                "run",
                handler_fn(|_args| async { Err::<Value, _>(CommandError::handler("exploded")) }),
            ))
            .unwrap();

        assert!(matches!(
            registry.invoke("boom", CommandArgs::new()).await,
            Err(CommandError::Handler(msg)) if msg == "exploded"
        ));
    }

    #[tokio::test]
    async fn test_invoke_unknown_command() {
        let registry = CommandRegistry::new();
        assert!(matches!(
            registry.invoke("missing", CommandArgs::new()).await,
            Err(CommandError::NotFound(_))
        ));
    }
}
