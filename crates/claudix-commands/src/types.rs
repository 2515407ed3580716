use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CommandError, Result};
use crate::handler::CommandHandler;

/// Produces the handler instance a command dispatches to
pub type HandlerFactory = Arc<dyn Fn() -> Arc<dyn CommandHandler> + Send + Sync>;

/// Semantic tag for what a command returns
///
/// `null` is accepted for every tag: a best-effort command that could not
/// complete its side effect reports "no result" rather than an error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReturnType {
    Void,
    Bool,
    String,
    Json,
    Uri,
}

impl ReturnType {
    /// Whether `value` conforms to this tag
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            ReturnType::Void => false,
            ReturnType::Bool => value.is_boolean(),
            ReturnType::String => value.is_string(),
            ReturnType::Json => true,
            ReturnType::Uri => value
                .as_object()
                .and_then(|map| map.get("scheme"))
                .map(Value::is_string)
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReturnType::Void => "void",
            ReturnType::Bool => "bool",
            ReturnType::String => "string",
            ReturnType::Json => "json",
            ReturnType::Uri => "uri",
        };
        f.write_str(name)
    }
}

/// Positional and keyword arguments of a command invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandArgs {
    /// Positional arguments in call order
    #[serde(default)]
    pub positional: Vec<Value>,

    /// Keyword arguments
    #[serde(default)]
    pub named: Map<String, Value>,
}

impl CommandArgs {
    /// Create an empty argument list
    pub fn new() -> Self {
        Self::default()
    }

    /// Build arguments from a wire value: arrays are positional, objects are
    /// keyword arguments, `null` is empty, anything else is one positional
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Self::new(),
            Value::Array(items) => Self {
                positional: items,
                named: Map::new(),
            },
            Value::Object(named) => Self {
                positional: Vec::new(),
                named,
            },
            other => Self {
                positional: vec![other],
                named: Map::new(),
            },
        }
    }

    /// Append a positional argument
    pub fn with_positional(mut self, value: Value) -> Self {
        self.positional.push(value);
        self
    }

    /// Add a keyword argument
    pub fn with_named(mut self, name: impl Into<String>, value: Value) -> Self {
        self.named.insert(name.into(), value);
        self
    }

    /// Look an argument up by keyword first, then by position
    pub fn get(&self, index: usize, name: &str) -> Option<&Value> {
        self.named
            .get(name)
            .or_else(|| self.positional.get(index))
            .filter(|value| !value.is_null())
    }

    /// Decode a required argument
    pub fn required<T: DeserializeOwned>(
        &self,
        command: &str,
        index: usize,
        name: &str,
    ) -> Result<T> {
        let value = self.get(index, name).ok_or_else(|| {
            CommandError::invalid_arguments(command, format!("missing argument '{}'", name))
        })?;
        serde_json::from_value(value.clone()).map_err(|e| {
            CommandError::invalid_arguments(command, format!("argument '{}': {}", name, e))
        })
    }

    /// Decode an optional argument
    pub fn optional<T: DeserializeOwned>(
        &self,
        command: &str,
        index: usize,
        name: &str,
    ) -> Result<Option<T>> {
        match self.get(index, name) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                CommandError::invalid_arguments(command, format!("argument '{}': {}", name, e))
            }),
        }
    }
}

/// A registered command
#[derive(Clone)]
pub struct CommandDescriptor {
    /// Unique, stable identifier (e.g. `_workbench.diff`)
    pub id: String,

    /// Method name the handler dispatches on
    pub method: String,

    /// Declared result type, if any
    pub return_type: Option<ReturnType>,

    factory: HandlerFactory,
}

impl CommandDescriptor {
    /// Create a descriptor that always dispatches to the same handler instance
    pub fn new(
        id: impl Into<String>,
        method: impl Into<String>,
        handler: Arc<dyn CommandHandler>,
    ) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            return_type: None,
            factory: Arc::new(move || handler.clone()),
        }
    }

    /// Create a descriptor whose handler is produced per invocation
    pub fn with_factory<F>(id: impl Into<String>, method: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn CommandHandler> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            method: method.into(),
            return_type: None,
            factory: Arc::new(factory),
        }
    }

    /// Set the declared return type
    pub fn with_return_type(mut self, return_type: ReturnType) -> Self {
        self.return_type = Some(return_type);
        self
    }

    /// Obtain a handler instance
    pub fn handler(&self) -> Arc<dyn CommandHandler> {
        (self.factory)()
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("return_type", &self.return_type)
            .finish_non_exhaustive()
    }
}
