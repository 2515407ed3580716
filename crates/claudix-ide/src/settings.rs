//! IDE-native settings and their persistence
//!
//! Settings live in a flat key/value document under the namespace prefix
//! (`claudix.selectedModel`, `claudix.environmentVariables`). The document may
//! hold keys owned by others; stores only touch their own.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use claudix_config::Namespace;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{IdeError, IdeResult};

pub const SELECTED_MODEL_KEY: &str = "selectedModel";
pub const ENVIRONMENT_VARIABLES_KEY: &str = "environmentVariables";
pub const DEFAULT_MODEL: &str = "default";

/// One environment variable handed to the extension runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    pub name: String,
    pub value: String,
}

impl EnvironmentVariable {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Settings edited in the IDE's settings page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsState {
    pub selected_model: String,
    pub environment_variables: Vec<EnvironmentVariable>,
}

impl Default for SettingsState {
    fn default() -> Self {
        Self {
            selected_model: DEFAULT_MODEL.to_string(),
            environment_variables: Vec::new(),
        }
    }
}

impl SettingsState {
    /// Trimmed copy without variables whose name is blank
    pub fn normalized(&self) -> Self {
        Self {
            selected_model: self.selected_model.trim().to_string(),
            environment_variables: self
                .environment_variables
                .iter()
                .map(|var| EnvironmentVariable::new(var.name.trim(), var.value.trim()))
                .filter(|var| !var.name.is_empty())
                .collect(),
        }
    }

    /// Entries as stored under `namespace`
    pub fn to_entries(&self, namespace: &Namespace) -> BTreeMap<String, Value> {
        let variables = self
            .environment_variables
            .iter()
            .map(|var| serde_json::json!({"name": var.name, "value": var.value}))
            .collect();

        BTreeMap::from([
            (
                namespace.key(SELECTED_MODEL_KEY),
                Value::String(self.selected_model.clone()),
            ),
            (
                namespace.key(ENVIRONMENT_VARIABLES_KEY),
                Value::Array(variables),
            ),
        ])
    }

    /// Read back from stored entries; missing or malformed values default
    pub fn from_entries(entries: &Map<String, Value>, namespace: &Namespace) -> Self {
        let mut state = Self::default();

        if let Some(model) = entries
            .get(&namespace.key(SELECTED_MODEL_KEY))
            .and_then(Value::as_str)
        {
            state.selected_model = model.to_string();
        }

        if let Some(raw) = entries.get(&namespace.key(ENVIRONMENT_VARIABLES_KEY)) {
            match serde_json::from_value::<Vec<EnvironmentVariable>>(raw.clone()) {
                Ok(variables) => state.environment_variables = variables,
                Err(e) => warn!(error = %e, "Ignoring malformed stored environment variables"),
            }
        }

        state
    }
}

/// Durable settings storage
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Current settings, defaulted when nothing is stored yet
    async fn load(&self) -> IdeResult<SettingsState>;

    /// Persist `state`; resolves once the write is durable
    async fn save(&self, state: &SettingsState) -> IdeResult<()>;
}

/// Settings kept in a JSON document on disk
pub struct JsonSettingsStore {
    path: PathBuf,
    namespace: Namespace,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>, namespace: Namespace) -> Self {
        Self {
            path: path.into(),
            namespace,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for JsonSettingsStore {
    async fn load(&self) -> IdeResult<SettingsState> {
        let path = self.path.clone();
        let document = tokio::task::spawn_blocking(move || {
            claudix_common::load_json_or_default::<Map<String, Value>, _>(&path)
        })
        .await
        .map_err(|e| IdeError::persistence(e.to_string()))??;
        Ok(SettingsState::from_entries(&document, &self.namespace))
    }

    async fn save(&self, state: &SettingsState) -> IdeResult<()> {
        let path = self.path.clone();
        let entries = state.to_entries(&self.namespace);

        tokio::task::spawn_blocking(move || {
            let mut document =
                claudix_common::load_json_or_default::<Map<String, Value>, _>(&path)?;
            document.extend(entries);
            claudix_common::save_json_atomic(&path, &document)
        })
        .await
        .map_err(|e| IdeError::persistence(e.to_string()))??;

        debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}

/// Settings kept in memory
#[derive(Default)]
pub struct MemorySettingsStore {
    namespace: Namespace,
    entries: RwLock<Map<String, Value>>,
}

impl MemorySettingsStore {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            entries: RwLock::new(Map::new()),
        }
    }

    /// Snapshot of the stored key/value map
    pub fn entries(&self) -> Map<String, Value> {
        self.entries.read().clone()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> IdeResult<SettingsState> {
        Ok(SettingsState::from_entries(&self.entries.read(), &self.namespace))
    }

    async fn save(&self, state: &SettingsState) -> IdeResult<()> {
        self.entries.write().extend(state.to_entries(&self.namespace));
        Ok(())
    }
}
