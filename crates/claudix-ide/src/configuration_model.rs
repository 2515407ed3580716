//! Layered configuration model exchanged with the extension runtime
//!
//! Keys are flat and dotted (`claudix.selectedModel`); a dotted key stands for
//! nested structure when read back through [`ConfigurationContents::get`].
//! Every container keeps its `keys` list in step with its `contents` map, and
//! decoding rejects payloads where the two disagree.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{IdeError, IdeResult};
use crate::uri::Uri;

#[derive(Default, Deserialize)]
#[serde(default)]
struct RawContents {
    contents: Map<String, Value>,
    keys: Option<Vec<String>>,
}

/// Key/value contents with their key list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawContents")]
pub struct ConfigurationContents {
    contents: Map<String, Value>,
    keys: Vec<String>,
}

impl TryFrom<RawContents> for ConfigurationContents {
    type Error = IdeError;

    fn try_from(raw: RawContents) -> Result<Self, Self::Error> {
        let keys = match raw.keys {
            None => raw.contents.keys().cloned().collect(),
            Some(keys) => {
                let unique: HashSet<&String> = keys.iter().collect();
                if unique.len() != keys.len() {
                    return Err(IdeError::invalid_configuration("duplicate entries in keys"));
                }
                if keys.len() != raw.contents.len()
                    || keys.iter().any(|key| !raw.contents.contains_key(key))
                {
                    return Err(IdeError::invalid_configuration(
                        "keys do not match the keys present in contents",
                    ));
                }
                keys
            }
        };

        Ok(Self {
            contents: raw.contents,
            keys,
        })
    }
}

impl ConfigurationContents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, returning the previous value
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        let previous = self.contents.insert(key.clone(), value);
        if previous.is_none() {
            self.keys.push(key);
        }
        previous
    }

    /// Remove `key`, returning its value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.contents.remove(key);
        if removed.is_some() {
            self.keys.retain(|k| k != key);
        }
        removed
    }

    /// Read a dotted key
    ///
    /// An exact entry wins. Otherwise the value is found by walking into an
    /// entry stored under a prefix of `key`, or assembled as an object from
    /// the entries stored under `key.`.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.contents.get(key) {
            return Some(value.clone());
        }

        for stored in &self.keys {
            if let Some(rest) = key
                .strip_prefix(stored.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
            {
                if let Some(value) = self.contents.get(stored).and_then(|v| descend(v, rest)) {
                    return Some(value.clone());
                }
            }
        }

        let prefix = format!("{}.", key);
        let mut assembled = Map::new();
        for stored in &self.keys {
            if let Some(rest) = stored.strip_prefix(&prefix) {
                if let Some(value) = self.contents.get(stored) {
                    insert_nested(&mut assembled, rest, value.clone());
                }
            }
        }
        if assembled.is_empty() {
            None
        } else {
            Some(Value::Object(assembled))
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.contents.contains_key(key)
    }

    pub fn contents(&self) -> &Map<String, Value> {
        &self.contents
    }

    /// Keys in insertion order
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn descend<'a>(value: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted
        .split('.')
        .try_fold(value, |current, segment| current.as_object()?.get(segment))
}

fn insert_nested(target: &mut Map<String, Value>, dotted: &str, value: Value) {
    match dotted.split_once('.') {
        None => {
            target.insert(dotted.to_string(), value);
        }
        Some((head, tail)) => {
            let entry = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(child) = entry {
                insert_nested(child, tail, value);
            }
        }
    }
}

/// Values that apply only to the listed language identifiers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationOverride {
    pub identifiers: Vec<String>,
    #[serde(flatten)]
    pub values: ConfigurationContents,
}

impl ConfigurationOverride {
    pub fn new(identifiers: Vec<String>) -> Self {
        Self {
            identifiers,
            values: ConfigurationContents::new(),
        }
    }

    pub fn applies_to(&self, identifier: &str) -> bool {
        self.identifiers.iter().any(|id| id == identifier)
    }
}

/// One layer of the configuration model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationLayer {
    #[serde(flatten)]
    values: ConfigurationContents,
    #[serde(default)]
    overrides: Vec<ConfigurationOverride>,
}

impl ConfigurationLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer holding exactly the given entries
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut layer = Self::new();
        for (key, value) in entries {
            layer.set(key, value);
        }
        layer
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.set(key, value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key)
    }

    pub fn contents(&self) -> &Map<String, Value> {
        self.values.contents()
    }

    pub fn keys(&self) -> &[String] {
        self.values.keys()
    }

    pub fn overrides(&self) -> &[ConfigurationOverride] {
        &self.overrides
    }

    /// Set `key` in the override for exactly `identifiers`, creating it if needed
    pub fn set_override(
        &mut self,
        identifiers: &[&str],
        key: impl Into<String>,
        value: Value,
    ) -> Option<Value> {
        let position = self
            .overrides
            .iter()
            .position(|o| o.identifiers.iter().map(String::as_str).eq(identifiers.iter().copied()));
        let index = match position {
            Some(index) => index,
            None => {
                self.overrides.push(ConfigurationOverride::new(
                    identifiers.iter().map(|id| id.to_string()).collect(),
                ));
                self.overrides.len() - 1
            }
        };
        self.overrides[index].values.set(key, value)
    }

    /// First override value for `identifier`
    pub fn override_value(&self, identifier: &str, key: &str) -> Option<Value> {
        self.overrides
            .iter()
            .filter(|o| o.applies_to(identifier))
            .find_map(|o| o.values.get(key))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.overrides.iter().all(|o| o.values.is_empty())
    }
}

/// Layer scoped to one workspace folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderConfiguration {
    pub folder: Uri,
    pub layer: ConfigurationLayer,
}

/// Complete configuration snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigurationModel {
    pub policy: ConfigurationLayer,
    pub application: ConfigurationLayer,
    pub user_local: ConfigurationLayer,
    pub user_remote: ConfigurationLayer,
    pub workspace: ConfigurationLayer,
    pub folders: Vec<FolderConfiguration>,
    pub defaults: ConfigurationLayer,
}

impl ConfigurationModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Model with only the defaults layer populated
    pub fn with_defaults(defaults: ConfigurationLayer) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    /// Layers from highest to lowest precedence
    pub fn layers_by_precedence(&self) -> Vec<&ConfigurationLayer> {
        let mut layers = vec![
            &self.policy,
            &self.application,
            &self.user_local,
            &self.user_remote,
            &self.workspace,
        ];
        layers.extend(self.folders.iter().map(|f| &f.layer));
        layers.push(&self.defaults);
        layers
    }

    pub fn folder(&self, uri: &Uri) -> Option<&ConfigurationLayer> {
        self.folders
            .iter()
            .find(|f| &f.folder == uri)
            .map(|f| &f.layer)
    }

    /// Layer addressed by `target`; `None` for a folder the model does not hold
    pub fn layer(&self, target: &ConfigurationTarget) -> Option<&ConfigurationLayer> {
        match target {
            ConfigurationTarget::Policy => Some(&self.policy),
            ConfigurationTarget::Application => Some(&self.application),
            ConfigurationTarget::UserLocal => Some(&self.user_local),
            ConfigurationTarget::UserRemote => Some(&self.user_remote),
            ConfigurationTarget::Workspace => Some(&self.workspace),
            ConfigurationTarget::Folder { uri } => self.folder(uri),
            ConfigurationTarget::Defaults => Some(&self.defaults),
        }
    }

    /// Replace the layer addressed by `target` wholesale
    ///
    /// For a folder target, `None` removes the folder.
    pub fn replace_layer(&mut self, target: &ConfigurationTarget, layer: Option<ConfigurationLayer>) {
        let slot = match target {
            ConfigurationTarget::Policy => &mut self.policy,
            ConfigurationTarget::Application => &mut self.application,
            ConfigurationTarget::UserLocal => &mut self.user_local,
            ConfigurationTarget::UserRemote => &mut self.user_remote,
            ConfigurationTarget::Workspace => &mut self.workspace,
            ConfigurationTarget::Defaults => &mut self.defaults,
            ConfigurationTarget::Folder { uri } => {
                let position = self.folders.iter().position(|f| &f.folder == uri);
                match (position, layer) {
                    (Some(index), Some(layer)) => self.folders[index].layer = layer,
                    (Some(index), None) => {
                        self.folders.remove(index);
                    }
                    (None, Some(layer)) => self.folders.push(FolderConfiguration {
                        folder: uri.clone(),
                        layer,
                    }),
                    (None, None) => {}
                }
                return;
            }
        };
        *slot = layer.unwrap_or_default();
    }
}

/// Layer a configuration change refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConfigurationTarget {
    Policy,
    Application,
    UserLocal,
    UserRemote,
    Workspace,
    Folder { uri: Uri },
    Defaults,
}

/// Keys changed inside one override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideChange {
    pub identifier: String,
    pub keys: Vec<String>,
}

/// Description of which keys changed in which layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationChange {
    pub target: ConfigurationTarget,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub overrides: Vec<OverrideChange>,
}

impl ConfigurationChange {
    /// Change announcing every key of `layer`
    pub fn for_layer(target: ConfigurationTarget, layer: &ConfigurationLayer) -> Self {
        let overrides = layer
            .overrides()
            .iter()
            .flat_map(|o| {
                o.identifiers.iter().map(move |identifier| OverrideChange {
                    identifier: identifier.clone(),
                    keys: o.values.keys().to_vec(),
                })
            })
            .collect();

        Self {
            target,
            keys: layer.keys().to_vec(),
            overrides,
        }
    }

    pub fn affects(&self, key: &str) -> bool {
        self.keys
            .iter()
            .chain(self.overrides.iter().flat_map(|o| o.keys.iter()))
            .any(|changed| {
                changed == key
                    || changed.starts_with(&format!("{}.", key))
                    || key.starts_with(&format!("{}.", changed))
            })
    }
}

/// Check that a decoded model is usable
///
/// Decoding already enforces the per-layer key invariant; this rejects folder
/// lists that name the same folder twice.
pub fn validate_model(model: &ConfigurationModel) -> IdeResult<()> {
    let mut seen = HashSet::new();
    for folder in &model.folders {
        if !seen.insert(&folder.folder) {
            return Err(IdeError::invalid_configuration(format!(
                "folder '{}' appears more than once",
                folder.folder
            )));
        }
    }
    Ok(())
}
