//! Runtime-side configuration receiver

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::configuration_model::{validate_model, ConfigurationChange, ConfigurationModel};
use crate::configuration_proxy::ConfigurationProxy;
use crate::error::IdeResult;
use crate::rpc::CallOptions;

/// Holds the current [`ConfigurationModel`] and answers lookups against it
#[derive(Default)]
pub struct LayeredConfiguration {
    model: RwLock<ConfigurationModel>,
    initialized: RwLock<bool>,
}

impl LayeredConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current model
    pub async fn snapshot(&self) -> ConfigurationModel {
        self.model.read().await.clone()
    }

    pub async fn is_initialized(&self) -> bool {
        *self.initialized.read().await
    }

    /// Resolve `key` by layer precedence
    ///
    /// With `scope_to_language`, `section` names a language whose overrides win
    /// inside each layer. Otherwise `section` is prefixed to `key`.
    pub async fn resolve(
        &self,
        key: &str,
        section: Option<&str>,
        scope_to_language: bool,
    ) -> Option<Value> {
        let (full_key, language) = match (section, scope_to_language) {
            (Some(language), true) => (key.to_string(), Some(language)),
            (Some(section), false) if !section.is_empty() => {
                if key.is_empty() {
                    (section.to_string(), None)
                } else {
                    (format!("{}.{}", section, key), None)
                }
            }
            _ => (key.to_string(), None),
        };

        let model = self.model.read().await;
        model.layers_by_precedence().into_iter().find_map(|layer| {
            language
                .and_then(|language| layer.override_value(language, &full_key))
                .or_else(|| layer.get(&full_key))
        })
    }

    async fn replace(&self, model: &ConfigurationModel) -> IdeResult<()> {
        validate_model(model)?;
        *self.model.write().await = model.clone();
        Ok(())
    }
}

#[async_trait]
impl ConfigurationProxy for LayeredConfiguration {
    async fn initialize_configuration(
        &self,
        model: &ConfigurationModel,
        _options: &CallOptions,
    ) -> IdeResult<()> {
        self.replace(model).await?;
        let mut initialized = self.initialized.write().await;
        if *initialized {
            debug!("Configuration re-initialized");
        } else {
            info!(defaults = model.defaults.keys().len(), "Configuration initialized");
        }
        *initialized = true;
        Ok(())
    }

    async fn accept_configuration_changed(
        &self,
        data: &ConfigurationModel,
        change: &ConfigurationChange,
        _options: &CallOptions,
    ) -> IdeResult<()> {
        validate_model(data)?;
        let layer = data.layer(&change.target).cloned();
        debug!(layer = ?change.target, keys = change.keys.len(), "Accepting configuration change");
        self.model.write().await.replace_layer(&change.target, layer);
        Ok(())
    }

    async fn get_configuration(
        &self,
        key: &str,
        section: Option<&str>,
        scope_to_language: bool,
        _options: &CallOptions,
    ) -> IdeResult<Option<Value>> {
        Ok(self.resolve(key, section, scope_to_language).await)
    }

    async fn update_configuration(
        &self,
        model: &ConfigurationModel,
        _options: &CallOptions,
    ) -> IdeResult<()> {
        self.replace(model).await?;
        debug!("Configuration model replaced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration_model::{ConfigurationLayer, ConfigurationTarget, FolderConfiguration};
    use crate::uri::Uri;
    use serde_json::json;

    fn options() -> CallOptions {
        CallOptions::default()
    }

    fn layered_model() -> ConfigurationModel {
        let mut user = ConfigurationLayer::from_entries([("editor.tabSize", json!(8))]);
        user.set_override(&["python"], "editor.tabSize", json!(4));

        ConfigurationModel {
            user_local: user,
            workspace: ConfigurationLayer::from_entries([("files.exclude", json!(["target"]))]),
            defaults: ConfigurationLayer::from_entries([
                ("editor.tabSize", json!(2)),
                ("editor.wordWrap", json!("off")),
            ]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let config = LayeredConfiguration::new();
        let value = config
            .get_configuration("nothing.here", None, false, &options())
            .await
            .unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_precedence_and_section() {
        let config = LayeredConfiguration::new();
        config
            .initialize_configuration(&layered_model(), &options())
            .await
            .unwrap();

        assert_eq!(config.resolve("editor.tabSize", None, false).await, Some(json!(8)));
        assert_eq!(config.resolve("tabSize", Some("editor"), false).await, Some(json!(8)));
        assert_eq!(config.resolve("wordWrap", Some("editor"), false).await, Some(json!("off")));
        assert_eq!(config.resolve("", Some("files"), false).await, Some(json!({"exclude": ["target"]})));
    }

    #[tokio::test]
    async fn test_language_scope() {
        let config = LayeredConfiguration::new();
        config
            .initialize_configuration(&layered_model(), &options())
            .await
            .unwrap();

        assert_eq!(config.resolve("editor.tabSize", Some("python"), true).await, Some(json!(4)));
        assert_eq!(config.resolve("editor.tabSize", Some("rust"), true).await, Some(json!(8)));
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let config = LayeredConfiguration::new();
        let model = layered_model();
        config.initialize_configuration(&model, &options()).await.unwrap();
        config.initialize_configuration(&model, &options()).await.unwrap();
        assert!(config.is_initialized().await);
        assert_eq!(config.snapshot().await, model);
    }

    #[tokio::test]
    async fn test_update_replaces_whole_model() {
        let config = LayeredConfiguration::new();
        config
            .initialize_configuration(&layered_model(), &options())
            .await
            .unwrap();

        let replacement = ConfigurationModel::with_defaults(ConfigurationLayer::from_entries([(
            "claudix.selectedModel",
            json!("opus"),
        )]));
        config.update_configuration(&replacement, &options()).await.unwrap();

        assert_eq!(config.resolve("editor.tabSize", None, false).await, None);
        assert_eq!(
            config.resolve("claudix.selectedModel", None, false).await,
            Some(json!("opus"))
        );
    }

    #[tokio::test]
    async fn test_accept_change_replaces_only_target_layer() {
        let config = LayeredConfiguration::new();
        config
            .initialize_configuration(&layered_model(), &options())
            .await
            .unwrap();

        let data = ConfigurationModel {
            workspace: ConfigurationLayer::from_entries([("search.exclude", json!({}))]),
            user_local: ConfigurationLayer::from_entries([("ignored", json!(true))]),
            ..Default::default()
        };
        let change = ConfigurationChange::for_layer(ConfigurationTarget::Workspace, &data.workspace);
        config
            .accept_configuration_changed(&data, &change, &options())
            .await
            .unwrap();

        let snapshot = config.snapshot().await;
        assert_eq!(snapshot.workspace, data.workspace);
        assert_eq!(snapshot.user_local, layered_model().user_local);
        assert_eq!(config.resolve("files.exclude", None, false).await, None);
    }

    #[tokio::test]
    async fn test_accept_change_for_folder() {
        let config = LayeredConfiguration::new();
        let folder = Uri::file("/work/app").unwrap();
        let target = ConfigurationTarget::Folder { uri: folder.clone() };
        let data = ConfigurationModel {
            folders: vec![FolderConfiguration {
                folder: folder.clone(),
                layer: ConfigurationLayer::from_entries([("editor.tabSize", json!(3))]),
            }],
            ..Default::default()
        };

        let change = ConfigurationChange {
            target: target.clone(),
            keys: vec!["editor.tabSize".to_string()],
            overrides: Vec::new(),
        };
        config
            .accept_configuration_changed(&data, &change, &options())
            .await
            .unwrap();
        assert_eq!(config.resolve("editor.tabSize", None, false).await, Some(json!(3)));

        // Folder absent from the data: removed
        config
            .accept_configuration_changed(&ConfigurationModel::new(), &change, &options())
            .await
            .unwrap();
        assert!(config.snapshot().await.folders.is_empty());
    }
}
