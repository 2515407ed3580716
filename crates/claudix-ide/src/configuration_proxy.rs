//! Configuration interface proxied across the process boundary
//!
//! The host calls a [`ConfigurationProxy`]; on the host side that is a
//! [`RemoteConfigurationProxy`] which turns each call into an RPC request, and
//! on the runtime side a [`ConfigurationService`] feeds those requests back
//! into a local implementation.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::configuration_model::{ConfigurationChange, ConfigurationModel};
use crate::error::IdeResult;
use crate::rpc::{positional_arg, CallOptions, RpcChannel, RpcFault, RpcHandler};

/// RPC method names
pub mod methods {
    pub const INITIALIZE_CONFIGURATION: &str = "$initializeConfiguration";
    pub const ACCEPT_CONFIGURATION_CHANGED: &str = "$acceptConfigurationChanged";
    pub const GET_CONFIGURATION: &str = "$getConfiguration";
    pub const UPDATE_CONFIGURATION: &str = "$updateConfiguration";
}

/// Configuration operations the host drives on the extension runtime
#[async_trait]
pub trait ConfigurationProxy: Send + Sync {
    /// Seed the runtime with a full model; safe to repeat after a reconnect
    async fn initialize_configuration(
        &self,
        model: &ConfigurationModel,
        options: &CallOptions,
    ) -> IdeResult<()>;

    /// Replace the layer named by `change.target` with the one in `data`
    async fn accept_configuration_changed(
        &self,
        data: &ConfigurationModel,
        change: &ConfigurationChange,
        options: &CallOptions,
    ) -> IdeResult<()>;

    /// Resolve `key` across all layers; `None` when no layer holds it
    async fn get_configuration(
        &self,
        key: &str,
        section: Option<&str>,
        scope_to_language: bool,
        options: &CallOptions,
    ) -> IdeResult<Option<Value>>;

    /// Replace the whole model
    async fn update_configuration(
        &self,
        model: &ConfigurationModel,
        options: &CallOptions,
    ) -> IdeResult<()>;
}

/// Host-side proxy that forwards every call over an [`RpcChannel`]
#[derive(Clone)]
pub struct RemoteConfigurationProxy {
    channel: Arc<RpcChannel>,
}

impl RemoteConfigurationProxy {
    pub fn new(channel: Arc<RpcChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl ConfigurationProxy for RemoteConfigurationProxy {
    async fn initialize_configuration(
        &self,
        model: &ConfigurationModel,
        options: &CallOptions,
    ) -> IdeResult<()> {
        let args = json!([serde_json::to_value(model)?]);
        self.channel
            .call(methods::INITIALIZE_CONFIGURATION, args, options)
            .await?;
        Ok(())
    }

    async fn accept_configuration_changed(
        &self,
        data: &ConfigurationModel,
        change: &ConfigurationChange,
        options: &CallOptions,
    ) -> IdeResult<()> {
        let args = json!([serde_json::to_value(data)?, serde_json::to_value(change)?]);
        self.channel
            .call(methods::ACCEPT_CONFIGURATION_CHANGED, args, options)
            .await?;
        Ok(())
    }

    async fn get_configuration(
        &self,
        key: &str,
        section: Option<&str>,
        scope_to_language: bool,
        options: &CallOptions,
    ) -> IdeResult<Option<Value>> {
        let args = json!([key, section, scope_to_language]);
        let value = self
            .channel
            .call(methods::GET_CONFIGURATION, args, options)
            .await?;
        Ok(match value {
            Value::Null => None,
            other => Some(other),
        })
    }

    async fn update_configuration(
        &self,
        model: &ConfigurationModel,
        options: &CallOptions,
    ) -> IdeResult<()> {
        let args = json!([serde_json::to_value(model)?]);
        self.channel
            .call(methods::UPDATE_CONFIGURATION, args, options)
            .await?;
        Ok(())
    }
}

/// Serves configuration RPC requests from a local implementation
pub struct ConfigurationService<P: ?Sized> {
    proxy: Arc<P>,
    options: CallOptions,
}

impl<P: ConfigurationProxy + ?Sized> ConfigurationService<P> {
    pub fn new(proxy: Arc<P>) -> Self {
        Self {
            proxy,
            options: CallOptions::default(),
        }
    }
}

/// Handler answering configuration requests with `proxy`
pub fn serve_configuration<P>(proxy: Arc<P>) -> Arc<dyn RpcHandler>
where
    P: ConfigurationProxy + ?Sized + 'static,
{
    Arc::new(ConfigurationService::new(proxy))
}

#[async_trait]
impl<P: ConfigurationProxy + ?Sized> RpcHandler for ConfigurationService<P> {
    async fn handle(&self, method: &str, args: Value) -> Result<Value, RpcFault> {
        debug!(method, "Serving configuration request");
        let internal = |e: crate::error::IdeError| RpcFault::internal(e.to_string());

        match method {
            methods::INITIALIZE_CONFIGURATION => {
                let model: ConfigurationModel = positional_arg(&args, 0, "model")?;
                self.proxy
                    .initialize_configuration(&model, &self.options)
                    .await
                    .map_err(internal)?;
                Ok(Value::Null)
            }
            methods::ACCEPT_CONFIGURATION_CHANGED => {
                let data: ConfigurationModel = positional_arg(&args, 0, "data")?;
                let change: ConfigurationChange = positional_arg(&args, 1, "change")?;
                self.proxy
                    .accept_configuration_changed(&data, &change, &self.options)
                    .await
                    .map_err(internal)?;
                Ok(Value::Null)
            }
            methods::GET_CONFIGURATION => {
                let key: String = positional_arg(&args, 0, "key")?;
                let section: Option<String> = positional_arg(&args, 1, "section")?;
                let scope_to_language: Option<bool> = positional_arg(&args, 2, "scopeToLanguage")?;
                let value = self
                    .proxy
                    .get_configuration(
                        &key,
                        section.as_deref(),
                        scope_to_language.unwrap_or(false),
                        &self.options,
                    )
                    .await
                    .map_err(internal)?;
                Ok(value.unwrap_or(Value::Null))
            }
            methods::UPDATE_CONFIGURATION => {
                let model: ConfigurationModel = positional_arg(&args, 0, "model")?;
                self.proxy
                    .update_configuration(&model, &self.options)
                    .await
                    .map_err(internal)?;
                Ok(Value::Null)
            }
            other => Err(RpcFault::method_not_found(other)),
        }
    }
}
