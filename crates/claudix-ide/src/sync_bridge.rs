//! Settings-to-configuration sync bridge
//!
//! Applying settings is two-phase. The local commit to the [`SettingsStore`]
//! must succeed and its failure is returned to the caller. Propagation to the
//! extension runtime is best effort: its failure is logged and reported in
//! the [`SyncOutcome`], never as an error.
//!
//! Applies are serialized: a second apply waits until the first has both
//! committed and pushed, so the store and the runtime end on the same state.

use std::sync::Arc;

use claudix_common::format_error;
use claudix_config::BridgeConfig;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::configuration_model::{ConfigurationLayer, ConfigurationModel};
use crate::configuration_proxy::ConfigurationProxy;
use crate::error::{IdeError, IdeResult};
use crate::rpc::CallOptions;
use crate::session::{select_session, Session, SessionProvider};
use crate::settings::{SettingsState, SettingsStore};

/// What happened after the local commit succeeded
#[derive(Debug)]
pub enum SyncOutcome {
    /// The runtime of `session_id` accepted the rebuilt model
    Propagated { session_id: String },
    /// Saved locally only
    NotPropagated { reason: IdeError },
}

impl SyncOutcome {
    pub fn is_propagated(&self) -> bool {
        matches!(self, SyncOutcome::Propagated { .. })
    }
}

/// Pushes IDE settings into the extension runtime's configuration
pub struct SettingsSyncBridge {
    store: Arc<dyn SettingsStore>,
    sessions: Arc<dyn SessionProvider>,
    config: BridgeConfig,
    // Held across commit-then-push
    apply_lock: Mutex<()>,
}

impl SettingsSyncBridge {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        sessions: Arc<dyn SessionProvider>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            store,
            sessions,
            config,
            apply_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Bounds applied to every remote call the bridge makes
    pub fn call_options(&self) -> CallOptions {
        CallOptions::from(&self.config.rpc)
    }

    /// Persisted settings, defaulted on first read
    pub async fn load(&self) -> IdeResult<SettingsState> {
        self.store.load().await
    }

    /// Full model for `state`: only the defaults layer is populated
    pub fn configuration_model(&self, state: &SettingsState) -> ConfigurationModel {
        let defaults = ConfigurationLayer::from_entries(state.to_entries(&self.config.namespace));
        ConfigurationModel::with_defaults(defaults)
    }

    /// Save `state` and push it to the selected session
    pub async fn apply(&self, state: SettingsState) -> IdeResult<SyncOutcome> {
        let options = self.call_options();
        self.apply_with_options(state, &options).await
    }

    /// [`apply`](Self::apply) with caller-supplied bounds for the remote push
    pub async fn apply_with_options(
        &self,
        state: SettingsState,
        options: &CallOptions,
    ) -> IdeResult<SyncOutcome> {
        let state = state.normalized();
        let _apply = self.apply_lock.lock().await;

        self.store.save(&state).await.map_err(|e| match e {
            IdeError::Persistence(_) => e,
            other => IdeError::persistence(other.to_string()),
        })?;
        debug!(
            model = %state.selected_model,
            variables = state.environment_variables.len(),
            "Settings committed"
        );

        let Some(session) = select_session(self.sessions.as_ref(), self.config.sessions.policy)
        else {
            info!("No active extension session; settings will apply on next start");
            return Ok(SyncOutcome::NotPropagated {
                reason: IdeError::remote_unavailable("no active session"),
            });
        };

        let Some(proxy) = session.configuration_proxy() else {
            info!(session = %session.id(), "Session has no RPC channel; settings not pushed");
            return Ok(SyncOutcome::NotPropagated {
                reason: IdeError::remote_unavailable(format!(
                    "session {} has no RPC channel",
                    session.id()
                )),
            });
        };

        let model = self.configuration_model(&state);
        match proxy.update_configuration(&model, options).await {
            Ok(()) => {
                info!(session = %session.id(), "Settings propagated to extension runtime");
                Ok(SyncOutcome::Propagated {
                    session_id: session.id().to_string(),
                })
            }
            Err(e) => {
                warn!(
                    session = %session.id(),
                    error = %format_error(&e),
                    "Failed to propagate settings"
                );
                Ok(SyncOutcome::NotPropagated { reason: e })
            }
        }
    }

    /// Seed a starting session with the persisted settings, then mark it initialized
    ///
    /// The session stays uninitialized if the push fails.
    pub async fn initialize_session(&self, session: &Session) -> IdeResult<()> {
        if session.is_disposed() {
            return Err(IdeError::remote_unavailable(format!(
                "session {} is disposed",
                session.id()
            )));
        }
        let proxy = session.configuration_proxy().ok_or_else(|| {
            IdeError::remote_unavailable(format!("session {} has no RPC channel", session.id()))
        })?;

        let _apply = self.apply_lock.lock().await;
        let state = self.load().await?;
        let model = self.configuration_model(&state);
        proxy
            .initialize_configuration(&model, &self.call_options())
            .await?;

        session.mark_initialized();
        info!(session = %session.id(), "Session configuration initialized");
        Ok(())
    }

    /// Read a value from the selected session's configuration
    pub async fn get_configuration(
        &self,
        key: &str,
        section: Option<&str>,
        scope_to_language: bool,
    ) -> IdeResult<Option<Value>> {
        let session = select_session(self.sessions.as_ref(), self.config.sessions.policy)
            .ok_or_else(|| IdeError::remote_unavailable("no active session"))?;
        let proxy = session.configuration_proxy().ok_or_else(|| {
            IdeError::remote_unavailable(format!("session {} has no RPC channel", session.id()))
        })?;
        proxy
            .get_configuration(key, section, scope_to_language, &self.call_options())
            .await
    }
}
