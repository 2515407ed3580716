//! Extension runtime sessions and session selection

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use claudix_config::SessionPolicy;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::configuration_proxy::RemoteConfigurationProxy;
use crate::rpc::RpcChannel;

/// One connection to an extension runtime
pub struct Session {
    id: String,
    initialized: AtomicBool,
    disposed: AtomicBool,
    last_focused: Mutex<Option<Instant>>,
    channel: RwLock<Option<Arc<RpcChannel>>>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            initialized: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            last_focused: Mutex::new(None),
            channel: RwLock::new(None),
        }
    }

    pub fn with_channel(self, channel: Arc<RpcChannel>) -> Self {
        self.attach_channel(channel);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::SeqCst);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Mark the session gone and detach its channel
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            self.channel.write().take();
            debug!(session = %self.id, "Session disposed");
        }
    }

    /// Initialized and not disposed
    pub fn is_active(&self) -> bool {
        self.is_initialized() && !self.is_disposed()
    }

    /// Record that the session's window gained focus
    pub fn focus(&self) {
        *self.last_focused.lock() = Some(Instant::now());
    }

    pub fn last_focused(&self) -> Option<Instant> {
        *self.last_focused.lock()
    }

    /// Swap in the channel of a (re)connected runtime
    ///
    /// A fresh runtime has seen no configuration, so the session drops back to
    /// uninitialized until it is seeded again.
    pub fn attach_channel(&self, channel: Arc<RpcChannel>) {
        *self.channel.write() = Some(channel);
        self.initialized.store(false, Ordering::SeqCst);
        debug!(session = %self.id, "Channel attached");
    }

    pub fn channel(&self) -> Option<Arc<RpcChannel>> {
        self.channel.read().clone()
    }

    /// Configuration proxy over the session's channel, if it has one
    pub fn configuration_proxy(&self) -> Option<RemoteConfigurationProxy> {
        self.channel().map(RemoteConfigurationProxy::new)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("initialized", &self.is_initialized())
            .field("disposed", &self.is_disposed())
            .field("has_channel", &self.channel.read().is_some())
            .finish()
    }
}

/// Enumerates the live sessions
pub trait SessionProvider: Send + Sync {
    /// Sessions in a stable enumeration order
    fn sessions(&self) -> Vec<Arc<Session>>;
}

/// In-memory session list
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<Vec<Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session; a session with the same id is replaced in place
    pub fn add(&self, session: Arc<Session>) {
        let mut sessions = self.sessions.write();
        match sessions.iter().position(|s| s.id() == session.id()) {
            Some(index) => sessions[index] = session,
            None => {
                info!(session = %session.id(), "Session registered");
                sessions.push(session);
            }
        }
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.write();
        let index = sessions.iter().position(|s| s.id() == id)?;
        let session = sessions.remove(index);
        session.dispose();
        Some(session)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().iter().find(|s| s.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionProvider for SessionRegistry {
    fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.read().clone()
    }
}

/// Pick the session that receives configuration pushes
pub fn select_session(provider: &dyn SessionProvider, policy: SessionPolicy) -> Option<Arc<Session>> {
    let mut active = provider.sessions().into_iter().filter(|s| s.is_active());

    match policy {
        SessionPolicy::FirstActive => active.next(),
        SessionPolicy::MostRecentlyFocused => {
            // Ties, including never-focused sessions, keep enumeration order
            let mut best: Option<Arc<Session>> = None;
            for session in active {
                let newer = match &best {
                    None => true,
                    Some(current) => session.last_focused() > current.last_focused(),
                };
                if newer {
                    best = Some(session);
                }
            }
            best
        }
    }
}
