//! IDE primitives the bridge calls into
//!
//! Everything here is implemented by the IDE integration layer; the bridge
//! only sees this trait.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::IdeResult;
use crate::uri::Uri;

/// A URI the IDE has resolved to one of its own resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    pub uri: Uri,
    pub path: PathBuf,
}

/// Work that must run on the IDE's UI thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    OpenDiff {
        left: ResourceHandle,
        right: ResourceHandle,
        title: Option<String>,
    },
    Reveal {
        resource: ResourceHandle,
        in_os: bool,
    },
    OpenSettings {
        query: Option<String>,
    },
}

/// Host IDE collaborator
#[async_trait]
pub trait IdeHost: Send + Sync {
    async fn file_exists(&self, uri: &Uri) -> IdeResult<bool>;

    async fn create_file(&self, uri: &Uri) -> IdeResult<()>;

    /// Fails with `ResourceAccess` when the IDE cannot find the resource
    async fn resolve_resource(&self, uri: &Uri) -> IdeResult<ResourceHandle>;

    /// Completes once the action has run
    async fn run_on_ui_thread(&self, action: UiAction) -> IdeResult<()>;
}
