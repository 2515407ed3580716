//! Error types for the host bridge

use thiserror::Error;

/// Host bridge error
#[derive(Debug, Error)]
pub enum IdeError {
    /// Malformed cross-boundary address
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// No active session or no RPC channel to reach the extension runtime
    #[error("Extension runtime unavailable: {0}")]
    RemoteUnavailable(String),

    /// RPC send/receive failure or a fault reported by the remote side
    #[error("Remote call failed: {0}")]
    RemoteCall(String),

    /// Remote call exceeded its deadline
    #[error("Operation timeout after {0}ms")]
    Timeout(u64),

    /// Remote call abandoned through its cancellation token
    #[error("Operation cancelled")]
    Cancelled,

    /// File or UI primitive failure
    #[error("Resource access error: {0}")]
    ResourceAccess(String),

    /// Local settings write/read failure
    #[error("Settings persistence error: {0}")]
    Persistence(String),

    /// Configuration payload violates the layer invariants
    #[error("Invalid configuration model: {0}")]
    InvalidConfiguration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl IdeError {
    /// Create an invalid URI error
    pub fn invalid_uri(message: impl Into<String>) -> Self {
        IdeError::InvalidUri(message.into())
    }

    /// Create a remote-unavailable error
    pub fn remote_unavailable(message: impl Into<String>) -> Self {
        IdeError::RemoteUnavailable(message.into())
    }

    /// Create a remote call error
    pub fn remote_call(message: impl Into<String>) -> Self {
        IdeError::RemoteCall(message.into())
    }

    /// Create a timeout error
    pub fn timeout(ms: u64) -> Self {
        IdeError::Timeout(ms)
    }

    /// Create a resource access error
    pub fn resource_access(message: impl Into<String>) -> Self {
        IdeError::ResourceAccess(message.into())
    }

    /// Create a persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        IdeError::Persistence(message.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        IdeError::InvalidConfiguration(message.into())
    }

    /// Create a generic error
    pub fn other(message: impl Into<String>) -> Self {
        IdeError::Other(message.into())
    }

    /// Whether the error belongs to the remote side of the bridge
    ///
    /// The sync bridge downgrades these to warnings after the local commit.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            IdeError::RemoteUnavailable(_)
                | IdeError::RemoteCall(_)
                | IdeError::Timeout(_)
                | IdeError::Cancelled
                | IdeError::SerializationError(_)
        )
    }
}

impl From<claudix_common::JsonStoreError> for IdeError {
    fn from(err: claudix_common::JsonStoreError) -> Self {
        IdeError::Persistence(err.to_string())
    }
}

/// Result type for host bridge operations
pub type IdeResult<T> = Result<T, IdeError>;
