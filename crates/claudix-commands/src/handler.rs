//! Command handler trait
//!
//! Handlers are async: a host command may hop onto the UI thread or wait on
//! file I/O before it produces a result.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::types::CommandArgs;

/// Object that executes one or more command methods
#[async_trait::async_trait]
pub trait CommandHandler: Send + Sync {
    /// Dispatch `method` with the given arguments
    async fn call(&self, method: &str, args: CommandArgs) -> Result<Value>;
}

/// Handler backed by a single async closure; the method name is ignored
struct FnHandler<F> {
    f: F,
}

#[async_trait::async_trait]
impl<F, Fut> CommandHandler for FnHandler<F>
where
    F: Fn(CommandArgs) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    async fn call(&self, _method: &str, args: CommandArgs) -> Result<Value> {
        (self.f)(args).await
    }
}

/// Wrap an async closure as a [`CommandHandler`]
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn CommandHandler>
where
    F: Fn(CommandArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}
