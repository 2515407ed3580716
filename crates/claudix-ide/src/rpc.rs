//! Request/response RPC between the host and the extension runtime
//!
//! Messages are JSON envelopes tagged by `type`. An [`RpcChannel`] owns one
//! transport, correlates replies to outstanding requests by numeric id, and
//! serves incoming requests through an optional [`RpcHandler`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use claudix_config::RpcConfig;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{IdeError, IdeResult};

/// Wire envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RpcMessage {
    Request {
        id: u64,
        method: String,
        #[serde(default)]
        args: Value,
    },
    Reply {
        id: u64,
        #[serde(default)]
        result: Value,
    },
    Error {
        id: u64,
        code: i32,
        message: String,
    },
}

/// Error reported by a request handler, sent back as an `error` envelope
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (code {code})")]
pub struct RpcFault {
    pub code: i32,
    pub message: String,
}

impl RpcFault {
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(Self::METHOD_NOT_FOUND, format!("Unknown method: {}", method))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_PARAMS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Self::INTERNAL_ERROR, message)
    }
}

/// Decode positional argument `index` of an array payload
pub fn positional_arg<T: serde::de::DeserializeOwned>(
    args: &Value,
    index: usize,
    name: &str,
) -> Result<T, RpcFault> {
    let value = args
        .as_array()
        .and_then(|items| items.get(index))
        .cloned()
        .unwrap_or(Value::Null);
    serde_json::from_value(value)
        .map_err(|e| RpcFault::invalid_params(format!("argument '{}': {}", name, e)))
}

/// Serves requests arriving on a channel
#[async_trait]
pub trait RpcHandler: Send + Sync {
    async fn handle(&self, method: &str, args: Value) -> Result<Value, RpcFault>;
}

/// Tries each handler in turn, moving on when one does not know the method
#[derive(Default, Clone)]
pub struct RpcRouter {
    handlers: Vec<Arc<dyn RpcHandler>>,
}

impl RpcRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, handler: Arc<dyn RpcHandler>) -> Self {
        self.handlers.push(handler);
        self
    }
}

#[async_trait]
impl RpcHandler for RpcRouter {
    async fn handle(&self, method: &str, args: Value) -> Result<Value, RpcFault> {
        for handler in &self.handlers {
            match handler.handle(method, args.clone()).await {
                Err(fault) if fault.code == RpcFault::METHOD_NOT_FOUND => continue,
                other => return other,
            }
        }
        Err(RpcFault::method_not_found(method))
    }
}

/// Message transport
///
/// `receive` yields `Ok(None)` once the peer has gone away.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn send(&self, message: &RpcMessage) -> IdeResult<()>;

    async fn receive(&self) -> IdeResult<Option<RpcMessage>>;

    async fn close(&self) -> IdeResult<()>;
}

/// In-process duplex transport carrying serialized envelopes
pub struct MemoryTransport {
    outgoing: Mutex<Option<mpsc::UnboundedSender<String>>>,
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    closed: CancellationToken,
}

impl MemoryTransport {
    /// Two connected endpoints
    pub fn pair() -> (Self, Self) {
        let (left_tx, left_rx) = mpsc::unbounded_channel();
        let (right_tx, right_rx) = mpsc::unbounded_channel();
        (Self::new(left_tx, right_rx), Self::new(right_tx, left_rx))
    }

    fn new(outgoing: mpsc::UnboundedSender<String>, incoming: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            outgoing: Mutex::new(Some(outgoing)),
            incoming: tokio::sync::Mutex::new(incoming),
            closed: CancellationToken::new(),
        }
    }
}

#[async_trait]
impl RpcTransport for MemoryTransport {
    async fn send(&self, message: &RpcMessage) -> IdeResult<()> {
        let payload = serde_json::to_string(message)?;
        let guard = self.outgoing.lock();
        let sender = guard
            .as_ref()
            .ok_or_else(|| IdeError::remote_call("transport closed"))?;
        sender
            .send(payload)
            .map_err(|_| IdeError::remote_call("peer disconnected"))
    }

    async fn receive(&self) -> IdeResult<Option<RpcMessage>> {
        let mut incoming = self.incoming.lock().await;
        let payload = tokio::select! {
            _ = self.closed.cancelled() => return Ok(None),
            payload = incoming.recv() => payload,
        };
        match payload {
            None => Ok(None),
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        }
    }

    async fn close(&self) -> IdeResult<()> {
        self.outgoing.lock().take();
        self.closed.cancel();
        Ok(())
    }
}

/// Bounds for one remote call
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub timeout: Duration,
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl Default for CallOptions {
    fn default() -> Self {
        Self::from(&RpcConfig::default())
    }
}

impl From<&RpcConfig> for CallOptions {
    fn from(config: &RpcConfig) -> Self {
        Self::new(config.timeout())
    }
}

type PendingReplies = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, RpcFault>>>>>;

/// One live connection to the other side
///
/// Must be created inside a tokio runtime; the reader task is aborted when the
/// channel is closed or dropped.
pub struct RpcChannel {
    transport: Arc<dyn RpcTransport>,
    pending: PendingReplies,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl RpcChannel {
    /// Start reading from `transport`, serving requests with `handler`
    pub fn spawn(transport: Arc<dyn RpcTransport>, handler: Option<Arc<dyn RpcHandler>>) -> Self {
        let pending: PendingReplies = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let reader = tokio::spawn(read_loop(
            transport.clone(),
            handler,
            pending.clone(),
            closed.clone(),
        ));

        Self {
            transport,
            pending,
            next_id: AtomicU64::new(1),
            closed,
            reader,
        }
    }

    /// Send a request and wait for its reply
    pub async fn call(&self, method: &str, args: Value, options: &CallOptions) -> IdeResult<Value> {
        if self.is_closed() {
            return Err(IdeError::remote_call("channel closed"));
        }
        if options.cancel.as_ref().is_some_and(|token| token.is_cancelled()) {
            return Err(IdeError::Cancelled);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        // The reader may have cleared pending between the check above and the insert
        if self.closed.load(Ordering::SeqCst) {
            self.pending.lock().remove(&id);
            return Err(IdeError::remote_call("channel closed"));
        }

        let request = RpcMessage::Request {
            id,
            method: method.to_string(),
            args,
        };
        debug!(id, method, "Sending RPC request");
        if let Err(e) = self.transport.send(&request).await {
            self.pending.lock().remove(&id);
            return Err(e);
        }

        let cancelled = async {
            match &options.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        let outcome = tokio::select! {
            _ = cancelled => Err(IdeError::Cancelled),
            reply = tokio::time::timeout(options.timeout, rx) => match reply {
                Err(_) => Err(IdeError::timeout(options.timeout.as_millis() as u64)),
                Ok(Err(_)) => Err(IdeError::remote_call("channel closed before reply")),
                Ok(Ok(Err(fault))) => Err(IdeError::remote_call(format!("{}: {}", method, fault))),
                Ok(Ok(Ok(value))) => Ok(value),
            },
        };

        if outcome.is_err() {
            self.pending.lock().remove(&id);
        }
        outcome
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.reader.is_finished()
    }

    /// Requests still waiting for a reply
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Close the transport and fail every outstanding call
    pub async fn close(&self) -> IdeResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        let result = self.transport.close().await;
        self.reader.abort();
        self.pending.lock().clear();
        result
    }
}

impl Drop for RpcChannel {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(
    transport: Arc<dyn RpcTransport>,
    handler: Option<Arc<dyn RpcHandler>>,
    pending: PendingReplies,
    closed: Arc<AtomicBool>,
) {
    loop {
        let message = match transport.receive().await {
            Ok(Some(message)) => message,
            Ok(None) => break,
            Err(IdeError::SerializationError(e)) => {
                warn!(error = %e, "Dropping malformed RPC message");
                continue;
            }
            Err(e) => {
                warn!(error = %e, "RPC transport failed");
                break;
            }
        };

        match message {
            RpcMessage::Request { id, method, args } => {
                let transport = transport.clone();
                let handler = handler.clone();
                tokio::spawn(async move {
                    let outcome = match handler {
                        Some(handler) => handler.handle(&method, args).await,
                        None => Err(RpcFault::method_not_found(&method)),
                    };
                    let reply = match outcome {
                        Ok(result) => RpcMessage::Reply { id, result },
                        Err(fault) => {
                            debug!(id, method = %method, code = fault.code, "RPC request failed");
                            RpcMessage::Error {
                                id,
                                code: fault.code,
                                message: fault.message,
                            }
                        }
                    };
                    if let Err(e) = transport.send(&reply).await {
                        debug!(id, error = %e, "Could not deliver RPC reply");
                    }
                });
            }
            RpcMessage::Reply { id, result } => resolve(&pending, id, Ok(result)),
            RpcMessage::Error { id, code, message } => {
                resolve(&pending, id, Err(RpcFault { code, message }))
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
    // Dropping the senders wakes every waiter with a closed-channel error
    pending.lock().clear();
    debug!("RPC reader stopped");
}

fn resolve(pending: &PendingReplies, id: u64, outcome: Result<Value, RpcFault>) {
    match pending.lock().remove(&id) {
        Some(tx) => {
            let _ = tx.send(outcome);
        }
        None => debug!(id, "Ignoring reply for abandoned request"),
    }
}
