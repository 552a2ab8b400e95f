//! Stream transports and the session handle that owns an open one.
//!
//! A transport only has to turn a request into an ordered stream of raw
//! messages. `SessionHandle` runs that stream on its own task and forwards
//! every message to the controller, tagged with the session it belongs to.
mod http;
pub(crate) mod sse;

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt as _;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::errors::TransportError;
use crate::frame::RawMessage;
use crate::model::CorrelationId;

pub use http::HttpTransport;

/// Ordered raw messages produced by an open transport.
pub type MessageStream =
    Pin<Box<dyn futures::Stream<Item = Result<RawMessage, TransportError>> + Send + 'static>>;

/// Parameters for opening one stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportRequest {
    pub session_id: uuid::Uuid,
    /// Passed to the server when present; omitted otherwise.
    pub correlation_id: Option<CorrelationId>,
}

/// One-directional push channel for a single streaming request.
///
/// Implementations must yield messages in the order they were received. The
/// stream ending, or yielding an error, is treated as the connection being
/// lost unless a terminal frame was seen first.
#[async_trait::async_trait]
pub trait StreamTransport: Send + Sync {
    async fn connect(&self, request: TransportRequest) -> Result<MessageStream, TransportError>;
}

/// Monotonic key distinguishing sessions within one controller.
pub(crate) type SessionKey = u64;

/// Notification forwarded from a transport task to its controller.
#[derive(Debug)]
pub(crate) enum TransportNotice {
    Message {
        session: SessionKey,
        message: RawMessage,
    },
    Failed {
        session: SessionKey,
        error: TransportError,
    },
}

impl TransportNotice {
    pub(crate) fn session(&self) -> SessionKey {
        match self {
            Self::Message { session, .. } | Self::Failed { session, .. } => *session,
        }
    }
}

/// Ownership token for one open transport.
///
/// Closing is idempotent and also happens on drop. Once `close` returns the
/// transport task is aborted and forwards nothing further.
pub struct SessionHandle {
    key: SessionKey,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    pub(crate) fn open(
        transport: Arc<dyn StreamTransport>,
        request: TransportRequest,
        key: SessionKey,
        idle_timeout: Option<Duration>,
        tx: mpsc::Sender<TransportNotice>,
    ) -> Self {
        let task = tokio::spawn(pump(transport, request, key, idle_timeout, tx));
        Self {
            key,
            task: Some(task),
        }
    }

    pub(crate) fn key(&self) -> SessionKey {
        self.key
    }

    /// Closes the transport. Safe to call repeatedly or after the stream ended.
    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(session = self.key, "transport closed");
        }
    }

    /// Returns true once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.task.is_none()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

async fn pump(
    transport: Arc<dyn StreamTransport>,
    request: TransportRequest,
    key: SessionKey,
    idle_timeout: Option<Duration>,
    tx: mpsc::Sender<TransportNotice>,
) {
    let connected = match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, transport.connect(request))
            .await
            .unwrap_or(Err(TransportError::Idle { after: limit })),
        None => transport.connect(request).await,
    };
    let mut stream = match connected {
        Ok(stream) => stream,
        Err(error) => {
            let _ = tx.send(TransportNotice::Failed { session: key, error }).await;
            return;
        }
    };

    loop {
        let next = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
                Ok(next) => next,
                Err(_) => Some(Err(TransportError::Idle { after: limit })),
            },
            None => stream.next().await,
        };
        let notice = match next {
            Some(Ok(message)) => TransportNotice::Message {
                session: key,
                message,
            },
            Some(Err(error)) => TransportNotice::Failed { session: key, error },
            None => TransportNotice::Failed {
                session: key,
                error: TransportError::Closed,
            },
        };
        let failed = matches!(notice, TransportNotice::Failed { .. });
        if tx.send(notice).await.is_err() || failed {
            return;
        }
    }
}
