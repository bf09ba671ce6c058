//! Transport port: a duplex message channel to a tool-provider process.

use crate::hub::domain::{ClientId, ClientName, StdioTransportConfig};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Event delivered on the inbound side of a transport link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One raw protocol message.
    Message(String),
    /// The channel broke or the remote process exited.
    Closed {
        /// Description of why the channel closed, when known.
        reason: Option<String>,
    },
}

/// Outbound half of an open transport link.
#[async_trait]
pub trait TransportSink: Send + Sync {
    /// Writes one raw protocol message.
    async fn send(&self, message: String) -> TransportResult<()>;

    /// Closes the channel and releases the underlying process or handle.
    ///
    /// Closing an already closed sink succeeds.
    async fn close(&self) -> TransportResult<()>;
}

/// Open transport link handed to a client.
///
/// The client owns the link exclusively until it disconnects.
pub struct TransportLink {
    /// Outbound half.
    pub sink: Arc<dyn TransportSink>,
    /// Inbound messages and close events.
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

impl TransportLink {
    /// Bundles the two halves of a link.
    #[must_use]
    pub fn new(
        sink: Arc<dyn TransportSink>,
        inbound: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self { sink, inbound }
    }
}

impl std::fmt::Debug for TransportLink {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("TransportLink")
            .finish_non_exhaustive()
    }
}

/// Description of the client a link is opened for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportTarget {
    /// Client identifier.
    pub client_id: ClientId,
    /// Client name.
    pub client_name: ClientName,
    /// Launch settings recorded on the client, if any.
    pub transport: Option<StdioTransportConfig>,
}

/// Opens transport links for clients.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Opens a new link for the given client.
    async fn open(&self, target: TransportTarget) -> TransportResult<TransportLink>;
}

/// Errors returned by transport adapters.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The adapter cannot serve this client.
    #[error("unsupported transport for client {client_id}: {reason}")]
    UnsupportedTarget {
        /// Client identifier.
        client_id: ClientId,
        /// Reason string.
        reason: String,
    },

    /// The channel is already closed.
    #[error("transport channel is closed")]
    Closed,

    /// Generic adapter failure.
    #[error("transport runtime error: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Wraps an adapter runtime error.
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }
}
