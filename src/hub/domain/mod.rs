//! Domain model for rooms, sessions and client connections.
//!
//! The hub domain models identity, the client connection state machine,
//! aggregate session status, negotiated capabilities, protocol envelopes and
//! the bounded activity history. Runtime concerns such as open transports
//! remain outside this boundary.

mod capabilities;
mod client;
mod envelope;
mod error;
mod history;
mod ids;
mod room;
mod session;
mod status;
mod transport;

pub use capabilities::{
    ClientCapabilities, ImplementationInfo, InitializeResult, ServerCapabilities,
};
pub use client::{Client, NewClient};
pub use envelope::{
    EnvelopeError, InboundMessage, JSONRPC_VERSION, METHOD_NOT_FOUND, Notification, Request,
    RpcError,
};
pub use error::{HubDomainError, ParseClientStatusError, ParseSessionStatusError};
pub use history::{HistoryEntry, NotificationDirection, RequestHistory, RequestOutcome};
pub use ids::{ClientId, ClientName, RequestId, RoomId, RoomName, SessionId, TransportSessionId};
pub use room::Room;
pub use session::Session;
pub use status::{ClientStatus, SessionStatus};
pub use transport::StdioTransportConfig;
