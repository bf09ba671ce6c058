//! Caller-facing error type for hub operations.

use crate::hub::{
    dispatch::DispatchError,
    domain::{ClientId, ClientStatus, HubDomainError, RoomId, SessionId},
    ports::TransportError,
};
use std::fmt;
use thiserror::Error;

/// Result type for hub operations.
pub type HubResult<T> = Result<T, HubError>;

/// Coarse error category used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown room, session or client.
    NotFound,
    /// Duplicate create, delete with live children, or connect while live.
    Conflict,
    /// Request or notification on a client that is not connected.
    NotConnected,
    /// The connection attempt was rejected or failed.
    HandshakeFailed,
    /// The request deadline elapsed.
    Timeout,
    /// The request was aborted by a disconnect or delete.
    Cancelled,
    /// The transport failed.
    Transport,
    /// The remote side answered with an error.
    Remote,
    /// The response did not match the expected shape.
    InvalidResponse,
    /// Input failed domain validation.
    Validation,
    /// Internal registry state is unusable.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::NotConnected => "not_connected",
            Self::HandshakeFailed => "handshake_failed",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Transport => "transport",
            Self::Remote => "remote",
            Self::InvalidResponse => "invalid_response",
            Self::Validation => "validation",
            Self::Internal => "internal",
        };
        formatter.write_str(label)
    }
}

/// Errors returned by registry and dispatch operations.
#[derive(Debug, Error)]
pub enum HubError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] HubDomainError),

    /// A dispatched request failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The transport adapter failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No room exists with the given identifier.
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// No session exists with the given identifier.
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// No client exists with the given identifier.
    #[error("client {0} not found")]
    ClientNotFound(ClientId),

    /// A room with the given identifier already exists.
    #[error("room {0} already exists")]
    DuplicateRoom(RoomId),

    /// The client is already connecting or connected.
    #[error("client {client_id} is already {status}")]
    AlreadyConnected {
        /// Client identifier.
        client_id: ClientId,
        /// Current status.
        status: ClientStatus,
    },

    /// The session belongs to a different room.
    #[error("session {session_id} belongs to room {owner}, not room {room_id}")]
    ForeignSession {
        /// Session identifier.
        session_id: SessionId,
        /// Room the session was offered to.
        room_id: RoomId,
        /// Room the session was created in.
        owner: RoomId,
    },

    /// The client belongs to a different session.
    #[error("client {client_id} belongs to session {owner}, not session {session_id}")]
    ForeignClient {
        /// Client identifier.
        client_id: ClientId,
        /// Session the client was offered to.
        session_id: SessionId,
        /// Session the client was created in.
        owner: SessionId,
    },

    /// The session still has live clients.
    #[error("session {session_id} has {live_clients} live client(s)")]
    SessionHasLiveClients {
        /// Session identifier.
        session_id: SessionId,
        /// Number of connecting or connected clients.
        live_clients: usize,
    },

    /// The room still has sessions with live clients.
    #[error("room {room_id} has {live_clients} live client(s)")]
    RoomHasLiveClients {
        /// Room identifier.
        room_id: RoomId,
        /// Number of connecting or connected clients across its sessions.
        live_clients: usize,
    },

    /// The client is not connected.
    #[error("client {client_id} is not connected (current status: {status})")]
    NotConnected {
        /// Client identifier.
        client_id: ClientId,
        /// Current status.
        status: ClientStatus,
    },

    /// The connection attempt failed; the reason is also stored on the client.
    #[error("handshake with client {client_id} failed: {reason}")]
    HandshakeFailed {
        /// Client identifier.
        client_id: ClientId,
        /// Failure description.
        reason: String,
    },

    /// A registry lock was poisoned by a panicking thread.
    #[error("{0} registry state is poisoned")]
    StatePoisoned(&'static str),
}

impl HubError {
    /// Maps the error onto its category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(_) => ErrorKind::Validation,
            Self::Dispatch(dispatch) => match dispatch {
                DispatchError::Timeout { .. } => ErrorKind::Timeout,
                DispatchError::Cancelled(_) => ErrorKind::Cancelled,
                DispatchError::Transport(_) => ErrorKind::Transport,
                DispatchError::Remote(_) => ErrorKind::Remote,
                DispatchError::InvalidResponse { .. } => ErrorKind::InvalidResponse,
            },
            Self::Transport(_) => ErrorKind::Transport,
            Self::RoomNotFound(_) | Self::SessionNotFound(_) | Self::ClientNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::DuplicateRoom(_)
            | Self::AlreadyConnected { .. }
            | Self::ForeignSession { .. }
            | Self::ForeignClient { .. }
            | Self::SessionHasLiveClients { .. }
            | Self::RoomHasLiveClients { .. } => ErrorKind::Conflict,
            Self::NotConnected { .. } => ErrorKind::NotConnected,
            Self::HandshakeFailed { .. } => ErrorKind::HandshakeFailed,
            Self::StatePoisoned(_) => ErrorKind::Internal,
        }
    }
}
