//! Session aggregate: a grouping of clients inside a room.

use super::{ClientId, ClientStatus, RoomId, SessionId, SessionStatus, TransportSessionId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Grouping of clients that share a transport-level context.
///
/// `room_id` is a back-reference fixed at creation. It may dangle after the
/// room is deleted with the detach policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    room_id: RoomId,
    transport_session_id: Option<TransportSessionId>,
    client_ids: Vec<ClientId>,
    status: SessionStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Session {
    /// Creates an inactive session with no clients.
    #[must_use]
    pub fn new(room_id: RoomId, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: SessionId::new(),
            room_id,
            transport_session_id: None,
            client_ids: Vec::new(),
            status: SessionStatus::Inactive,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Returns the session identifier.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the owning room identifier.
    #[must_use]
    pub const fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Returns the transport-level session identifier, if assigned.
    #[must_use]
    pub const fn transport_session_id(&self) -> Option<&TransportSessionId> {
        self.transport_session_id.as_ref()
    }

    /// Returns attached client identifiers in attachment order.
    #[must_use]
    pub fn client_ids(&self) -> &[ClientId] {
        &self.client_ids
    }

    /// Returns whether a client is attached.
    #[must_use]
    pub fn contains_client(&self, client_id: ClientId) -> bool {
        self.client_ids.contains(&client_id)
    }

    /// Returns the aggregate status.
    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        self.status
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Attaches a client. Returns `false` when it was already attached.
    pub fn attach_client(&mut self, client_id: ClientId, clock: &impl Clock) -> bool {
        if self.contains_client(client_id) {
            return false;
        }
        self.client_ids.push(client_id);
        self.touch(clock);
        true
    }

    /// Detaches a client. Returns `false` when it was not attached.
    pub fn detach_client(&mut self, client_id: ClientId, clock: &impl Clock) -> bool {
        let before = self.client_ids.len();
        self.client_ids.retain(|attached| *attached != client_id);
        let removed = self.client_ids.len() != before;
        if removed {
            self.touch(clock);
        }
        removed
    }

    /// Sets or clears the transport-level session identifier.
    pub fn set_transport_session_id(
        &mut self,
        transport_session_id: Option<TransportSessionId>,
        clock: &impl Clock,
    ) {
        self.transport_session_id = transport_session_id;
        self.touch(clock);
    }

    /// Overrides the aggregate status. Returns whether it changed.
    pub fn set_status(&mut self, status: SessionStatus, clock: &impl Clock) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        self.touch(clock);
        true
    }

    /// Recomputes the aggregate status from client statuses.
    ///
    /// Returns whether the status changed.
    pub fn apply_client_statuses(
        &mut self,
        statuses: impl IntoIterator<Item = ClientStatus>,
        clock: &impl Clock,
    ) -> bool {
        self.set_status(SessionStatus::aggregate(statuses), clock)
    }

    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}
