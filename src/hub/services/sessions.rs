//! Session registry: groupings of clients inside rooms.

use super::{HubError, HubResult, RoomRegistry};
use crate::hub::domain::{
    ClientId, ClientStatus, RoomId, Session, SessionId, SessionStatus, TransportSessionId,
};
use mockable::Clock;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

type SessionMap = HashMap<SessionId, Session>;

/// Thread-safe registry of sessions.
///
/// The registry keeps room membership in step with its own map: creating a
/// session attaches it to its room, removing one detaches it.
pub struct SessionRegistry<C>
where
    C: Clock + Send + Sync,
{
    sessions: Arc<RwLock<SessionMap>>,
    rooms: RoomRegistry<C>,
    clock: Arc<C>,
}

impl<C> Clone for SessionRegistry<C>
where
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            rooms: self.rooms.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C> SessionRegistry<C>
where
    C: Clock + Send + Sync,
{
    /// Creates an empty registry backed by the given room registry.
    #[must_use]
    pub fn new(rooms: RoomRegistry<C>, clock: Arc<C>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            rooms,
            clock,
        }
    }

    /// Returns the room registry this registry attaches sessions to.
    #[must_use]
    pub const fn rooms(&self) -> &RoomRegistry<C> {
        &self.rooms
    }

    fn read(&self) -> HubResult<RwLockReadGuard<'_, SessionMap>> {
        self.sessions
            .read()
            .map_err(|_| HubError::StatePoisoned("session"))
    }

    fn write(&self) -> HubResult<RwLockWriteGuard<'_, SessionMap>> {
        self.sessions
            .write()
            .map_err(|_| HubError::StatePoisoned("session"))
    }

    fn update<T>(
        &self,
        session_id: SessionId,
        apply: impl FnOnce(&mut Session, &C) -> T,
    ) -> HubResult<T> {
        let mut sessions = self.write()?;
        let session = sessions
            .get_mut(&session_id)
            .ok_or(HubError::SessionNotFound(session_id))?;
        Ok(apply(session, &*self.clock))
    }

    /// Creates an inactive session and attaches it to its room.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::RoomNotFound`] when the room does not exist, or
    /// [`HubError::StatePoisoned`].
    pub fn create_session(&self, room_id: RoomId) -> HubResult<Session> {
        if !self.rooms.contains(room_id)? {
            return Err(HubError::RoomNotFound(room_id));
        }

        let session = Session::new(room_id, &*self.clock);
        let session_id = session.id();
        self.write()?.insert(session_id, session.clone());

        // The room may have been deleted since the existence check.
        if let Err(err) = self.rooms.attach_session(room_id, session_id) {
            self.write()?.remove(&session_id);
            return Err(err);
        }

        info!(session_id = %session_id, room_id = %room_id, "session created");
        Ok(session)
    }

    /// Returns a snapshot of a session.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::StatePoisoned`].
    pub fn get_session(&self, session_id: SessionId) -> HubResult<Option<Session>> {
        Ok(self.read()?.get(&session_id).cloned())
    }

    /// Returns whether a session exists.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::StatePoisoned`].
    pub fn contains(&self, session_id: SessionId) -> HubResult<bool> {
        Ok(self.read()?.contains_key(&session_id))
    }

    /// Returns every session, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::StatePoisoned`].
    pub fn list_sessions(&self) -> HubResult<Vec<Session>> {
        let mut sessions: Vec<Session> = self.read()?.values().cloned().collect();
        sessions.sort_by_key(Session::created_at);
        Ok(sessions)
    }

    /// Returns the sessions whose back-reference names the given room.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::StatePoisoned`].
    pub fn sessions_in_room(&self, room_id: RoomId) -> HubResult<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .read()?
            .values()
            .filter(|session| session.room_id() == room_id)
            .cloned()
            .collect();
        sessions.sort_by_key(Session::created_at);
        Ok(sessions)
    }

    /// Returns the clients attached to a session in attachment order.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::SessionNotFound`] or [`HubError::StatePoisoned`].
    pub fn session_clients(&self, session_id: SessionId) -> HubResult<Vec<ClientId>> {
        self.read()?
            .get(&session_id)
            .map(|session| session.client_ids().to_vec())
            .ok_or(HubError::SessionNotFound(session_id))
    }

    /// Attaches a client to a session without checking the client's owner.
    /// Attaching twice is a no-op.
    pub(crate) fn attach_client(&self, session_id: SessionId, client_id: ClientId) -> HubResult<bool> {
        self.update(session_id, |session, clock| {
            session.attach_client(client_id, clock)
        })
    }

    /// Detaches a client from a session. Detaching an unknown client is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::SessionNotFound`] or [`HubError::StatePoisoned`].
    pub fn remove_client(&self, session_id: SessionId, client_id: ClientId) -> HubResult<bool> {
        self.update(session_id, |session, clock| {
            session.detach_client(client_id, clock)
        })
    }

    /// Sets or clears the transport-level session identifier.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::SessionNotFound`] or [`HubError::StatePoisoned`].
    pub fn set_transport_id(
        &self,
        session_id: SessionId,
        transport_session_id: Option<TransportSessionId>,
    ) -> HubResult<Session> {
        self.update(session_id, |session, clock| {
            session.set_transport_session_id(transport_session_id, clock);
            session.clone()
        })
    }

    /// Overrides the aggregate status.
    ///
    /// The override holds until the next client status change recomputes
    /// the aggregate. Returns whether the status changed.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::SessionNotFound`] or [`HubError::StatePoisoned`].
    pub fn update_status(&self, session_id: SessionId, status: SessionStatus) -> HubResult<bool> {
        self.update(session_id, |session, clock| session.set_status(status, clock))
    }

    /// Recomputes the aggregate status of a session from its client
    /// statuses. A session that no longer exists is skipped.
    ///
    /// `collect` runs while the session map is write-locked, so concurrent
    /// refreshes publish in the order they observed the client statuses.
    pub(crate) fn refresh_status(
        &self,
        session_id: SessionId,
        collect: impl FnOnce() -> HubResult<Vec<ClientStatus>>,
    ) -> HubResult<Option<SessionStatus>> {
        let mut sessions = self.write()?;
        let Some(session) = sessions.get_mut(&session_id) else {
            return Ok(None);
        };
        let statuses = collect()?;
        if session.apply_client_statuses(statuses, &*self.clock) {
            debug!(
                session_id = %session_id,
                status = %session.status(),
                "session status changed"
            );
        }
        Ok(Some(session.status()))
    }

    /// Removes a session and detaches it from its room.
    ///
    /// The owning room may already be gone when it was deleted with the
    /// detach policy.
    pub(crate) fn remove(&self, session_id: SessionId) -> HubResult<Session> {
        let removed = self
            .write()?
            .remove(&session_id)
            .ok_or(HubError::SessionNotFound(session_id))?;

        match self
            .rooms
            .remove_session_from_room(removed.room_id(), session_id)
        {
            Ok(_) | Err(HubError::RoomNotFound(_)) => {}
            Err(err) => {
                warn!(
                    session_id = %session_id,
                    room_id = %removed.room_id(),
                    error = %err,
                    "failed to detach deleted session from its room"
                );
            }
        }

        info!(session_id = %session_id, room_id = %removed.room_id(), "session deleted");
        Ok(removed)
    }

    pub(crate) fn clear(&self) -> HubResult<usize> {
        let mut sessions = self.write()?;
        let count = sessions.len();
        sessions.clear();
        Ok(count)
    }
}
