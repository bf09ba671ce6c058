//! Hub facade wiring the room, session and client registries together.

use super::{ClientRegistry, HubError, HubResult, RoomRegistry, SessionRegistry};
use crate::config::HubConfig;
use crate::hub::{
    domain::{ClientId, Room, RoomId, Session, SessionId},
    ports::TransportConnector,
};
use mockable::Clock;
use std::sync::Arc;
use tracing::info;

/// What happens to the sessions of a deleted room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomDeletion {
    /// Remove the room only. Its sessions stay registered with a dangling
    /// room reference and show up in [`Hub::orphaned_sessions`].
    DetachSessions,
    /// Delete every session of the room together with its clients.
    Cascade {
        /// Disconnect live clients instead of refusing the deletion.
        force: bool,
    },
}

/// Explicit owner of all registries.
///
/// A hub is constructed with a transport connector and a clock, and torn
/// down with [`Hub::shutdown`]. Registry handles returned by the accessors
/// share state with the hub.
pub struct Hub<C>
where
    C: Clock + Send + Sync + 'static,
{
    rooms: RoomRegistry<C>,
    sessions: SessionRegistry<C>,
    clients: ClientRegistry<C>,
}

impl<C> Clone for Hub<C>
where
    C: Clock + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            rooms: self.rooms.clone(),
            sessions: self.sessions.clone(),
            clients: self.clients.clone(),
        }
    }
}

impl<C> Hub<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Creates a hub with empty registries.
    #[must_use]
    pub fn new(connector: Arc<dyn TransportConnector>, clock: Arc<C>, config: HubConfig) -> Self {
        let rooms = RoomRegistry::new(Arc::clone(&clock), config.default_room_name.clone());
        let sessions = SessionRegistry::new(rooms.clone(), Arc::clone(&clock));
        let clients = ClientRegistry::new(sessions.clone(), connector, clock, Arc::new(config));
        Self {
            rooms,
            sessions,
            clients,
        }
    }

    /// Returns the room registry.
    #[must_use]
    pub const fn rooms(&self) -> &RoomRegistry<C> {
        &self.rooms
    }

    /// Returns the session registry.
    #[must_use]
    pub const fn sessions(&self) -> &SessionRegistry<C> {
        &self.sessions
    }

    /// Returns the client registry.
    #[must_use]
    pub const fn clients(&self) -> &ClientRegistry<C> {
        &self.clients
    }

    /// Deletes a session.
    ///
    /// Without `force` the deletion is refused while any of its clients is
    /// connecting or connected. Otherwise every client is disconnected and
    /// deleted, the session is removed and detached from its room.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::SessionNotFound`],
    /// [`HubError::SessionHasLiveClients`], or [`HubError::StatePoisoned`].
    pub async fn delete_session(&self, session_id: SessionId, force: bool) -> HubResult<Session> {
        let client_ids = self.sessions.session_clients(session_id)?;
        let live_clients = self.clients.live_client_count(&client_ids)?;
        if live_clients > 0 && !force {
            return Err(HubError::SessionHasLiveClients {
                session_id,
                live_clients,
            });
        }

        for client_id in client_ids {
            match self.clients.delete_client(client_id).await {
                Ok(_) | Err(HubError::ClientNotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        self.sessions.remove(session_id)
    }

    /// Deletes a room according to the given policy.
    ///
    /// A cascade without `force` is checked up front: when any client in
    /// any session of the room is live, nothing is changed.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::RoomNotFound`], [`HubError::RoomHasLiveClients`],
    /// or [`HubError::StatePoisoned`].
    pub async fn delete_room(&self, room_id: RoomId, policy: RoomDeletion) -> HubResult<Room> {
        let session_ids = self.rooms.room_sessions(room_id)?;

        match policy {
            RoomDeletion::DetachSessions => {}
            RoomDeletion::Cascade { force } => {
                if !force {
                    let mut live_clients = 0;
                    for session_id in &session_ids {
                        if let Some(session) = self.sessions.get_session(*session_id)? {
                            live_clients += self.clients.live_client_count(session.client_ids())?;
                        }
                    }
                    if live_clients > 0 {
                        return Err(HubError::RoomHasLiveClients {
                            room_id,
                            live_clients,
                        });
                    }
                }

                for session_id in &session_ids {
                    match self.delete_session(*session_id, true).await {
                        Ok(_) | Err(HubError::SessionNotFound(_)) => {}
                        Err(err) => return Err(err),
                    }
                }
            }
        }

        self.rooms.remove(room_id)
    }

    /// Attaches a session to the room it was created in. Attaching twice is
    /// a no-op.
    ///
    /// Returns whether the session was newly attached.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::SessionNotFound`], [`HubError::RoomNotFound`],
    /// [`HubError::ForeignSession`] when the session belongs to another
    /// room, or [`HubError::StatePoisoned`].
    pub fn add_session_to_room(&self, room_id: RoomId, session_id: SessionId) -> HubResult<bool> {
        let owner = self
            .sessions
            .get_session(session_id)?
            .ok_or(HubError::SessionNotFound(session_id))?
            .room_id();
        if owner != room_id {
            return Err(HubError::ForeignSession {
                session_id,
                room_id,
                owner,
            });
        }
        self.rooms.attach_session(room_id, session_id)
    }

    /// Attaches a client to the session it was created in. Attaching twice
    /// is a no-op.
    ///
    /// Returns whether the client was newly attached.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ClientNotFound`], [`HubError::SessionNotFound`],
    /// [`HubError::ForeignClient`] when the client belongs to another
    /// session, or [`HubError::StatePoisoned`].
    pub fn add_client_to_session(
        &self,
        session_id: SessionId,
        client_id: ClientId,
    ) -> HubResult<bool> {
        let owner = self
            .clients
            .get_client(client_id)?
            .ok_or(HubError::ClientNotFound(client_id))?
            .session_id();
        if owner != session_id {
            return Err(HubError::ForeignClient {
                client_id,
                session_id,
                owner,
            });
        }
        self.sessions.attach_client(session_id, client_id)
    }

    /// Returns sessions whose room no longer exists.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::StatePoisoned`].
    pub fn orphaned_sessions(&self) -> HubResult<Vec<Session>> {
        let sessions = self.sessions.list_sessions()?;
        let mut orphaned = Vec::new();
        for session in sessions {
            if !self.rooms.contains(session.room_id())? {
                orphaned.push(session);
            }
        }
        Ok(orphaned)
    }

    /// Disconnects every client, cancelling their pending requests, then
    /// clears all registries.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::StatePoisoned`].
    pub async fn shutdown(&self) -> HubResult<()> {
        let disconnected = self.clients.disconnect_all("hub shut down").await?;
        let clients = self.clients.clear()?;
        let sessions = self.sessions.clear()?;
        let rooms = self.rooms.clear()?;
        info!(disconnected, clients, sessions, rooms, "hub shut down");
        Ok(())
    }
}
