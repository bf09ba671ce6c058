//! Room registry: named groupings of sessions.

use super::{HubError, HubResult};
use crate::hub::domain::{Room, RoomId, RoomName, SessionId};
use mockable::Clock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

type RoomMap = HashMap<RoomId, Room>;

/// Thread-safe registry of rooms.
///
/// Rooms hold session identifiers only. The registry performs no transport
/// I/O and never touches the session or client registries.
pub struct RoomRegistry<C>
where
    C: Clock + Send + Sync,
{
    rooms: Arc<RwLock<RoomMap>>,
    default_name: Arc<str>,
    clock: Arc<C>,
}

impl<C> Clone for RoomRegistry<C>
where
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            rooms: Arc::clone(&self.rooms),
            default_name: Arc::clone(&self.default_name),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C> RoomRegistry<C>
where
    C: Clock + Send + Sync,
{
    /// Creates an empty registry.
    ///
    /// `default_name` is used for rooms created without a name.
    #[must_use]
    pub fn new(clock: Arc<C>, default_name: impl Into<String>) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            default_name: Arc::from(default_name.into()),
            clock,
        }
    }

    fn read(&self) -> HubResult<RwLockReadGuard<'_, RoomMap>> {
        self.rooms
            .read()
            .map_err(|_| HubError::StatePoisoned("room"))
    }

    fn write(&self) -> HubResult<RwLockWriteGuard<'_, RoomMap>> {
        self.rooms
            .write()
            .map_err(|_| HubError::StatePoisoned("room"))
    }

    fn resolve_name(&self, name: Option<&str>) -> HubResult<RoomName> {
        Ok(RoomName::new(name.unwrap_or(&self.default_name))?)
    }

    /// Creates a room, falling back to the default name.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the name is blank or too long, or
    /// [`HubError::StatePoisoned`].
    pub fn create_room(&self, name: Option<&str>) -> HubResult<Room> {
        self.create_room_with_id(RoomId::new(), name)
    }

    /// Creates a room under a caller-chosen identifier.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::DuplicateRoom`] when the identifier is taken, a
    /// validation error for an invalid name, or [`HubError::StatePoisoned`].
    pub fn create_room_with_id(&self, room_id: RoomId, name: Option<&str>) -> HubResult<Room> {
        let room_name = self.resolve_name(name)?;
        let room = Room::with_id(room_id, room_name, &*self.clock);

        let mut rooms = self.write()?;
        if rooms.contains_key(&room_id) {
            return Err(HubError::DuplicateRoom(room_id));
        }
        rooms.insert(room_id, room.clone());
        drop(rooms);

        info!(room_id = %room_id, name = %room.name(), "room created");
        Ok(room)
    }

    /// Returns a snapshot of a room.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::StatePoisoned`].
    pub fn get_room(&self, room_id: RoomId) -> HubResult<Option<Room>> {
        Ok(self.read()?.get(&room_id).cloned())
    }

    /// Returns whether a room exists.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::StatePoisoned`].
    pub fn contains(&self, room_id: RoomId) -> HubResult<bool> {
        Ok(self.read()?.contains_key(&room_id))
    }

    /// Returns every room, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::StatePoisoned`].
    pub fn list_rooms(&self) -> HubResult<Vec<Room>> {
        let mut rooms: Vec<Room> = self.read()?.values().cloned().collect();
        rooms.sort_by_key(Room::created_at);
        Ok(rooms)
    }

    /// Attaches a session to a room without checking the session's owner.
    /// Attaching twice is a no-op.
    ///
    /// Returns whether the session was newly attached.
    pub(crate) fn attach_session(&self, room_id: RoomId, session_id: SessionId) -> HubResult<bool> {
        let mut rooms = self.write()?;
        let room = rooms
            .get_mut(&room_id)
            .ok_or(HubError::RoomNotFound(room_id))?;
        let attached = room.attach_session(session_id);
        drop(rooms);

        if attached {
            debug!(room_id = %room_id, session_id = %session_id, "session attached to room");
        }
        Ok(attached)
    }

    /// Detaches a session from a room. Detaching an unknown session is a
    /// no-op.
    ///
    /// Returns whether the session was attached.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::RoomNotFound`] or [`HubError::StatePoisoned`].
    pub fn remove_session_from_room(
        &self,
        room_id: RoomId,
        session_id: SessionId,
    ) -> HubResult<bool> {
        let mut rooms = self.write()?;
        let room = rooms
            .get_mut(&room_id)
            .ok_or(HubError::RoomNotFound(room_id))?;
        let detached = room.detach_session(session_id);
        drop(rooms);

        if detached {
            debug!(room_id = %room_id, session_id = %session_id, "session detached from room");
        }
        Ok(detached)
    }

    /// Returns the sessions attached to a room in attachment order.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::RoomNotFound`] or [`HubError::StatePoisoned`].
    pub fn room_sessions(&self, room_id: RoomId) -> HubResult<Vec<SessionId>> {
        self.read()?
            .get(&room_id)
            .map(|room| room.session_ids().to_vec())
            .ok_or(HubError::RoomNotFound(room_id))
    }

    /// Renames a room.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::RoomNotFound`], a validation error for an invalid
    /// name, or [`HubError::StatePoisoned`].
    pub fn rename_room(&self, room_id: RoomId, name: &str) -> HubResult<Room> {
        let room_name = RoomName::new(name)?;
        let mut rooms = self.write()?;
        let room = rooms
            .get_mut(&room_id)
            .ok_or(HubError::RoomNotFound(room_id))?;
        room.rename(room_name);
        Ok(room.clone())
    }

    /// Sets a metadata entry on a room, returning the previous value.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::RoomNotFound`], a validation error for a blank
    /// key, or [`HubError::StatePoisoned`].
    pub fn set_room_metadata(
        &self,
        room_id: RoomId,
        key: &str,
        value: Value,
    ) -> HubResult<Option<Value>> {
        let mut rooms = self.write()?;
        let room = rooms
            .get_mut(&room_id)
            .ok_or(HubError::RoomNotFound(room_id))?;
        Ok(room.set_metadata(key, value)?)
    }

    /// Removes a room without touching the sessions it references.
    pub(crate) fn remove(&self, room_id: RoomId) -> HubResult<Room> {
        let removed = self
            .write()?
            .remove(&room_id)
            .ok_or(HubError::RoomNotFound(room_id))?;
        info!(room_id = %room_id, sessions = removed.session_ids().len(), "room deleted");
        Ok(removed)
    }

    pub(crate) fn clear(&self) -> HubResult<usize> {
        let mut rooms = self.write()?;
        let count = rooms.len();
        rooms.clear();
        Ok(count)
    }
}
