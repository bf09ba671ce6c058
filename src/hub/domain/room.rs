//! Room aggregate: a named grouping of sessions.

use super::{HubDomainError, RoomId, RoomName, SessionId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Top-level grouping of sessions, analogous to a conversation.
///
/// A room only references its sessions by identifier; it never owns them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    id: RoomId,
    name: RoomName,
    created_at: DateTime<Utc>,
    session_ids: Vec<SessionId>,
    metadata: BTreeMap<String, Value>,
}

impl Room {
    /// Creates an empty room with a fresh identifier.
    #[must_use]
    pub fn new(name: RoomName, clock: &impl Clock) -> Self {
        Self::with_id(RoomId::new(), name, clock)
    }

    /// Creates an empty room with a caller-chosen identifier.
    #[must_use]
    pub fn with_id(id: RoomId, name: RoomName, clock: &impl Clock) -> Self {
        Self {
            id,
            name,
            created_at: clock.utc(),
            session_ids: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Returns the room identifier.
    #[must_use]
    pub const fn id(&self) -> RoomId {
        self.id
    }

    /// Returns the room name.
    #[must_use]
    pub const fn name(&self) -> &RoomName {
        &self.name
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns attached session identifiers in attachment order.
    #[must_use]
    pub fn session_ids(&self) -> &[SessionId] {
        &self.session_ids
    }

    /// Returns whether a session is attached.
    #[must_use]
    pub fn contains_session(&self, session_id: SessionId) -> bool {
        self.session_ids.contains(&session_id)
    }

    /// Returns the metadata bag.
    #[must_use]
    pub const fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    /// Attaches a session. Returns `false` when it was already attached.
    pub fn attach_session(&mut self, session_id: SessionId) -> bool {
        if self.contains_session(session_id) {
            return false;
        }
        self.session_ids.push(session_id);
        true
    }

    /// Detaches a session. Returns `false` when it was not attached.
    pub fn detach_session(&mut self, session_id: SessionId) -> bool {
        let before = self.session_ids.len();
        self.session_ids.retain(|attached| *attached != session_id);
        self.session_ids.len() != before
    }

    /// Renames the room.
    pub fn rename(&mut self, name: RoomName) {
        self.name = name;
    }

    /// Sets a metadata entry, returning the previous value.
    ///
    /// # Errors
    ///
    /// Returns [`HubDomainError::EmptyMetadataKey`] when the key is blank.
    pub fn set_metadata(
        &mut self,
        key: impl Into<String>,
        value: Value,
    ) -> Result<Option<Value>, HubDomainError> {
        let normalized = key.into().trim().to_owned();
        if normalized.is_empty() {
            return Err(HubDomainError::EmptyMetadataKey);
        }
        Ok(self.metadata.insert(normalized, value))
    }
}
