//! Client aggregate: one live or potential protocol connection.

use super::{
    ClientCapabilities, ClientId, ClientName, ClientStatus, HistoryEntry, HubDomainError,
    ImplementationInfo, InitializeResult, NotificationDirection, RequestHistory, RequestId,
    RequestOutcome, ServerCapabilities, SessionId, StdioTransportConfig,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Connection record for a single tool-provider process.
///
/// The record tracks status, negotiated capabilities and the bounded
/// activity history. Runtime resources such as the open transport live in
/// the client registry, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    id: ClientId,
    session_id: SessionId,
    name: ClientName,
    status: ClientStatus,
    capabilities: ClientCapabilities,
    transport: Option<StdioTransportConfig>,
    server_capabilities: Option<ServerCapabilities>,
    server_info: Option<ImplementationInfo>,
    protocol_version: Option<String>,
    instructions: Option<String>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    history: RequestHistory,
}

/// Parameter object describing a new client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClient {
    /// Owning session.
    pub session_id: SessionId,
    /// Validated client name.
    pub name: ClientName,
    /// Capabilities offered in the handshake.
    pub capabilities: ClientCapabilities,
    /// How to launch the tool-provider process, when the connector needs it.
    pub transport: Option<StdioTransportConfig>,
    /// Maximum number of history entries kept.
    pub history_capacity: usize,
}

impl Client {
    /// Creates a disconnected client with an empty history.
    #[must_use]
    pub fn new(data: NewClient, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: ClientId::new(),
            session_id: data.session_id,
            name: data.name,
            status: ClientStatus::Disconnected,
            capabilities: data.capabilities,
            transport: data.transport,
            server_capabilities: None,
            server_info: None,
            protocol_version: None,
            instructions: None,
            error: None,
            created_at: timestamp,
            last_activity: timestamp,
            history: RequestHistory::with_capacity(data.history_capacity),
        }
    }

    /// Returns the client identifier.
    #[must_use]
    pub const fn id(&self) -> ClientId {
        self.id
    }

    /// Returns the owning session identifier.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Returns the client name.
    #[must_use]
    pub const fn name(&self) -> &ClientName {
        &self.name
    }

    /// Returns the connection status.
    #[must_use]
    pub const fn status(&self) -> ClientStatus {
        self.status
    }

    /// Returns the capabilities offered at connect time.
    #[must_use]
    pub const fn capabilities(&self) -> &ClientCapabilities {
        &self.capabilities
    }

    /// Returns the launch settings, if any.
    #[must_use]
    pub const fn transport(&self) -> Option<&StdioTransportConfig> {
        self.transport.as_ref()
    }

    /// Returns capabilities announced by the remote side while connected.
    #[must_use]
    pub const fn server_capabilities(&self) -> Option<&ServerCapabilities> {
        self.server_capabilities.as_ref()
    }

    /// Returns remote implementation details while connected.
    #[must_use]
    pub const fn server_info(&self) -> Option<&ImplementationInfo> {
        self.server_info.as_ref()
    }

    /// Returns the negotiated protocol version while connected.
    #[must_use]
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    /// Returns guidance text returned by the remote side.
    #[must_use]
    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    /// Returns the last error message.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the time of the last inbound or outbound message.
    #[must_use]
    pub const fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Returns the activity history.
    #[must_use]
    pub const fn history(&self) -> &RequestHistory {
        &self.history
    }

    /// Moves the client into `connecting`.
    ///
    /// # Errors
    ///
    /// Returns [`HubDomainError::InvalidStatusTransition`] unless the client
    /// is `disconnected` or `error`.
    pub fn begin_connecting(&mut self, clock: &impl Clock) -> Result<(), HubDomainError> {
        self.transition_to(ClientStatus::Connecting)?;
        self.touch(clock);
        Ok(())
    }

    /// Stores the handshake outcome and moves the client into `connected`.
    ///
    /// # Errors
    ///
    /// Returns [`HubDomainError::InvalidStatusTransition`] unless the client
    /// is `connecting`.
    pub fn mark_connected(
        &mut self,
        handshake: InitializeResult,
        clock: &impl Clock,
    ) -> Result<(), HubDomainError> {
        self.transition_to(ClientStatus::Connected)?;
        self.server_capabilities = Some(handshake.capabilities);
        self.server_info = handshake.server_info;
        self.protocol_version = handshake.protocol_version;
        self.instructions = handshake.instructions;
        self.error = None;
        self.touch(clock);
        Ok(())
    }

    /// Records a failure and moves the client into `error`.
    ///
    /// # Errors
    ///
    /// Returns [`HubDomainError::InvalidStatusTransition`] unless the client
    /// is `connecting` or `connected`.
    pub fn mark_failed(
        &mut self,
        message: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), HubDomainError> {
        self.transition_to(ClientStatus::Error)?;
        self.error = Some(message.into());
        self.clear_negotiated_state();
        self.touch(clock);
        Ok(())
    }

    /// Moves the client into `disconnected`.
    ///
    /// Returns `false` when the client was already disconnected.
    pub fn mark_disconnected(&mut self, clock: &impl Clock) -> bool {
        if self.status == ClientStatus::Disconnected {
            return false;
        }
        self.status = ClientStatus::Disconnected;
        self.clear_negotiated_state();
        self.touch(clock);
        true
    }

    /// Updates the last activity timestamp.
    pub fn touch(&mut self, clock: &impl Clock) {
        self.last_activity = clock.utc();
    }

    /// Appends a completed request to the history.
    pub fn record_request(
        &mut self,
        id: RequestId,
        method: impl Into<String>,
        params: Option<Value>,
        outcome: RequestOutcome,
        sent_at: DateTime<Utc>,
        clock: &impl Clock,
    ) {
        let completed_at = clock.utc();
        self.history.push(HistoryEntry::Request {
            id,
            method: method.into(),
            params,
            outcome,
            sent_at,
            completed_at,
        });
        self.last_activity = completed_at;
    }

    /// Appends a sent or received notification to the history.
    pub fn record_notification(
        &mut self,
        direction: NotificationDirection,
        method: impl Into<String>,
        params: Option<Value>,
        clock: &impl Clock,
    ) {
        let recorded_at = clock.utc();
        self.history.push(HistoryEntry::Notification {
            direction,
            method: method.into(),
            params,
            recorded_at,
        });
        self.last_activity = recorded_at;
    }

    /// Removes every history entry.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    fn clear_negotiated_state(&mut self) {
        self.server_capabilities = None;
        self.server_info = None;
        self.protocol_version = None;
    }

    fn transition_to(&mut self, target: ClientStatus) -> Result<(), HubDomainError> {
        if !self.status.can_transition_to(target) {
            return Err(HubDomainError::InvalidStatusTransition {
                from: self.status.as_str().to_owned(),
                to: target.as_str().to_owned(),
            });
        }

        self.status = target;
        Ok(())
    }
}
