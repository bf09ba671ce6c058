//! Client registry: connection lifecycle and request dispatch.
//!
//! Each client owns at most one transport link at a time. Requests are
//! correlated through the client's pending table; inbound traffic is routed
//! by a per-link pump task (see `inbound`).

mod handle;
mod inbound;

use self::handle::{ActiveLink, ClientHandle};
use super::{HubError, HubResult, SessionRegistry};
use crate::config::HubConfig;
use crate::hub::{
    dispatch::{DispatchError, DispatchResult},
    domain::{
        Client, ClientCapabilities, ClientId, ClientName, ClientStatus, HistoryEntry,
        HubDomainError, InitializeResult, NewClient, Notification, NotificationDirection,
        Request, RequestId, RequestOutcome, SessionId, StdioTransportConfig,
    },
    ports::{SharedNotificationHandler, TransportConnector, TransportLink, TransportTarget},
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

type ClientMap = HashMap<ClientId, Arc<ClientHandle>>;

const INITIALIZE_METHOD: &str = "initialize";
const INITIALIZED_NOTIFICATION: &str = "notifications/initialized";
const PING_METHOD: &str = "ping";

/// Request payload for creating a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateClientRequest {
    /// Owning session.
    pub session_id: SessionId,
    /// Human-readable client name.
    pub name: String,
    /// Capabilities offered in the handshake.
    pub capabilities: ClientCapabilities,
    /// Launch settings for process-backed transports.
    pub transport: Option<StdioTransportConfig>,
}

impl CreateClientRequest {
    /// Creates a request with empty capabilities and no launch settings.
    #[must_use]
    pub fn new(session_id: SessionId, name: impl Into<String>) -> Self {
        Self {
            session_id,
            name: name.into(),
            capabilities: ClientCapabilities::new(),
            transport: None,
        }
    }

    /// Sets the capabilities offered in the handshake.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: ClientCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sets the launch settings.
    #[must_use]
    pub fn with_transport(mut self, transport: StdioTransportConfig) -> Self {
        self.transport = Some(transport);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum RequestTimeout {
    #[default]
    Configured,
    After(Duration),
    Never,
}

/// Per-request dispatch options.
///
/// By default a request uses the configured deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    timeout: RequestTimeout,
}

impl RequestOptions {
    /// Uses the configured deadline.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: RequestTimeout::Configured,
        }
    }

    /// Overrides the deadline for this request.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = RequestTimeout::After(timeout);
        self
    }

    /// Waits for the response indefinitely.
    #[must_use]
    pub const fn no_timeout() -> Self {
        Self {
            timeout: RequestTimeout::Never,
        }
    }

    /// Returns the deadline that applies given the configured default.
    #[must_use]
    pub const fn resolve(self, configured: Option<Duration>) -> Option<Duration> {
        match self.timeout {
            RequestTimeout::Configured => configured,
            RequestTimeout::After(timeout) => Some(timeout),
            RequestTimeout::Never => None,
        }
    }
}

/// Thread-safe registry of clients and their connections.
pub struct ClientRegistry<C>
where
    C: Clock + Send + Sync + 'static,
{
    clients: Arc<RwLock<ClientMap>>,
    sessions: SessionRegistry<C>,
    connector: Arc<dyn TransportConnector>,
    clock: Arc<C>,
    config: Arc<HubConfig>,
}

impl<C> Clone for ClientRegistry<C>
where
    C: Clock + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            clients: Arc::clone(&self.clients),
            sessions: self.sessions.clone(),
            connector: Arc::clone(&self.connector),
            clock: Arc::clone(&self.clock),
            config: Arc::clone(&self.config),
        }
    }
}

fn handler_key(method: &str) -> HubResult<String> {
    let trimmed = method.trim();
    if trimmed.is_empty() {
        return Err(HubDomainError::EmptyMethod.into());
    }
    Ok(trimmed.to_owned())
}

impl<C> ClientRegistry<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Creates an empty registry.
    #[must_use]
    pub fn new(
        sessions: SessionRegistry<C>,
        connector: Arc<dyn TransportConnector>,
        clock: Arc<C>,
        config: Arc<HubConfig>,
    ) -> Self {
        Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
            sessions,
            connector,
            clock,
            config,
        }
    }

    /// Returns the session registry clients are attached to.
    #[must_use]
    pub const fn sessions(&self) -> &SessionRegistry<C> {
        &self.sessions
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    fn read(&self) -> HubResult<RwLockReadGuard<'_, ClientMap>> {
        self.clients
            .read()
            .map_err(|_| HubError::StatePoisoned("client"))
    }

    fn write(&self) -> HubResult<RwLockWriteGuard<'_, ClientMap>> {
        self.clients
            .write()
            .map_err(|_| HubError::StatePoisoned("client"))
    }

    fn handle(&self, client_id: ClientId) -> HubResult<Arc<ClientHandle>> {
        self.read()?
            .get(&client_id)
            .cloned()
            .ok_or(HubError::ClientNotFound(client_id))
    }

    fn connected_handle(&self, client_id: ClientId) -> HubResult<Arc<ClientHandle>> {
        let handle = self.handle(client_id)?;
        let status = handle.status();
        if status != ClientStatus::Connected {
            return Err(HubError::NotConnected { client_id, status });
        }
        Ok(handle)
    }

    fn snapshots(&self, keep: impl Fn(&Client) -> bool) -> HubResult<Vec<Client>> {
        let handles: Vec<Arc<ClientHandle>> = self.read()?.values().cloned().collect();
        let mut clients: Vec<Client> = handles
            .iter()
            .map(|handle| handle.snapshot())
            .filter(|client| keep(client))
            .collect();
        clients.sort_by_key(Client::created_at);
        Ok(clients)
    }

    /// Pushes the aggregate of the session's client statuses to the session
    /// registry.
    ///
    /// Must be called without any client record locked.
    fn refresh_session_status(&self, session_id: SessionId) {
        let refreshed = self.sessions.refresh_status(session_id, || {
            Ok(self
                .read()?
                .values()
                .filter(|handle| handle.session_id == session_id)
                .map(|handle| handle.status())
                .collect())
        });
        if let Err(err) = refreshed {
            warn!(session_id = %session_id, error = %err, "cannot refresh session status");
        }
    }

    /// Creates a disconnected client and attaches it to its session.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid name,
    /// [`HubError::SessionNotFound`], or [`HubError::StatePoisoned`].
    pub fn create_client(&self, request: CreateClientRequest) -> HubResult<Client> {
        let CreateClientRequest {
            session_id,
            name,
            capabilities,
            transport,
        } = request;
        let client_name = ClientName::new(name)?;
        if !self.sessions.contains(session_id)? {
            return Err(HubError::SessionNotFound(session_id));
        }

        let client = Client::new(
            NewClient {
                session_id,
                name: client_name,
                capabilities,
                transport,
                history_capacity: self.config.history_capacity,
            },
            &*self.clock,
        );
        let client_id = client.id();
        self.write()?
            .insert(client_id, Arc::new(ClientHandle::new(client.clone())));

        if let Err(err) = self.sessions.attach_client(session_id, client_id) {
            self.write()?.remove(&client_id);
            return Err(err);
        }
        self.refresh_session_status(session_id);

        info!(
            client_id = %client_id,
            session_id = %session_id,
            name = %client.name(),
            "client created"
        );
        Ok(client)
    }

    /// Returns a snapshot of a client.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::StatePoisoned`].
    pub fn get_client(&self, client_id: ClientId) -> HubResult<Option<Client>> {
        let handle = self.read()?.get(&client_id).cloned();
        Ok(handle.map(|found| found.snapshot()))
    }

    /// Returns every client, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::StatePoisoned`].
    pub fn all_clients(&self) -> HubResult<Vec<Client>> {
        self.snapshots(|_| true)
    }

    /// Returns the clients of a session in attachment order.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::SessionNotFound`] or [`HubError::StatePoisoned`].
    pub fn clients_by_session(&self, session_id: SessionId) -> HubResult<Vec<Client>> {
        let client_ids = self.sessions.session_clients(session_id)?;
        let handles: Vec<Arc<ClientHandle>> = {
            let clients = self.read()?;
            client_ids
                .iter()
                .filter_map(|client_id| clients.get(client_id).cloned())
                .collect()
        };
        Ok(handles.iter().map(|handle| handle.snapshot()).collect())
    }

    /// Returns every connected client, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::StatePoisoned`].
    pub fn connected_clients(&self) -> HubResult<Vec<Client>> {
        self.snapshots(|client| client.status() == ClientStatus::Connected)
    }

    /// Counts the connecting or connected clients among the given ones.
    ///
    /// Unknown identifiers are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::StatePoisoned`].
    pub fn live_client_count(&self, client_ids: &[ClientId]) -> HubResult<usize> {
        let handles: Vec<Arc<ClientHandle>> = {
            let clients = self.read()?;
            client_ids
                .iter()
                .filter_map(|client_id| clients.get(client_id).cloned())
                .collect()
        };
        Ok(handles
            .iter()
            .filter(|handle| handle.status().is_live())
            .count())
    }

    /// Opens a transport and performs the protocol handshake.
    ///
    /// On failure the reason is also stored on the client, which moves to
    /// `error`, and any partially opened transport is closed.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ClientNotFound`], [`HubError::AlreadyConnected`]
    /// while connecting or connected, or [`HubError::HandshakeFailed`].
    pub async fn connect_client(&self, client_id: ClientId) -> HubResult<Client> {
        let handle = self.handle(client_id)?;
        let (attempt, target, capabilities) = {
            let mut record = handle.record();
            let status = record.status();
            if status.is_live() {
                return Err(HubError::AlreadyConnected { client_id, status });
            }
            record.begin_connecting(&*self.clock)?;
            let attempt = handle.advance_epoch();
            let target = TransportTarget {
                client_id,
                client_name: record.name().clone(),
                transport: record.transport().cloned(),
            };
            (attempt, target, record.capabilities().clone())
        };
        self.refresh_session_status(handle.session_id);
        info!(client_id = %client_id, "connecting client");

        let deadline = self.config.connect_timeout();
        let handshake = tokio::time::timeout(
            deadline,
            self.establish(&handle, attempt, target, &capabilities),
        )
        .await
        .unwrap_or_else(|_| {
            Err(format!(
                "handshake timed out after {}ms",
                deadline.as_millis()
            ))
        });

        match handshake {
            Ok(result) => self.finish_connect(&handle, attempt, result),
            Err(reason) => Err(self.abort_connect(&handle, attempt, reason).await),
        }
    }

    async fn establish(
        &self,
        handle: &Arc<ClientHandle>,
        attempt: u64,
        target: TransportTarget,
        capabilities: &ClientCapabilities,
    ) -> Result<InitializeResult, String> {
        let TransportLink { sink, inbound } = self
            .connector
            .open(target)
            .await
            .map_err(|err| err.to_string())?;
        let pump = tokio::spawn(self.clone().run_inbound(Arc::clone(handle), attempt, inbound));
        let link = ActiveLink {
            sink,
            epoch: attempt,
            pump,
        };
        match handle.install_link(link) {
            Ok(None) => {}
            Ok(Some(displaced)) => displaced.release(handle.id, true).await,
            Err(rejected) => {
                rejected.release(handle.id, true).await;
                return Err("connection attempt was cancelled".to_owned());
            }
        }

        let initialize = Request::new(INITIALIZE_METHOD)
            .map_err(|err| err.to_string())?
            .with_params(json!({
                "protocolVersion": self.config.protocol_version,
                "capabilities": capabilities.to_value(),
                "clientInfo": self.config.client_info,
            }));
        let (_, outcome) = self.exchange(handle, &initialize, None).await;
        let value = outcome.map_err(|err| err.to_string())?;
        let result: InitializeResult = serde_json::from_value(value)
            .map_err(|err| format!("invalid initialize result: {err}"))?;

        let initialized = Notification::new(INITIALIZED_NOTIFICATION).map_err(|err| err.to_string())?;
        self.emit(handle, &initialized)
            .await
            .map_err(|err| err.to_string())?;
        Ok(result)
    }

    fn finish_connect(
        &self,
        handle: &ClientHandle,
        attempt: u64,
        result: InitializeResult,
    ) -> HubResult<Client> {
        let outcome = {
            let mut record = handle.record();
            if handle.current_epoch() == attempt && record.status() == ClientStatus::Connecting {
                record
                    .mark_connected(result, &*self.clock)
                    .map(|()| record.clone())
                    .map_err(|err| err.to_string())
            } else {
                Err(record
                    .error()
                    .unwrap_or("connection attempt was cancelled")
                    .to_owned())
            }
        };

        match outcome {
            Ok(client) => {
                self.refresh_session_status(handle.session_id);
                info!(
                    client_id = %handle.id,
                    protocol_version = client.protocol_version().unwrap_or("unknown"),
                    "client connected"
                );
                Ok(client)
            }
            Err(reason) => Err(HubError::HandshakeFailed {
                client_id: handle.id,
                reason,
            }),
        }
    }

    async fn abort_connect(&self, handle: &ClientHandle, attempt: u64, reason: String) -> HubError {
        let owns_attempt = {
            let mut record = handle.record();
            let owns = handle.current_epoch() == attempt && record.status() == ClientStatus::Connecting;
            if owns && let Err(err) = record.mark_failed(reason.clone(), &*self.clock) {
                warn!(client_id = %handle.id, error = %err, "cannot record connection failure");
            }
            owns
        };

        if owns_attempt {
            handle.pending.fail_all(&DispatchError::Cancelled(format!(
                "connection attempt failed: {reason}"
            )));
            if let Some(link) = handle.take_link_if(attempt) {
                link.release(handle.id, true).await;
            }
            self.refresh_session_status(handle.session_id);
        }

        warn!(client_id = %handle.id, reason = %reason, "client connection failed");
        HubError::HandshakeFailed {
            client_id: handle.id,
            reason,
        }
    }

    /// Closes the transport, cancels pending requests and moves the client
    /// to `disconnected`. Disconnecting a disconnected client is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ClientNotFound`] or [`HubError::StatePoisoned`].
    pub async fn disconnect_client(&self, client_id: ClientId) -> HubResult<Client> {
        let handle = self.handle(client_id)?;
        self.shut_down(&handle, "client disconnected").await;
        Ok(handle.snapshot())
    }

    /// Disconnects a client, then removes it from the registry and from its
    /// session. Pending requests resolve with
    /// [`DispatchError::Cancelled`] before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ClientNotFound`] or [`HubError::StatePoisoned`].
    pub async fn delete_client(&self, client_id: ClientId) -> HubResult<Client> {
        let handle = self.handle(client_id)?;
        self.shut_down(&handle, "client deleted").await;
        self.write()?.remove(&client_id);

        match self.sessions.remove_client(handle.session_id, client_id) {
            Ok(_) | Err(HubError::SessionNotFound(_)) => {}
            Err(err) => return Err(err),
        }
        self.refresh_session_status(handle.session_id);

        info!(client_id = %client_id, session_id = %handle.session_id, "client deleted");
        Ok(handle.snapshot())
    }

    /// Returns whether the client changed status.
    async fn shut_down(&self, handle: &ClientHandle, reason: &str) -> bool {
        let changed = {
            let mut record = handle.record();
            handle.advance_epoch();
            record.mark_disconnected(&*self.clock)
        };
        let cancelled = handle
            .pending
            .fail_all(&DispatchError::Cancelled(reason.to_owned()));
        if let Some(link) = handle.take_link() {
            link.release(handle.id, true).await;
        }

        if changed {
            info!(
                client_id = %handle.id,
                cancelled_requests = cancelled,
                reason,
                "client disconnected"
            );
            self.refresh_session_status(handle.session_id);
        }
        changed
    }

    /// Sends a request and decodes its result into `R`.
    ///
    /// Exactly one history entry is appended whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ClientNotFound`], [`HubError::NotConnected`], or a
    /// [`DispatchError`] for timeouts, cancellation, transport failures,
    /// remote errors and results that do not decode into `R`.
    pub async fn send_request<R>(
        &self,
        client_id: ClientId,
        request: Request,
        options: RequestOptions,
    ) -> HubResult<R>
    where
        R: DeserializeOwned,
    {
        let handle = self.connected_handle(client_id)?;
        let sent_at = self.clock.utc();
        let timeout = options.resolve(self.config.default_request_timeout());

        let (id, outcome) = self.exchange(&handle, &request, timeout).await;
        let decoded = outcome.and_then(|value| {
            serde_json::from_value::<R>(value.clone())
                .map(|typed| (value, typed))
                .map_err(|err| DispatchError::invalid_response(request.method(), err))
        });

        let entry = match &decoded {
            Ok((value, _)) => RequestOutcome::Response(value.clone()),
            Err(err) => RequestOutcome::Error(err.to_string()),
        };
        self.record_request(&handle, id, &request, sent_at, entry);

        Ok(decoded.map(|(_, typed)| typed)?)
    }

    /// Sends a request and returns its raw result.
    ///
    /// # Errors
    ///
    /// See [`ClientRegistry::send_request`].
    pub async fn send_request_value(
        &self,
        client_id: ClientId,
        request: Request,
        options: RequestOptions,
    ) -> HubResult<Value> {
        self.send_request::<Value>(client_id, request, options).await
    }

    /// Sends a notification without waiting for any reply.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ClientNotFound`], [`HubError::NotConnected`], or a
    /// transport [`DispatchError`] when the write fails.
    pub async fn send_notification(
        &self,
        client_id: ClientId,
        notification: Notification,
    ) -> HubResult<()> {
        let handle = self.connected_handle(client_id)?;
        self.emit(&handle, &notification).await?;
        handle.record().record_notification(
            NotificationDirection::Outbound,
            notification.method(),
            notification.params().cloned(),
            &*self.clock,
        );
        debug!(client_id = %client_id, method = notification.method(), "notification sent");
        Ok(())
    }

    /// Sends the protocol `ping` request and returns the round-trip time.
    ///
    /// # Errors
    ///
    /// See [`ClientRegistry::send_request`].
    pub async fn ping(&self, client_id: ClientId) -> HubResult<Duration> {
        let started = Instant::now();
        self.send_request_value(client_id, Request::new(PING_METHOD)?, RequestOptions::new())
            .await?;
        Ok(started.elapsed())
    }

    fn record_request(
        &self,
        handle: &ClientHandle,
        id: RequestId,
        request: &Request,
        sent_at: DateTime<Utc>,
        outcome: RequestOutcome,
    ) {
        handle.record().record_request(
            id,
            request.method(),
            request.params().cloned(),
            outcome,
            sent_at,
            &*self.clock,
        );
    }

    /// Writes a request and waits for its outcome.
    ///
    /// The correlation identifier is allocated even when no link is open so
    /// that the history entry can name it.
    async fn exchange(
        &self,
        handle: &ClientHandle,
        request: &Request,
        timeout: Option<Duration>,
    ) -> (RequestId, DispatchResult<Value>) {
        let id = handle.sequence.next_id();
        let outcome = self.await_response(handle, id, request, timeout).await;
        (id, outcome)
    }

    async fn await_response(
        &self,
        handle: &ClientHandle,
        id: RequestId,
        request: &Request,
        timeout: Option<Duration>,
    ) -> DispatchResult<Value> {
        let Some((sink, epoch)) = handle.sink() else {
            return Err(DispatchError::Transport("no open transport".to_owned()));
        };
        let mut receiver = handle.pending.register(id, request.method());
        debug!(
            client_id = %handle.id,
            request_id = %id,
            method = request.method(),
            "sending request"
        );

        if let Err(err) = sink.send(request.encode(id)).await {
            handle.pending.discard(id);
            let reason = err.to_string();
            self.fail_transport(handle, epoch, &reason, true).await;
            return Err(DispatchError::Transport(reason));
        }
        handle.record().touch(&*self.clock);

        let waiter_dropped = || Err(DispatchError::Cancelled("waiter dropped".to_owned()));
        let Some(after) = timeout else {
            return receiver.await.unwrap_or_else(|_| waiter_dropped());
        };
        let timed_out = || {
            Err(DispatchError::Timeout {
                method: request.method().to_owned(),
                after,
            })
        };

        match tokio::time::timeout(after, &mut receiver).await {
            Ok(delivered) => delivered.unwrap_or_else(|_| waiter_dropped()),
            Err(_) if handle.pending.discard(id) => {
                warn!(
                    client_id = %handle.id,
                    request_id = %id,
                    method = request.method(),
                    timeout_ms = u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
                    "request timed out"
                );
                timed_out()
            }
            // The response arrived between the deadline and the discard.
            Err(_) => receiver.try_recv().unwrap_or_else(|_| timed_out()),
        }
    }

    async fn emit(&self, handle: &ClientHandle, notification: &Notification) -> DispatchResult<()> {
        let Some((sink, epoch)) = handle.sink() else {
            return Err(DispatchError::Transport("no open transport".to_owned()));
        };
        if let Err(err) = sink.send(notification.encode()).await {
            let reason = err.to_string();
            self.fail_transport(handle, epoch, &reason, true).await;
            return Err(DispatchError::Transport(reason));
        }
        Ok(())
    }

    /// Tears down a broken link: fails pending requests, closes the sink and
    /// moves a live client to `error`. Links from other epochs are left
    /// alone.
    async fn fail_transport(&self, handle: &ClientHandle, epoch: u64, reason: &str, abort_pump: bool) {
        let Some(link) = handle.take_link_if(epoch) else {
            return;
        };
        let marked = {
            let mut record = handle.record();
            handle.current_epoch() == epoch
                && record
                    .mark_failed(format!("transport failure: {reason}"), &*self.clock)
                    .is_ok()
        };
        let failed = handle
            .pending
            .fail_all(&DispatchError::Transport(reason.to_owned()));
        warn!(
            client_id = %handle.id,
            reason,
            failed_requests = failed,
            "client transport failed"
        );
        link.release(handle.id, abort_pump).await;

        if marked {
            self.refresh_session_status(handle.session_id);
        }
    }

    /// Registers the handler for one notification method, replacing any
    /// previous one. Returns whether a handler was replaced.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ClientNotFound`] or a validation error for a
    /// blank method.
    pub fn set_notification_handler(
        &self,
        client_id: ClientId,
        method: &str,
        handler: SharedNotificationHandler,
    ) -> HubResult<bool> {
        let key = handler_key(method)?;
        let handle = self.handle(client_id)?;
        let replaced = handle.set_handler(key, handler);
        debug!(client_id = %client_id, method, replaced, "notification handler registered");
        Ok(replaced)
    }

    /// Registers several handlers at once. Returns how many were replaced.
    ///
    /// Every method is validated before any handler is registered.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ClientNotFound`] or a validation error for a
    /// blank method.
    pub fn set_notification_handlers<I>(&self, client_id: ClientId, handlers: I) -> HubResult<usize>
    where
        I: IntoIterator<Item = (String, SharedNotificationHandler)>,
    {
        let handle = self.handle(client_id)?;
        let validated = handlers
            .into_iter()
            .map(|(method, handler)| handler_key(&method).map(|key| (key, handler)))
            .collect::<HubResult<Vec<_>>>()?;
        let mut replaced = 0;
        for (key, handler) in validated {
            if handle.set_handler(key, handler) {
                replaced += 1;
            }
        }
        Ok(replaced)
    }

    /// Removes the handler for a method. Returns whether one was registered.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ClientNotFound`].
    pub fn remove_notification_handler(&self, client_id: ClientId, method: &str) -> HubResult<bool> {
        Ok(self.handle(client_id)?.remove_handler(method.trim()))
    }

    /// Returns the methods that have a registered handler, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ClientNotFound`].
    pub fn notification_methods(&self, client_id: ClientId) -> HubResult<Vec<String>> {
        Ok(self.handle(client_id)?.handler_methods())
    }

    /// Returns the client's history, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ClientNotFound`].
    pub fn client_history(&self, client_id: ClientId) -> HubResult<Vec<HistoryEntry>> {
        Ok(self.handle(client_id)?.record().history().to_vec())
    }

    /// Clears the client's history. Returns the number of removed entries.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ClientNotFound`].
    pub fn clear_client_history(&self, client_id: ClientId) -> HubResult<usize> {
        let handle = self.handle(client_id)?;
        let mut record = handle.record();
        let removed = record.history().len();
        record.clear_history();
        Ok(removed)
    }

    /// Disconnects every client. Returns how many changed status.
    pub(crate) async fn disconnect_all(&self, reason: &str) -> HubResult<usize> {
        let handles: Vec<Arc<ClientHandle>> = self.read()?.values().cloned().collect();
        let mut disconnected = 0;
        for handle in &handles {
            if self.shut_down(handle, reason).await {
                disconnected += 1;
            }
        }
        Ok(disconnected)
    }

    pub(crate) fn clear(&self) -> HubResult<usize> {
        let mut clients = self.write()?;
        let count = clients.len();
        clients.clear();
        Ok(count)
    }
}
