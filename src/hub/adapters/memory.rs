//! Scripted loopback transport for tests and deterministic local flows.

use crate::hub::{
    domain::{ClientId, JSONRPC_VERSION, RpcError},
    ports::{
        TransportConnector, TransportError, TransportEvent, TransportLink, TransportResult,
        TransportSink, TransportTarget,
    },
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{Notify, mpsc};

/// How the loopback peer answers the `initialize` request.
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeScript {
    /// Reply with the given initialize result.
    Accept(Value),
    /// Reply with an error object.
    Reject(RpcError),
    /// Never reply; the request is held like any other.
    Hang,
    /// Close the channel instead of replying.
    DropConnection,
}

impl Default for HandshakeScript {
    fn default() -> Self {
        Self::Accept(json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {"tools": {"listChanged": true}},
            "serverInfo": {"name": "loopback", "version": "1.0.0"},
        }))
    }
}

/// Request written by the hub and held until the test replies.
#[derive(Debug, Clone, PartialEq)]
pub struct HeldRequest {
    /// Raw correlation identifier.
    pub id: Value,
    /// Requested method.
    pub method: String,
    /// Request parameters.
    pub params: Option<Value>,
}

#[derive(Debug, Default)]
struct PeerState {
    sender: Option<mpsc::UnboundedSender<TransportEvent>>,
    sent: Vec<Value>,
    held: Vec<HeldRequest>,
    opens: usize,
    closes: usize,
}

#[derive(Debug, Default)]
struct LoopbackState {
    peers: HashMap<ClientId, PeerState>,
    handshakes: HashMap<ClientId, HandshakeScript>,
    default_handshake: HandshakeScript,
    canned: HashMap<String, Result<Value, RpcError>>,
    broken_writes: HashSet<ClientId>,
    fail_next_open: Option<String>,
}

impl LoopbackState {
    fn peer_mut(&mut self, client_id: ClientId) -> TransportResult<&mut PeerState> {
        self.peers.get_mut(&client_id).ok_or(TransportError::Closed)
    }

    fn deliver(&mut self, client_id: ClientId, event: TransportEvent) -> TransportResult<()> {
        let peer = self.peer_mut(client_id)?;
        let sender = peer.sender.as_ref().ok_or(TransportError::Closed)?;
        sender.send(event).map_err(|_| TransportError::Closed)
    }

    fn drop_link(&mut self, client_id: ClientId, reason: Option<String>) -> TransportResult<()> {
        let peer = self.peer_mut(client_id)?;
        let sender = peer.sender.take().ok_or(TransportError::Closed)?;
        // The receiver may already be gone when the hub tore the link down.
        let _unused = sender.send(TransportEvent::Closed { reason });
        Ok(())
    }
}

fn response(id: &Value, outcome: Result<Value, RpcError>) -> TransportEvent {
    let envelope = match outcome {
        Ok(result) => json!({"jsonrpc": JSONRPC_VERSION, "id": id, "result": result}),
        Err(error) => json!({"jsonrpc": JSONRPC_VERSION, "id": id, "error": error}),
    };
    TransportEvent::Message(envelope.to_string())
}

/// Thread-safe loopback connector.
///
/// Every client gets its own scripted peer. Requests are answered from the
/// canned responses when one is registered for the method, otherwise they
/// are held until [`InMemoryTransport::reply`] is called. Clones share
/// state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransport {
    state: Arc<RwLock<LoopbackState>>,
    held_changed: Arc<Notify>,
}

impl InMemoryTransport {
    /// Creates a transport that accepts every handshake.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> TransportResult<RwLockReadGuard<'_, LoopbackState>> {
        self.state
            .read()
            .map_err(|err| TransportError::runtime(std::io::Error::other(err.to_string())))
    }

    fn write(&self) -> TransportResult<RwLockWriteGuard<'_, LoopbackState>> {
        self.state
            .write()
            .map_err(|err| TransportError::runtime(std::io::Error::other(err.to_string())))
    }

    /// Sets the handshake behaviour for clients without their own script.
    ///
    /// # Errors
    ///
    /// Returns transport runtime errors when lock acquisition fails.
    pub fn set_default_handshake(&self, script: HandshakeScript) -> TransportResult<()> {
        self.write()?.default_handshake = script;
        Ok(())
    }

    /// Sets the handshake behaviour for one client.
    ///
    /// # Errors
    ///
    /// Returns transport runtime errors when lock acquisition fails.
    pub fn script_handshake(
        &self,
        client_id: ClientId,
        script: HandshakeScript,
    ) -> TransportResult<()> {
        self.write()?.handshakes.insert(client_id, script);
        Ok(())
    }

    /// Answers every request for `method` immediately with `result`.
    ///
    /// # Errors
    ///
    /// Returns transport runtime errors when lock acquisition fails.
    pub fn respond_with(&self, method: impl Into<String>, result: Value) -> TransportResult<()> {
        self.write()?.canned.insert(method.into(), Ok(result));
        Ok(())
    }

    /// Answers every request for `method` immediately with `error`.
    ///
    /// # Errors
    ///
    /// Returns transport runtime errors when lock acquisition fails.
    pub fn respond_with_error(
        &self,
        method: impl Into<String>,
        error: RpcError,
    ) -> TransportResult<()> {
        self.write()?.canned.insert(method.into(), Err(error));
        Ok(())
    }

    /// Makes the next `open` call fail with the given reason.
    ///
    /// # Errors
    ///
    /// Returns transport runtime errors when lock acquisition fails.
    pub fn fail_next_open(&self, reason: impl Into<String>) -> TransportResult<()> {
        self.write()?.fail_next_open = Some(reason.into());
        Ok(())
    }

    /// Makes every later write on the client's link fail.
    ///
    /// # Errors
    ///
    /// Returns transport runtime errors when lock acquisition fails.
    pub fn break_writes(&self, client_id: ClientId) -> TransportResult<()> {
        self.write()?.broken_writes.insert(client_id);
        Ok(())
    }

    /// Returns the requests waiting for a reply, oldest first.
    ///
    /// # Errors
    ///
    /// Returns transport runtime errors when lock acquisition fails.
    pub fn held_requests(&self, client_id: ClientId) -> TransportResult<Vec<HeldRequest>> {
        Ok(self
            .read()?
            .peers
            .get(&client_id)
            .map(|peer| peer.held.clone())
            .unwrap_or_default())
    }

    /// Waits until at least `count` requests are held for the client.
    ///
    /// # Errors
    ///
    /// Returns transport runtime errors when lock acquisition fails.
    pub async fn wait_for_held_requests(
        &self,
        client_id: ClientId,
        count: usize,
    ) -> TransportResult<Vec<HeldRequest>> {
        loop {
            let changed = self.held_changed.notified();
            let held = self.held_requests(client_id)?;
            if held.len() >= count {
                return Ok(held);
            }
            changed.await;
        }
    }

    /// Answers a held request with a result.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] when the client has no open link.
    pub fn reply(&self, client_id: ClientId, id: &Value, result: Value) -> TransportResult<()> {
        self.answer(client_id, id, Ok(result))
    }

    /// Answers a held request with an error object.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] when the client has no open link.
    pub fn reply_error(
        &self,
        client_id: ClientId,
        id: &Value,
        error: RpcError,
    ) -> TransportResult<()> {
        self.answer(client_id, id, Err(error))
    }

    fn answer(
        &self,
        client_id: ClientId,
        id: &Value,
        outcome: Result<Value, RpcError>,
    ) -> TransportResult<()> {
        let mut state = self.write()?;
        state
            .peer_mut(client_id)?
            .held
            .retain(|request| request.id != *id);
        state.deliver(client_id, response(id, outcome))
    }

    /// Delivers a notification to the hub.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] when the client has no open link.
    pub fn push_notification(
        &self,
        client_id: ClientId,
        method: &str,
        params: Option<Value>,
    ) -> TransportResult<()> {
        let mut envelope = json!({"jsonrpc": JSONRPC_VERSION, "method": method});
        if let (Some(payload), Some(object)) = (params, envelope.as_object_mut()) {
            object.insert("params".to_owned(), payload);
        }
        self.push_raw(client_id, envelope.to_string())
    }

    /// Delivers an arbitrary raw message to the hub.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] when the client has no open link.
    pub fn push_raw(&self, client_id: ClientId, raw: impl Into<String>) -> TransportResult<()> {
        self.write()?
            .deliver(client_id, TransportEvent::Message(raw.into()))
    }

    /// Simulates the remote process going away.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] when the client has no open link.
    pub fn drop_connection(&self, client_id: ClientId, reason: &str) -> TransportResult<()> {
        self.write()?.drop_link(client_id, Some(reason.to_owned()))
    }

    /// Returns every message the hub wrote for the client, across links.
    ///
    /// # Errors
    ///
    /// Returns transport runtime errors when lock acquisition fails.
    pub fn sent_messages(&self, client_id: ClientId) -> TransportResult<Vec<Value>> {
        Ok(self
            .read()?
            .peers
            .get(&client_id)
            .map(|peer| peer.sent.clone())
            .unwrap_or_default())
    }

    /// Returns the method of every message the hub wrote for the client.
    ///
    /// # Errors
    ///
    /// Returns transport runtime errors when lock acquisition fails.
    pub fn sent_methods(&self, client_id: ClientId) -> TransportResult<Vec<String>> {
        Ok(self
            .sent_messages(client_id)?
            .iter()
            .filter_map(|message| message.get("method").and_then(Value::as_str))
            .map(str::to_owned)
            .collect())
    }

    /// Returns whether the client's current link is closed, or was never
    /// opened.
    ///
    /// # Errors
    ///
    /// Returns transport runtime errors when lock acquisition fails.
    pub fn is_closed(&self, client_id: ClientId) -> TransportResult<bool> {
        Ok(self
            .read()?
            .peers
            .get(&client_id)
            .is_none_or(|peer| peer.sender.is_none()))
    }

    /// Returns how many links were opened for the client.
    ///
    /// # Errors
    ///
    /// Returns transport runtime errors when lock acquisition fails.
    pub fn open_count(&self, client_id: ClientId) -> TransportResult<usize> {
        Ok(self
            .read()?
            .peers
            .get(&client_id)
            .map_or(0, |peer| peer.opens))
    }

    /// Returns how many times the hub closed a link for the client.
    ///
    /// # Errors
    ///
    /// Returns transport runtime errors when lock acquisition fails.
    pub fn close_count(&self, client_id: ClientId) -> TransportResult<usize> {
        Ok(self
            .read()?
            .peers
            .get(&client_id)
            .map_or(0, |peer| peer.closes))
    }

    fn accept(&self, client_id: ClientId, raw: &str) -> TransportResult<()> {
        let message: Value = serde_json::from_str(raw).map_err(TransportError::runtime)?;
        let mut state = self.write()?;
        if state.broken_writes.contains(&client_id) {
            return Err(TransportError::runtime(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "loopback write failed",
            )));
        }
        {
            let peer = state.peer_mut(client_id)?;
            if peer.sender.is_none() {
                return Err(TransportError::Closed);
            }
            peer.sent.push(message.clone());
        }

        let (Some(id), Some(method)) = (
            message.get("id").cloned(),
            message.get("method").and_then(Value::as_str).map(str::to_owned),
        ) else {
            return Ok(());
        };
        let params = message.get("params").cloned();

        if method == "initialize" {
            let script = state
                .handshakes
                .get(&client_id)
                .unwrap_or(&state.default_handshake)
                .clone();
            return match script {
                HandshakeScript::Accept(result) => state.deliver(client_id, response(&id, Ok(result))),
                HandshakeScript::Reject(error) => state.deliver(client_id, response(&id, Err(error))),
                HandshakeScript::DropConnection => {
                    state.drop_link(client_id, Some("peer dropped the handshake".to_owned()))
                }
                HandshakeScript::Hang => {
                    self.hold(&mut state, client_id, HeldRequest { id, method, params })
                }
            };
        }

        if let Some(outcome) = state.canned.get(&method).cloned() {
            return state.deliver(client_id, response(&id, outcome));
        }
        self.hold(&mut state, client_id, HeldRequest { id, method, params })
    }

    fn hold(
        &self,
        state: &mut LoopbackState,
        client_id: ClientId,
        request: HeldRequest,
    ) -> TransportResult<()> {
        state.peer_mut(client_id)?.held.push(request);
        self.held_changed.notify_waiters();
        Ok(())
    }

    fn close_link(&self, client_id: ClientId) -> TransportResult<()> {
        let mut state = self.write()?;
        let peer = state.peer_mut(client_id)?;
        if peer.sender.take().is_some() {
            peer.closes += 1;
            peer.held.clear();
        }
        Ok(())
    }
}

struct LoopbackSink {
    client_id: ClientId,
    transport: InMemoryTransport,
}

#[async_trait]
impl TransportSink for LoopbackSink {
    async fn send(&self, message: String) -> TransportResult<()> {
        self.transport.accept(self.client_id, &message)
    }

    async fn close(&self) -> TransportResult<()> {
        self.transport.close_link(self.client_id)
    }
}

#[async_trait]
impl TransportConnector for InMemoryTransport {
    async fn open(&self, target: TransportTarget) -> TransportResult<TransportLink> {
        let mut state = self.write()?;
        if let Some(reason) = state.fail_next_open.take() {
            return Err(TransportError::UnsupportedTarget {
                client_id: target.client_id,
                reason,
            });
        }

        let (sender, inbound) = mpsc::unbounded_channel();
        let peer = state.peers.entry(target.client_id).or_default();
        peer.sender = Some(sender);
        peer.held.clear();
        peer.opens += 1;
        drop(state);

        let sink = LoopbackSink {
            client_id: target.client_id,
            transport: self.clone(),
        };
        Ok(TransportLink::new(Arc::new(sink), inbound))
    }
}
