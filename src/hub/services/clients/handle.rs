//! Runtime state attached to one client record.

use crate::hub::{
    dispatch::{CorrelationSequence, PendingRequests},
    domain::{Client, ClientId, ClientStatus, SessionId},
    ports::{SharedNotificationHandler, TransportSink},
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::warn;

/// Open transport owned by a client for one connection epoch.
pub(super) struct ActiveLink {
    pub(super) sink: Arc<dyn TransportSink>,
    pub(super) epoch: u64,
    pub(super) pump: JoinHandle<()>,
}

impl ActiveLink {
    /// Stops the inbound pump and closes the sink.
    ///
    /// The pump itself passes `abort_pump = false` when it tears down its
    /// own link, so that the close is not cancelled mid-flight.
    pub(super) async fn release(self, client_id: ClientId, abort_pump: bool) {
        if abort_pump {
            self.pump.abort();
        }
        if let Err(err) = self.sink.close().await {
            warn!(client_id = %client_id, error = %err, "failed to close client transport");
        }
    }
}

/// Mutable runtime state of one client.
///
/// Every lock is held only for short synchronous sections. Locks nest in
/// one order: session map, then client map, then record.
pub(super) struct ClientHandle {
    pub(super) id: ClientId,
    pub(super) session_id: SessionId,
    pub(super) pending: PendingRequests,
    pub(super) sequence: CorrelationSequence,
    record: Mutex<Client>,
    link: Mutex<Option<ActiveLink>>,
    handlers: Mutex<HashMap<String, SharedNotificationHandler>>,
    epoch: AtomicU64,
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ClientHandle {
    pub(super) fn new(client: Client) -> Self {
        Self {
            id: client.id(),
            session_id: client.session_id(),
            pending: PendingRequests::new(),
            sequence: CorrelationSequence::new(),
            record: Mutex::new(client),
            link: Mutex::new(None),
            handlers: Mutex::new(HashMap::new()),
            epoch: AtomicU64::new(0),
        }
    }

    pub(super) fn record(&self) -> MutexGuard<'_, Client> {
        relock(&self.record)
    }

    pub(super) fn snapshot(&self) -> Client {
        self.record().clone()
    }

    pub(super) fn status(&self) -> ClientStatus {
        self.record().status()
    }

    pub(super) fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Starts a new connection epoch. Events and links from older epochs
    /// are ignored from here on.
    pub(super) fn advance_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }

    /// Installs a link when its epoch is still current.
    ///
    /// Returns the displaced link, or hands the new link back when a
    /// disconnect superseded it.
    pub(super) fn install_link(&self, link: ActiveLink) -> Result<Option<ActiveLink>, ActiveLink> {
        let mut slot = relock(&self.link);
        if link.epoch != self.current_epoch() {
            return Err(link);
        }
        Ok(slot.replace(link))
    }

    pub(super) fn take_link(&self) -> Option<ActiveLink> {
        relock(&self.link).take()
    }

    /// Takes the link only when it belongs to the given epoch.
    pub(super) fn take_link_if(&self, epoch: u64) -> Option<ActiveLink> {
        let mut slot = relock(&self.link);
        if slot.as_ref().is_some_and(|link| link.epoch == epoch) {
            slot.take()
        } else {
            None
        }
    }

    /// Returns the open sink together with its epoch.
    pub(super) fn sink(&self) -> Option<(Arc<dyn TransportSink>, u64)> {
        relock(&self.link)
            .as_ref()
            .map(|link| (Arc::clone(&link.sink), link.epoch))
    }

    pub(super) fn sink_for(&self, epoch: u64) -> Option<Arc<dyn TransportSink>> {
        relock(&self.link)
            .as_ref()
            .filter(|link| link.epoch == epoch)
            .map(|link| Arc::clone(&link.sink))
    }

    pub(super) fn handler(&self, method: &str) -> Option<SharedNotificationHandler> {
        relock(&self.handlers).get(method).cloned()
    }

    /// Registers a handler, returning whether one was replaced.
    pub(super) fn set_handler(&self, method: String, handler: SharedNotificationHandler) -> bool {
        relock(&self.handlers).insert(method, handler).is_some()
    }

    pub(super) fn remove_handler(&self, method: &str) -> bool {
        relock(&self.handlers).remove(method).is_some()
    }

    pub(super) fn handler_methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = relock(&self.handlers).keys().cloned().collect();
        methods.sort();
        methods
    }
}
