//! Correlation table of in-flight requests for one client.

use super::{DispatchError, DispatchResult};
use crate::hub::domain::RequestId;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// Receiving half handed to the caller that issued a request.
pub type ResponseReceiver = oneshot::Receiver<DispatchResult<Value>>;

/// Monotonic source of correlation identifiers.
///
/// The first identifier issued is `1`.
#[derive(Debug, Default)]
pub struct CorrelationSequence {
    last: AtomicU64,
}

impl CorrelationSequence {
    /// Creates a sequence that has not issued any identifier yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Issues the next identifier.
    pub fn next_id(&self) -> RequestId {
        RequestId::new(self.last.fetch_add(1, Ordering::Relaxed).saturating_add(1))
    }
}

#[derive(Debug)]
struct PendingEntry {
    method: String,
    sender: oneshot::Sender<DispatchResult<Value>>,
}

/// Pending waiters keyed by correlation identifier.
///
/// Every registered waiter is resolved at most once: by a matching
/// response, by a fan-out failure, or by being discarded after a timeout.
#[derive(Debug, Default)]
pub struct PendingRequests {
    entries: Mutex<HashMap<RequestId, PendingEntry>>,
}

impl PendingRequests {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<RequestId, PendingEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a waiter and returns its receiving half.
    ///
    /// A waiter already registered under the same identifier is cancelled.
    pub fn register(&self, id: RequestId, method: impl Into<String>) -> ResponseReceiver {
        let (sender, receiver) = oneshot::channel();
        let replaced = self.entries().insert(
            id,
            PendingEntry {
                method: method.into(),
                sender,
            },
        );
        if let Some(previous) = replaced {
            let _unused = previous.sender.send(Err(DispatchError::Cancelled(format!(
                "correlation id {id} was reused"
            ))));
        }
        receiver
    }

    /// Delivers an outcome to the waiter registered under `id`.
    ///
    /// Returns the method of the resolved request, or `None` when no waiter
    /// is registered (unknown id, or the waiter already timed out).
    pub fn complete(&self, id: RequestId, outcome: DispatchResult<Value>) -> Option<String> {
        let entry = self.entries().remove(&id)?;
        // The caller may have stopped waiting; the outcome is dropped then.
        let _unused = entry.sender.send(outcome);
        Some(entry.method)
    }

    /// Removes a waiter without resolving it.
    ///
    /// Returns whether a waiter was registered.
    pub fn discard(&self, id: RequestId) -> bool {
        self.entries().remove(&id).is_some()
    }

    /// Resolves every waiter with a clone of `error`.
    ///
    /// Returns the number of waiters resolved.
    pub fn fail_all(&self, error: &DispatchError) -> usize {
        let drained: Vec<PendingEntry> = self.entries().drain().map(|(_, entry)| entry).collect();
        let count = drained.len();
        for entry in drained {
            let _unused = entry.sender.send(Err(error.clone()));
        }
        count
    }

    /// Returns the number of pending waiters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns whether no waiter is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
