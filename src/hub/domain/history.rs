//! Bounded per-client activity history.

use super::RequestId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

/// Direction of a recorded notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationDirection {
    /// Received from the remote side.
    Inbound,
    /// Sent to the remote side.
    Outbound,
}

/// Final outcome of a recorded request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum RequestOutcome {
    /// The remote side returned a result.
    Response(Value),
    /// The request failed; holds the failure description.
    Error(String),
}

impl RequestOutcome {
    /// Returns whether the request succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Response(_))
    }
}

/// Single entry in a client's request history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum HistoryEntry {
    /// A request together with its response or failure.
    Request {
        /// Correlation identifier used on the wire.
        id: RequestId,
        /// Requested method.
        method: String,
        /// Request parameters.
        params: Option<Value>,
        /// Response or failure.
        outcome: RequestOutcome,
        /// When the request was written.
        sent_at: DateTime<Utc>,
        /// When the outcome was observed.
        completed_at: DateTime<Utc>,
    },
    /// A notification sent or received.
    Notification {
        /// Whether the notification was sent or received.
        direction: NotificationDirection,
        /// Notification method.
        method: String,
        /// Notification parameters.
        params: Option<Value>,
        /// When the notification was observed.
        recorded_at: DateTime<Utc>,
    },
}

impl HistoryEntry {
    /// Returns the method name of the entry.
    #[must_use]
    pub fn method(&self) -> &str {
        match self {
            Self::Request { method, .. } | Self::Notification { method, .. } => method,
        }
    }

    /// Returns the time at which the entry was recorded.
    #[must_use]
    pub const fn recorded_at(&self) -> DateTime<Utc> {
        match self {
            Self::Request { completed_at, .. } => *completed_at,
            Self::Notification { recorded_at, .. } => *recorded_at,
        }
    }
}

/// FIFO history that evicts its oldest entries once full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHistory {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

impl RequestHistory {
    /// Creates an empty history holding at most `capacity` entries.
    ///
    /// A capacity of zero disables recording.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends an entry, evicting the oldest entries beyond capacity.
    ///
    /// Returns the number of evicted entries.
    pub fn push(&mut self, entry: HistoryEntry) -> usize {
        if self.capacity == 0 {
            return 0;
        }

        let mut evicted = 0;
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
            evicted += 1;
        }
        self.entries.push_back(entry);
        evicted
    }

    /// Returns the configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no entry is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Returns the most recent entry.
    #[must_use]
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the entries from oldest to newest.
    #[must_use]
    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }
}
