//! Runtime configuration for the hub.

use crate::hub::domain::ImplementationInfo;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for registries and the dispatch engine.
///
/// # Examples
///
/// ```
/// use atrium::config::HubConfig;
/// use std::time::Duration;
///
/// let config = HubConfig::default();
/// assert_eq!(config.history_capacity, 100);
/// assert_eq!(config.default_request_timeout(), Some(Duration::from_secs(30)));
///
/// let relaxed = HubConfig::default().with_request_timeout(None);
/// assert_eq!(relaxed.default_request_timeout(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Maximum history entries kept per client. Zero disables recording.
    pub history_capacity: usize,
    /// Default request deadline in milliseconds; `None` waits indefinitely.
    pub request_timeout_ms: Option<u64>,
    /// Deadline for opening a transport and completing the handshake.
    pub connect_timeout_ms: u64,
    /// Name given to rooms created without one.
    pub default_room_name: String,
    /// Implementation details sent in the handshake.
    pub client_info: ImplementationInfo,
    /// Protocol version requested in the handshake.
    pub protocol_version: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            request_timeout_ms: Some(30_000),
            connect_timeout_ms: 30_000,
            default_room_name: "Untitled room".to_owned(),
            client_info: ImplementationInfo::new(
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
            ),
            protocol_version: "2024-11-05".to_owned(),
        }
    }
}

impl HubConfig {
    /// Creates a configuration with short deadlines and a small history.
    ///
    /// Useful for tests that exercise timeouts and eviction.
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            history_capacity: 16,
            request_timeout_ms: Some(2_000),
            connect_timeout_ms: 2_000,
            ..Self::default()
        }
    }

    /// Sets the per-client history capacity.
    #[must_use]
    pub const fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Sets or clears the default request deadline.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout_ms = timeout.map(duration_millis);
        self
    }

    /// Sets the connect deadline.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = duration_millis(timeout);
        self
    }

    /// Returns the default request deadline.
    #[must_use]
    pub fn default_request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Returns the connect deadline.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
