//! Client connection states and aggregate session status.

use super::{ParseClientStatusError, ParseSessionStatusError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection state of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    /// No transport is open. Initial state.
    Disconnected,
    /// A transport is being opened and the handshake is in progress.
    Connecting,
    /// The handshake succeeded and the client can exchange messages.
    Connected,
    /// The last connection attempt or the live transport failed.
    Error,
}

impl ClientStatus {
    /// Returns the canonical text representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }

    /// Returns whether a transport may be open in this state.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }

    /// Returns whether transition to `target` is allowed.
    ///
    /// `connecting -> disconnected` covers an explicit disconnect that
    /// aborts an in-flight handshake.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Disconnected | Self::Error, Self::Connecting)
                | (
                    Self::Connecting,
                    Self::Connected | Self::Error | Self::Disconnected
                )
                | (Self::Connected, Self::Disconnected | Self::Error)
                | (Self::Error, Self::Disconnected)
        )
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ClientStatus {
    type Error = ParseClientStatusError;

    fn try_from(value: &str) -> Result<Self, ParseClientStatusError> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "disconnected" => Ok(Self::Disconnected),
            "connecting" => Ok(Self::Connecting),
            "connected" => Ok(Self::Connected),
            "error" => Ok(Self::Error),
            _ => Err(ParseClientStatusError(value.to_owned())),
        }
    }
}

/// Aggregate health of a session, derived from its clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// At least one client is connected.
    Active,
    /// No client is connected and none has failed.
    Inactive,
    /// At least one client failed and none is connected.
    Error,
}

impl SessionStatus {
    /// Returns the canonical text representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Error => "error",
        }
    }

    /// Derives the session status from the statuses of its clients.
    #[must_use]
    pub fn aggregate(statuses: impl IntoIterator<Item = ClientStatus>) -> Self {
        let mut any_error = false;
        for status in statuses {
            match status {
                ClientStatus::Connected => return Self::Active,
                ClientStatus::Error => any_error = true,
                ClientStatus::Disconnected | ClientStatus::Connecting => {}
            }
        }

        if any_error { Self::Error } else { Self::Inactive }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for SessionStatus {
    type Error = ParseSessionStatusError;

    fn try_from(value: &str) -> Result<Self, ParseSessionStatusError> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "error" => Ok(Self::Error),
            _ => Err(ParseSessionStatusError(value.to_owned())),
        }
    }
}
