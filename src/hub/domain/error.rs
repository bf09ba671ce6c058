//! Error types for hub domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing or mutating hub domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HubDomainError {
    /// The room name is empty after trimming.
    #[error("room name must not be empty")]
    EmptyRoomName,

    /// The client name is empty after trimming.
    #[error("client name must not be empty")]
    EmptyClientName,

    /// The client name contains control characters.
    #[error("client name '{0}' contains control characters")]
    InvalidClientName(String),

    /// A room or client name exceeds the 200-character limit.
    #[error("name exceeds 200 character limit: {0}")]
    NameTooLong(String),

    /// The transport session identifier is empty after trimming.
    #[error("transport session identifier must not be empty")]
    EmptyTransportSessionId,

    /// A protocol method name is empty after trimming.
    #[error("protocol method name must not be empty")]
    EmptyMethod,

    /// A room metadata key is empty after trimming.
    #[error("room metadata key must not be empty")]
    EmptyMetadataKey,

    /// The STDIO command is empty.
    #[error("STDIO command must not be empty")]
    EmptyStdioCommand,

    /// The STDIO working directory is empty after trimming.
    #[error("STDIO working directory must not be empty when provided")]
    EmptyWorkingDirectory,

    /// Transitioning between two client states is invalid.
    #[error("invalid client status transition: {from} -> {to}")]
    InvalidStatusTransition {
        /// Current client status.
        from: String,
        /// Requested target status.
        to: String,
    },
}

/// Error returned while parsing a client status from text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown client status: {0}")]
pub struct ParseClientStatusError(pub String);

/// Error returned while parsing a session status from text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown session status: {0}")]
pub struct ParseSessionStatusError(pub String);
