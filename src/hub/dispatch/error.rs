//! Failures delivered to individual request waiters.

use crate::hub::domain::RpcError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for a single dispatched request.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Failure of one in-flight request.
///
/// The type is cheap to clone because a transport failure fans the same
/// error out to every waiter on a client.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// No response arrived before the deadline.
    #[error("request '{method}' timed out after {}ms", .after.as_millis())]
    Timeout {
        /// Requested method.
        method: String,
        /// Deadline that elapsed.
        after: Duration,
    },

    /// The client disconnected or was deleted while the request was pending.
    #[error("request cancelled: {0}")]
    Cancelled(String),

    /// The transport broke while the request was pending.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The remote side answered with an error object.
    #[error("remote error: {0}")]
    Remote(RpcError),

    /// The response result does not match the expected shape.
    #[error("invalid response to '{method}': {source}")]
    InvalidResponse {
        /// Requested method.
        method: String,
        /// Decoding failure.
        #[source]
        source: Arc<serde_json::Error>,
    },
}

impl DispatchError {
    /// Builds an [`DispatchError::InvalidResponse`] from a decoding failure.
    pub fn invalid_response(method: impl Into<String>, source: serde_json::Error) -> Self {
        Self::InvalidResponse {
            method: method.into(),
            source: Arc::new(source),
        }
    }
}
