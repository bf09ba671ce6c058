//! Request/response correlation for client connections.
//!
//! Every client owns a [`CorrelationSequence`] and a [`PendingRequests`]
//! table. Outgoing requests register a waiter under a fresh identifier;
//! inbound responses are routed to the waiter with the matching identifier,
//! regardless of arrival order.

mod error;
mod pending;

pub use error::{DispatchError, DispatchResult};
pub use pending::{CorrelationSequence, PendingRequests, ResponseReceiver};
