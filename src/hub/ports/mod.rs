//! Port contracts for client transports and notification consumers.

mod notification;
mod transport;

pub use notification::{NotificationHandler, SharedNotificationHandler};
pub use transport::{
    TransportConnector, TransportError, TransportEvent, TransportLink, TransportResult,
    TransportSink, TransportTarget,
};
