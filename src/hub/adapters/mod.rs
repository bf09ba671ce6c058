//! Transport adapter implementations.

mod memory;
mod stdio;

pub use memory::{HandshakeScript, HeldRequest, InMemoryTransport};
pub use stdio::StdioTransportConnector;
