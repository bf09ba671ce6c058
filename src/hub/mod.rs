//! Room, session and client registry with request dispatch.
//!
//! The hub tracks a three-level hierarchy of rooms, sessions and clients.
//! Each client owns one transport link to an external tool-provider process
//! and multiplexes JSON-RPC requests and notifications over it. The module
//! follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Request correlation in [`dispatch`]
//! - Registries and the [`services::Hub`] facade in [`services`]

pub mod adapters;
pub mod dispatch;
pub mod domain;
pub mod ports;
pub mod services;
