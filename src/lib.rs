//! Atrium: a registry for tool-provider connections.
//!
//! This crate keeps track of rooms, the sessions inside them and the client
//! connections each session owns, and dispatches JSON-RPC requests and
//! notifications over those connections.
//!
//! # Architecture
//!
//! Atrium follows hexagonal architecture principles:
//!
//! - **Domain**: identities, state machines and protocol envelopes
//! - **Ports**: the transport and notification handler contracts
//! - **Adapters**: an in-memory loopback transport and a child-process
//!   transport
//! - **Services**: the room, session and client registries plus the
//!   [`hub::services::Hub`] facade
//!
//! # Examples
//!
//! ```
//! use atrium::config::HubConfig;
//! use atrium::hub::adapters::InMemoryTransport;
//! use atrium::hub::domain::{ClientStatus, SessionStatus};
//! use atrium::hub::services::{CreateClientRequest, Hub};
//! use mockable::DefaultClock;
//! use std::sync::Arc;
//!
//! let hub = Hub::new(
//!     Arc::new(InMemoryTransport::new()),
//!     Arc::new(DefaultClock),
//!     HubConfig::default(),
//! );
//! let room = hub.rooms().create_room(Some("Release")).expect("room");
//! let session = hub.sessions().create_session(room.id()).expect("session");
//! let client = hub
//!     .clients()
//!     .create_client(CreateClientRequest::new(session.id(), "files"))
//!     .expect("client");
//!
//! assert_eq!(client.status(), ClientStatus::Disconnected);
//! let stored = hub.sessions().get_session(session.id()).expect("lookup");
//! assert_eq!(stored.map(|found| found.status()), Some(SessionStatus::Inactive));
//! ```
//!
//! # Modules
//!
//! - [`hub`]: rooms, sessions, clients and request dispatch
//! - [`config`]: runtime tunables

pub mod config;
pub mod hub;
