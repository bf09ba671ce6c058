//! Shared fixtures for hub integration tests over the loopback transport.

use atrium::config::HubConfig;
use atrium::hub::{
    adapters::InMemoryTransport,
    domain::{ClientId, Notification, RoomId, SessionId},
    ports::SharedNotificationHandler,
    services::{CreateClientRequest, Hub, HubResult},
};
use mockable::DefaultClock;
use rstest::fixture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Hub type used throughout the integration tests.
pub type TestHub = Hub<DefaultClock>;

/// A hub wired to a loopback transport the test can script.
pub struct HubContext {
    /// Scriptable peer side of every client link.
    pub transport: InMemoryTransport,
    /// Hub under test.
    pub hub: TestHub,
}

impl HubContext {
    /// Builds a context with the given configuration.
    #[must_use]
    pub fn with_config(config: HubConfig) -> Self {
        let transport = InMemoryTransport::new();
        let hub = Hub::new(
            Arc::new(transport.clone()),
            Arc::new(DefaultClock),
            config,
        );
        Self { transport, hub }
    }

    /// Creates a room with one session.
    ///
    /// # Errors
    ///
    /// Returns hub errors from room or session creation.
    pub fn room_with_session(&self) -> HubResult<(RoomId, SessionId)> {
        let room = self.hub.rooms().create_room(Some("Workspace"))?;
        let session = self.hub.sessions().create_session(room.id())?;
        Ok((room.id(), session.id()))
    }

    /// Creates a disconnected client in the given session.
    ///
    /// # Errors
    ///
    /// Returns hub errors from client creation.
    pub fn client_in(&self, session_id: SessionId, name: &str) -> HubResult<ClientId> {
        let client = self
            .hub
            .clients()
            .create_client(CreateClientRequest::new(session_id, name))?;
        Ok(client.id())
    }

    /// Creates a room, a session and a connected client.
    ///
    /// # Errors
    ///
    /// Returns hub errors from creation or the handshake.
    pub async fn connected_client(&self) -> HubResult<(SessionId, ClientId)> {
        let (_, session_id) = self.room_with_session()?;
        let client_id = self.client_in(session_id, "workspace-tools")?;
        self.hub.clients().connect_client(client_id).await?;
        Ok((session_id, client_id))
    }
}

/// Installs a global subscriber honouring `RUST_LOG`, once per process.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // Another test may have installed the subscriber already.
    let _unused = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .compact()
        .try_init();
}

/// Provides a context with short deadlines and a small history.
#[fixture]
pub fn context() -> HubContext {
    init_tracing();
    HubContext::with_config(HubConfig::for_tests())
}

/// Returns a handler that forwards every notification into a channel.
#[must_use]
pub fn forwarding_handler() -> (SharedNotificationHandler, mpsc::UnboundedReceiver<Notification>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let handler: SharedNotificationHandler = Arc::new(move |notification: Notification| {
        let forward = sender.clone();
        async move {
            // The test may have stopped listening.
            let _unused = forward.send(notification);
        }
    });
    (handler, receiver)
}

/// Upper bound for waits on background activity in tests.
pub const WAIT: Duration = Duration::from_secs(2);
