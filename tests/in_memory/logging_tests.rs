//! Structured log events emitted on connection failures.

use super::helpers::HubContext;
use atrium::config::HubConfig;
use atrium::hub::{adapters::HandshakeScript, domain::RpcError};
use std::sync::{Arc, Mutex};
use tracing::{Event, Level, Subscriber, field::Field, field::Visit};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Clone, Default)]
struct CapturedLogs {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

impl CapturedLogs {
    fn has_event(&self, level: Level, message: &str) -> bool {
        self.events
            .lock()
            .expect("log capture lock")
            .iter()
            .any(|(captured, text)| *captured == level && text.contains(message))
    }
}

#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

struct CaptureLayer {
    logs: CapturedLogs,
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.logs
            .events
            .lock()
            .expect("log capture lock")
            .push((*event.metadata().level(), visitor.0));
    }
}

#[tokio::test(flavor = "current_thread")]
async fn rejected_handshake_logs_a_warning() {
    let logs = CapturedLogs::default();
    let _guard = tracing_subscriber::registry()
        .with(CaptureLayer { logs: logs.clone() })
        .set_default();
    let context = HubContext::with_config(HubConfig::for_tests());
    let (_, session_id) = context.room_with_session().expect("room and session");
    let client_id = context.client_in(session_id, "files").expect("client");
    context
        .transport
        .script_handshake(client_id, HandshakeScript::Reject(RpcError::new(-1, "denied")))
        .expect("script");

    context
        .hub
        .clients()
        .connect_client(client_id)
        .await
        .expect_err("handshake fails");

    assert!(logs.has_event(Level::INFO, "connecting client"));
    assert!(logs.has_event(Level::WARN, "client connection failed"));
    assert!(!logs.has_event(Level::INFO, "client connected"));
}
