//! Connection teardown against mocked transport ports.

use async_trait::async_trait;
use atrium::config::HubConfig;
use atrium::hub::{
    domain::ClientStatus,
    ports::{
        TransportConnector, TransportError, TransportEvent, TransportLink, TransportResult,
        TransportSink, TransportTarget,
    },
    services::{CreateClientRequest, ErrorKind, Hub},
};
use mockable::DefaultClock;
use mockall::mock;
use rstest::rstest;
use std::sync::Arc;
use tokio::sync::mpsc;

mock! {
    Connector {}

    #[async_trait]
    impl TransportConnector for Connector {
        async fn open(&self, target: TransportTarget) -> TransportResult<TransportLink>;
    }
}

mock! {
    Sink {}

    #[async_trait]
    impl TransportSink for Sink {
        async fn send(&self, message: String) -> TransportResult<()>;
        async fn close(&self) -> TransportResult<()>;
    }
}

fn hub_with(connector: MockConnector) -> Hub<DefaultClock> {
    Hub::new(
        Arc::new(connector),
        Arc::new(DefaultClock),
        HubConfig::for_tests(),
    )
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn write_failure_during_handshake_closes_the_sink_once() {
    let mut mock_sink = MockSink::new();
    mock_sink
        .expect_send()
        .withf(|message| message.contains("\"initialize\""))
        .times(1)
        .returning(|_| Err(TransportError::Closed));
    mock_sink.expect_close().times(1).returning(|| Ok(()));
    let sink = Arc::new(mock_sink);
    let (events, inbound) = mpsc::unbounded_channel::<TransportEvent>();

    let mut connector = MockConnector::new();
    let link_sink: Arc<dyn TransportSink> = Arc::clone(&sink) as Arc<dyn TransportSink>;
    connector
        .expect_open()
        .times(1)
        .return_once(move |_| Ok(TransportLink::new(link_sink, inbound)));
    let hub = hub_with(connector);
    let room = hub.rooms().create_room(None).expect("room");
    let session = hub.sessions().create_session(room.id()).expect("session");
    let client = hub
        .clients()
        .create_client(CreateClientRequest::new(session.id(), "files"))
        .expect("client");

    let error = hub
        .clients()
        .connect_client(client.id())
        .await
        .expect_err("handshake write fails");

    assert_eq!(error.kind(), ErrorKind::HandshakeFailed);
    let stored = hub
        .clients()
        .get_client(client.id())
        .expect("lookup")
        .expect("client exists");
    assert_eq!(stored.status(), ClientStatus::Error);
    drop(events);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn open_receives_the_client_target() {
    let mut connector = MockConnector::new();
    connector
        .expect_open()
        .withf(|target| target.client_name.as_str() == "search" && target.transport.is_none())
        .times(1)
        .returning(|target| {
            Err(TransportError::UnsupportedTarget {
                client_id: target.client_id,
                reason: "no launch settings".to_owned(),
            })
        });
    let hub = hub_with(connector);
    let room = hub.rooms().create_room(None).expect("room");
    let session = hub.sessions().create_session(room.id()).expect("session");
    let client = hub
        .clients()
        .create_client(CreateClientRequest::new(session.id(), "search"))
        .expect("client");

    let error = hub
        .clients()
        .connect_client(client.id())
        .await
        .expect_err("open fails");

    assert!(error.to_string().contains("no launch settings"));
}
