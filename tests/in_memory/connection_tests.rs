//! Client connection lifecycle, handshake outcomes and session status.

use super::helpers::{HubContext, context};
use atrium::config::HubConfig;
use atrium::hub::{
    adapters::HandshakeScript,
    domain::{ClientStatus, Request, RpcError, SessionId, SessionStatus},
    services::{ErrorKind, HubError, RequestOptions},
};
use rstest::rstest;
use serde_json::{Value, json};
use std::time::Duration;

fn session_status(context: &HubContext, session_id: SessionId) -> SessionStatus {
    context
        .hub
        .sessions()
        .get_session(session_id)
        .expect("lookup")
        .expect("session exists")
        .status()
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn successful_handshake_stores_negotiated_state(context: HubContext) {
    let (_, session_id) = context.room_with_session().expect("room and session");
    let client_id = context.client_in(session_id, "files").expect("client");
    context
        .transport
        .script_handshake(
            client_id,
            HandshakeScript::Accept(json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {"tools": {}, "prompts": {}},
                "serverInfo": {"name": "files", "version": "0.3.1"},
                "instructions": "Paths are relative to the workspace root."
            })),
        )
        .expect("script");

    let client = context
        .hub
        .clients()
        .connect_client(client_id)
        .await
        .expect("connect");

    assert_eq!(client.status(), ClientStatus::Connected);
    assert!(client.error().is_none());
    assert_eq!(
        client.instructions(),
        Some("Paths are relative to the workspace root.")
    );
    let capabilities = client.server_capabilities().expect("capabilities stored");
    assert!(capabilities.supports("tools") && capabilities.supports("prompts"));
    assert_eq!(
        context.transport.sent_methods(client_id).expect("sent"),
        vec!["initialize".to_owned(), "notifications/initialized".to_owned()]
    );
    assert_eq!(session_status(&context, session_id), SessionStatus::Active);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn handshake_advertises_client_info_and_capabilities(context: HubContext) {
    let (_, client_id) = context.connected_client().await.expect("connected client");

    let sent = context.transport.sent_messages(client_id).expect("sent");
    let params = sent
        .first()
        .and_then(|message| message.get("params"))
        .expect("initialize params");
    assert_eq!(params.get("protocolVersion"), Some(&json!("2024-11-05")));
    assert_eq!(
        params.pointer("/clientInfo/name"),
        Some(&json!(env!("CARGO_PKG_NAME")))
    );
    assert!(params.get("capabilities").is_some_and(Value::is_object));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rejected_handshake_records_error_and_closes_transport(context: HubContext) {
    let (_, session_id) = context.room_with_session().expect("room and session");
    let client_id = context.client_in(session_id, "files").expect("client");
    context
        .transport
        .script_handshake(
            client_id,
            HandshakeScript::Reject(RpcError::new(-32_602, "unsupported protocol version")),
        )
        .expect("script");

    let error = context
        .hub
        .clients()
        .connect_client(client_id)
        .await
        .expect_err("handshake should fail");

    assert_eq!(error.kind(), ErrorKind::HandshakeFailed);
    let client = context
        .hub
        .clients()
        .get_client(client_id)
        .expect("lookup")
        .expect("client exists");
    assert_eq!(client.status(), ClientStatus::Error);
    assert!(client
        .error()
        .is_some_and(|message| message.contains("unsupported protocol version")));
    assert!(client.server_capabilities().is_none());
    assert!(context.transport.is_closed(client_id).expect("transport state"));
    assert_eq!(context.transport.close_count(client_id).expect("closes"), 1);
    assert_eq!(session_status(&context, session_id), SessionStatus::Error);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn open_failure_moves_client_to_error(context: HubContext) {
    let (_, session_id) = context.room_with_session().expect("room and session");
    let client_id = context.client_in(session_id, "files").expect("client");
    context
        .transport
        .fail_next_open("binary not found")
        .expect("script");

    let result = context.hub.clients().connect_client(client_id).await;

    assert!(matches!(
        result,
        Err(HubError::HandshakeFailed { ref reason, .. }) if reason.contains("binary not found")
    ));
    assert_eq!(
        context
            .hub
            .clients()
            .get_client(client_id)
            .expect("lookup")
            .map(|client| client.status()),
        Some(ClientStatus::Error)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn hanging_handshake_times_out() {
    let context = HubContext::with_config(
        HubConfig::for_tests().with_connect_timeout(Duration::from_millis(50)),
    );
    let (_, session_id) = context.room_with_session().expect("room and session");
    let client_id = context.client_in(session_id, "slow").expect("client");
    context
        .transport
        .script_handshake(client_id, HandshakeScript::Hang)
        .expect("script");

    let error = context
        .hub
        .clients()
        .connect_client(client_id)
        .await
        .expect_err("handshake should time out");

    assert!(error.to_string().contains("timed out"));
    assert!(context.transport.is_closed(client_id).expect("transport state"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dropped_handshake_fails_the_connection(context: HubContext) {
    let (_, session_id) = context.room_with_session().expect("room and session");
    let client_id = context.client_in(session_id, "flaky").expect("client");
    context
        .transport
        .script_handshake(client_id, HandshakeScript::DropConnection)
        .expect("script");

    let error = context
        .hub
        .clients()
        .connect_client(client_id)
        .await
        .expect_err("handshake should fail");

    assert_eq!(error.kind(), ErrorKind::HandshakeFailed);
    let client = context
        .hub
        .clients()
        .get_client(client_id)
        .expect("lookup")
        .expect("client exists");
    assert_eq!(client.status(), ClientStatus::Error);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn connecting_twice_is_a_conflict(context: HubContext) {
    let (_, client_id) = context.connected_client().await.expect("connected client");

    let second = context.hub.clients().connect_client(client_id).await;

    assert!(matches!(
        second,
        Err(HubError::AlreadyConnected {
            status: ClientStatus::Connected,
            ..
        })
    ));
    assert_eq!(context.transport.open_count(client_id).expect("opens"), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn disconnect_is_idempotent_and_blocks_requests(context: HubContext) {
    let (session_id, client_id) = context.connected_client().await.expect("connected client");

    let first = context
        .hub
        .clients()
        .disconnect_client(client_id)
        .await
        .expect("disconnect");
    let second = context
        .hub
        .clients()
        .disconnect_client(client_id)
        .await
        .expect("second disconnect");

    assert_eq!(first.status(), ClientStatus::Disconnected);
    assert_eq!(second.status(), ClientStatus::Disconnected);
    assert!(first.server_capabilities().is_none());
    assert_eq!(context.transport.close_count(client_id).expect("closes"), 1);
    assert_eq!(session_status(&context, session_id), SessionStatus::Inactive);

    let request = context
        .hub
        .clients()
        .send_request_value(
            client_id,
            Request::new("tools/list").expect("valid request"),
            RequestOptions::new(),
        )
        .await;
    assert!(matches!(
        request,
        Err(HubError::NotConnected {
            status: ClientStatus::Disconnected,
            ..
        })
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_client_can_reconnect(context: HubContext) {
    let (_, session_id) = context.room_with_session().expect("room and session");
    let client_id = context.client_in(session_id, "files").expect("client");
    context
        .transport
        .fail_next_open("temporarily unavailable")
        .expect("script");
    context
        .hub
        .clients()
        .connect_client(client_id)
        .await
        .expect_err("first attempt fails");

    let client = context
        .hub
        .clients()
        .connect_client(client_id)
        .await
        .expect("second attempt succeeds");

    assert_eq!(client.status(), ClientStatus::Connected);
    assert!(client.error().is_none());
    assert_eq!(session_status(&context, session_id), SessionStatus::Active);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn session_status_follows_the_aggregation_rule(context: HubContext) {
    let (_, session_id) = context.room_with_session().expect("room and session");
    let healthy = context.client_in(session_id, "healthy").expect("client");
    let broken = context.client_in(session_id, "broken").expect("client");
    context
        .transport
        .script_handshake(broken, HandshakeScript::Reject(RpcError::new(-1, "nope")))
        .expect("script");

    assert_eq!(session_status(&context, session_id), SessionStatus::Inactive);

    context
        .hub
        .clients()
        .connect_client(broken)
        .await
        .expect_err("broken client fails");
    assert_eq!(session_status(&context, session_id), SessionStatus::Error);

    context
        .hub
        .clients()
        .connect_client(healthy)
        .await
        .expect("healthy client connects");
    assert_eq!(session_status(&context, session_id), SessionStatus::Active);

    context
        .hub
        .clients()
        .disconnect_client(healthy)
        .await
        .expect("disconnect");
    assert_eq!(session_status(&context, session_id), SessionStatus::Error);

    context
        .hub
        .clients()
        .disconnect_client(broken)
        .await
        .expect("disconnect");
    assert_eq!(session_status(&context, session_id), SessionStatus::Inactive);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn connected_clients_query_lists_only_connected(context: HubContext) {
    let (_, session_id) = context.room_with_session().expect("room and session");
    let connected = context.client_in(session_id, "online").expect("client");
    context.client_in(session_id, "offline").expect("client");
    context
        .hub
        .clients()
        .connect_client(connected)
        .await
        .expect("connect");

    let listed = context.hub.clients().connected_clients().expect("query");

    assert_eq!(
        listed.iter().map(|client| client.id()).collect::<Vec<_>>(),
        vec![connected]
    );
    assert_eq!(context.hub.clients().all_clients().expect("all").len(), 2);
}
