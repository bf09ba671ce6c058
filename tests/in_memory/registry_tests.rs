//! Room, session and client membership, deletion policies and teardown.

use super::helpers::{HubContext, context};
use atrium::hub::{
    domain::{ClientId, ClientStatus, RoomId, SessionId, SessionStatus},
    services::{CreateClientRequest, ErrorKind, HubError, RoomDeletion},
};
use rstest::rstest;

fn assert_references_consistent(context: &HubContext) {
    let rooms = context.hub.rooms().list_rooms().expect("rooms");
    let sessions = context.hub.sessions().list_sessions().expect("sessions");
    let clients = context.hub.clients().all_clients().expect("clients");

    for room in &rooms {
        for session_id in room.session_ids() {
            let session = context
                .hub
                .sessions()
                .get_session(*session_id)
                .expect("lookup")
                .expect("room references an existing session");
            assert_eq!(session.room_id(), room.id());
        }
    }
    for session in &sessions {
        for client_id in session.client_ids() {
            let client = context
                .hub
                .clients()
                .get_client(*client_id)
                .expect("lookup")
                .expect("session references an existing client");
            assert_eq!(client.session_id(), session.id());
        }
    }
    for client in &clients {
        let session = context
            .hub
            .sessions()
            .get_session(client.session_id())
            .expect("lookup")
            .expect("client belongs to an existing session");
        assert!(session.contains_client(client.id()));
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn created_entities_reference_each_other(context: HubContext) {
    let (room_id, session_id) = context.room_with_session().expect("room and session");
    let first = context.client_in(session_id, "files").expect("first client");
    let second = context.client_in(session_id, "search").expect("second client");

    assert_eq!(
        context.hub.rooms().room_sessions(room_id).expect("sessions"),
        vec![session_id]
    );
    let clients = context
        .hub
        .clients()
        .clients_by_session(session_id)
        .expect("clients");
    let ids: Vec<_> = clients.iter().map(|client| client.id()).collect();
    assert_eq!(ids, vec![first, second]);
    assert!(clients
        .iter()
        .all(|client| client.status() == ClientStatus::Disconnected && client.history().is_empty()));
    assert_references_consistent(&context);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn creating_in_missing_parents_reports_not_found(context: HubContext) {
    let session = context.hub.sessions().create_session(RoomId::new());
    assert!(matches!(session, Err(HubError::RoomNotFound(_))));

    let client = context
        .hub
        .clients()
        .create_client(CreateClientRequest::new(SessionId::new(), "files"));
    let error = client.expect_err("client without session should fail");
    assert_eq!(error.kind(), ErrorKind::NotFound);
    assert!(context.hub.clients().all_clients().expect("clients").is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_client_names_are_rejected(context: HubContext) {
    let (_, session_id) = context.room_with_session().expect("room and session");
    let result = context
        .hub
        .clients()
        .create_client(CreateClientRequest::new(session_id, "   "));
    assert_eq!(
        result.expect_err("blank name should fail").kind(),
        ErrorKind::Validation
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleting_a_client_detaches_it_from_its_session(context: HubContext) {
    let (session_id, client_id) = context.connected_client().await.expect("connected client");

    let deleted = context
        .hub
        .clients()
        .delete_client(client_id)
        .await
        .expect("delete");

    assert_eq!(deleted.status(), ClientStatus::Disconnected);
    assert!(context.hub.clients().get_client(client_id).expect("lookup").is_none());
    let session = context
        .hub
        .sessions()
        .get_session(session_id)
        .expect("lookup")
        .expect("session survives");
    assert!(session.client_ids().is_empty());
    assert_eq!(session.status(), SessionStatus::Inactive);
    assert!(context.transport.is_closed(client_id).expect("transport state"));
    assert_references_consistent(&context);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleting_a_session_with_live_clients_requires_force(context: HubContext) {
    let (session_id, client_id) = context.connected_client().await.expect("connected client");

    let refused = context.hub.delete_session(session_id, false).await;
    assert!(matches!(
        refused,
        Err(HubError::SessionHasLiveClients { live_clients: 1, .. })
    ));
    assert_eq!(
        context
            .hub
            .clients()
            .get_client(client_id)
            .expect("lookup")
            .map(|client| client.status()),
        Some(ClientStatus::Connected)
    );

    context
        .hub
        .delete_session(session_id, true)
        .await
        .expect("forced delete");
    assert!(context.hub.clients().get_client(client_id).expect("lookup").is_none());
    assert!(context.hub.sessions().get_session(session_id).expect("lookup").is_none());
    assert_references_consistent(&context);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn detaching_room_deletion_leaves_orphaned_sessions(context: HubContext) {
    let (room_id, session_id) = context.room_with_session().expect("room and session");
    context.client_in(session_id, "files").expect("client");

    let removed = context
        .hub
        .delete_room(room_id, RoomDeletion::DetachSessions)
        .await
        .expect("delete room");

    assert_eq!(removed.session_ids(), &[session_id]);
    assert!(context.hub.rooms().get_room(room_id).expect("lookup").is_none());
    let orphaned = context.hub.orphaned_sessions().expect("orphans");
    assert_eq!(
        orphaned.iter().map(|session| session.id()).collect::<Vec<_>>(),
        vec![session_id]
    );

    context
        .hub
        .delete_session(session_id, false)
        .await
        .expect("orphaned session can be deleted");
    assert!(context.hub.orphaned_sessions().expect("orphans").is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cascading_room_deletion_is_refused_atomically_while_clients_are_live(
    context: HubContext,
) {
    let (room_id, idle_session) = context.room_with_session().expect("room and session");
    context.client_in(idle_session, "idle").expect("idle client");
    let live_session = context
        .hub
        .sessions()
        .create_session(room_id)
        .expect("second session");
    let live_client = context.client_in(live_session.id(), "live").expect("live client");
    context
        .hub
        .clients()
        .connect_client(live_client)
        .await
        .expect("connect");

    let refused = context
        .hub
        .delete_room(room_id, RoomDeletion::Cascade { force: false })
        .await;

    assert!(matches!(
        refused,
        Err(HubError::RoomHasLiveClients { live_clients: 1, .. })
    ));
    assert_eq!(context.hub.sessions().list_sessions().expect("sessions").len(), 2);
    assert_eq!(context.hub.clients().all_clients().expect("clients").len(), 2);
    assert_references_consistent(&context);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn forced_cascade_removes_everything_below_the_room(context: HubContext) {
    let (room_id, session_id) = context.room_with_session().expect("room and session");
    let client_id = context.client_in(session_id, "files").expect("client");
    context
        .hub
        .clients()
        .connect_client(client_id)
        .await
        .expect("connect");

    context
        .hub
        .delete_room(room_id, RoomDeletion::Cascade { force: true })
        .await
        .expect("forced cascade");

    assert!(context.hub.rooms().list_rooms().expect("rooms").is_empty());
    assert!(context.hub.sessions().list_sessions().expect("sessions").is_empty());
    assert!(context.hub.clients().all_clients().expect("clients").is_empty());
    assert!(context.transport.is_closed(client_id).expect("transport state"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleting_missing_entities_reports_not_found(context: HubContext) {
    let room = context
        .hub
        .delete_room(RoomId::new(), RoomDeletion::DetachSessions)
        .await;
    assert!(matches!(room, Err(HubError::RoomNotFound(_))));

    let session = context.hub.delete_session(SessionId::new(), true).await;
    assert!(matches!(session, Err(HubError::SessionNotFound(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_disconnects_clients_and_clears_registries(context: HubContext) {
    let (_, client_id) = context.connected_client().await.expect("connected client");

    context.hub.shutdown().await.expect("shutdown");

    assert!(context.transport.is_closed(client_id).expect("transport state"));
    assert!(context.hub.rooms().list_rooms().expect("rooms").is_empty());
    assert!(context.hub.sessions().list_sessions().expect("sessions").is_empty());
    assert!(context.hub.clients().all_clients().expect("clients").is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn attaching_to_a_foreign_parent_is_refused(context: HubContext) {
    let (first_room, first_session) = context.room_with_session().expect("first room");
    let (second_room, second_session) = context.room_with_session().expect("second room");
    let client_id = context.client_in(first_session, "files").expect("client");

    let moved_session = context.hub.add_session_to_room(second_room, first_session);
    assert!(matches!(
        moved_session,
        Err(HubError::ForeignSession { owner, .. }) if owner == first_room
    ));
    let moved_client = context.hub.add_client_to_session(second_session, client_id);
    assert!(matches!(
        moved_client,
        Err(HubError::ForeignClient { owner, .. }) if owner == first_session
    ));
    assert_eq!(
        moved_client.expect_err("foreign client").kind(),
        ErrorKind::Conflict
    );
    assert_eq!(
        context.hub.rooms().room_sessions(second_room).expect("sessions"),
        vec![second_session]
    );

    assert!(!context
        .hub
        .add_client_to_session(first_session, client_id)
        .expect("own session"));
    assert!(context
        .hub
        .rooms()
        .remove_session_from_room(first_room, first_session)
        .expect("detach"));
    assert!(context
        .hub
        .add_session_to_room(first_room, first_session)
        .expect("reattach to own room"));

    context
        .hub
        .delete_session(second_session, true)
        .await
        .expect("delete second session");
    assert!(context.hub.clients().get_client(client_id).expect("lookup").is_some());
    assert_eq!(
        context.hub.sessions().session_clients(first_session).expect("clients"),
        vec![client_id]
    );
    assert_references_consistent(&context);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transitions_leave_the_session_status_current(context: HubContext) {
    let (_, session_id) = context.room_with_session().expect("room and session");
    let client_ids: Vec<ClientId> = (0..6)
        .map(|index| {
            context
                .client_in(session_id, &format!("tool-{index}"))
                .expect("client")
        })
        .collect();

    for round in 0..4 {
        let tasks: Vec<_> = client_ids
            .iter()
            .enumerate()
            .map(|(index, &client_id)| {
                let clients = context.hub.clients().clone();
                let stay_connected = (index + round) % 3 == 0;
                tokio::spawn(async move {
                    for _ in 0..8 {
                        clients.connect_client(client_id).await?;
                        clients.disconnect_client(client_id).await?;
                    }
                    if stay_connected {
                        clients.connect_client(client_id).await?;
                    }
                    Ok::<(), HubError>(())
                })
            })
            .collect();
        for task in tasks {
            task.await.expect("join").expect("connect and disconnect cycle");
        }

        let statuses: Vec<ClientStatus> = client_ids
            .iter()
            .map(|client_id| {
                context
                    .hub
                    .clients()
                    .get_client(*client_id)
                    .expect("lookup")
                    .expect("client exists")
                    .status()
            })
            .collect();
        let session = context
            .hub
            .sessions()
            .get_session(session_id)
            .expect("lookup")
            .expect("session exists");
        assert_eq!(session.status(), SessionStatus::aggregate(statuses));
        assert_eq!(session.status(), SessionStatus::Active);

        for client_id in &client_ids {
            context
                .hub
                .clients()
                .disconnect_client(*client_id)
                .await
                .expect("disconnect");
        }
    }

    let session = context
        .hub
        .sessions()
        .get_session(session_id)
        .expect("lookup")
        .expect("session exists");
    assert_eq!(session.status(), SessionStatus::Inactive);
}
