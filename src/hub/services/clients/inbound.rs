//! Inbound pump: routes messages arriving on a client's transport link.

use super::{ClientHandle, ClientRegistry};
use crate::hub::{
    dispatch::DispatchError,
    domain::{InboundMessage, Notification, NotificationDirection, RequestId, RpcError},
    ports::TransportEvent,
};
use mockable::Clock;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

impl<C> ClientRegistry<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Consumes inbound events for one connection epoch until the link
    /// closes.
    pub(super) async fn run_inbound(
        self,
        handle: Arc<ClientHandle>,
        epoch: u64,
        mut inbound: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        while let Some(event) = inbound.recv().await {
            match event {
                TransportEvent::Message(raw) => self.route_inbound(&handle, epoch, &raw).await,
                TransportEvent::Closed { reason } => {
                    let description =
                        reason.unwrap_or_else(|| "transport closed by peer".to_owned());
                    self.fail_transport(&handle, epoch, &description, false)
                        .await;
                    return;
                }
            }
        }
        self.fail_transport(&handle, epoch, "transport channel ended", false)
            .await;
    }

    async fn route_inbound(&self, handle: &ClientHandle, epoch: u64, raw: &str) {
        handle.record().touch(&*self.clock);
        match InboundMessage::parse(raw) {
            Ok(InboundMessage::Response { id, outcome }) => route_response(handle, id, outcome),
            Ok(InboundMessage::Notification(notification)) => {
                self.route_notification(handle, notification);
            }
            Ok(InboundMessage::Request { id, method, params }) => {
                self.reject_server_request(handle, epoch, &id, &method, params)
                    .await;
            }
            Err(err) => {
                warn!(
                    client_id = %handle.id,
                    error = %err,
                    "discarding undecodable inbound message"
                );
            }
        }
    }

    /// Records the notification, then hands it to the registered handler on
    /// its own task.
    fn route_notification(&self, handle: &ClientHandle, notification: Notification) {
        handle.record().record_notification(
            NotificationDirection::Inbound,
            notification.method(),
            notification.params().cloned(),
            &*self.clock,
        );

        let Some(handler) = handle.handler(notification.method()) else {
            debug!(
                client_id = %handle.id,
                method = notification.method(),
                "no handler registered; notification dropped"
            );
            return;
        };
        debug!(
            client_id = %handle.id,
            method = notification.method(),
            "dispatching notification"
        );
        tokio::spawn(async move {
            handler.handle(notification).await;
        });
    }

    /// Answers a peer-initiated request with `method not found`.
    async fn reject_server_request(
        &self,
        handle: &ClientHandle,
        epoch: u64,
        id: &Value,
        method: &str,
        params: Option<Value>,
    ) {
        handle.record().record_notification(
            NotificationDirection::Inbound,
            method,
            params,
            &*self.clock,
        );

        let Some(sink) = handle.sink_for(epoch) else {
            warn!(client_id = %handle.id, method, "cannot answer server request without a link");
            return;
        };
        debug!(client_id = %handle.id, method, "rejecting server-initiated request");
        let reply = RpcError::method_not_found(method).encode_response(id);
        if let Err(err) = sink.send(reply).await {
            self.fail_transport(handle, epoch, &err.to_string(), false)
                .await;
        }
    }
}

fn route_response(handle: &ClientHandle, id: RequestId, outcome: Result<Value, RpcError>) {
    match handle
        .pending
        .complete(id, outcome.map_err(DispatchError::Remote))
    {
        Some(method) => {
            debug!(client_id = %handle.id, request_id = %id, method = %method, "response routed");
        }
        None => {
            warn!(
                client_id = %handle.id,
                request_id = %id,
                "discarding response without a pending request"
            );
        }
    }
}
