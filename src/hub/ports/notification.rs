//! Notification handler port.

use crate::hub::domain::Notification;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Asynchronous consumer of inbound notifications for one method.
///
/// Handlers run on their own task, so they may call back into the hub,
/// for example to send a follow-up request on the same client.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    /// Handles one notification.
    async fn handle(&self, notification: Notification);
}

#[async_trait]
impl<F, Fut> NotificationHandler for F
where
    F: Fn(Notification) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, notification: Notification) {
        (self)(notification).await;
    }
}

/// Shared handle to a registered notification handler.
pub type SharedNotificationHandler = Arc<dyn NotificationHandler>;
