use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast, mpsc};
use tracemark_types::events::EngineEvent;
use uuid::Uuid;

use crate::outbox::NotificationGateway;

/// In-process fan-out of relayed events to live subscribers.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Every event, for service subscribers
    broadcast_tx: broadcast::Sender<EngineEvent>,

    /// Per-user notification streams: user_id -> [(stream_id, sender)]
    user_channels: RwLock<HashMap<Uuid, Vec<(Uuid, mpsc::UnboundedSender<EngineEvent>)>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                user_channels: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    pub fn broadcast(&self, event: EngineEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Open a notification stream for one user. Returns (stream_id, receiver).
    pub async fn register_user_channel(
        &self,
        user_id: Uuid,
    ) -> (Uuid, mpsc::UnboundedReceiver<EngineEvent>) {
        let stream_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .user_channels
            .write()
            .await
            .entry(user_id)
            .or_default()
            .push((stream_id, tx));
        (stream_id, rx)
    }

    pub async fn unregister_user_channel(&self, user_id: Uuid, stream_id: Uuid) {
        let mut channels = self.inner.user_channels.write().await;
        if let Some(streams) = channels.get_mut(&user_id) {
            streams.retain(|(id, _)| *id != stream_id);
            if streams.is_empty() {
                channels.remove(&user_id);
            }
        }
    }

    /// Send to every open stream of a user, dropping closed ones.
    pub async fn send_to_user(&self, user_id: Uuid, event: EngineEvent) {
        let mut channels = self.inner.user_channels.write().await;
        if let Some(streams) = channels.get_mut(&user_id) {
            streams.retain(|(_, tx)| tx.send(event.clone()).is_ok());
            if streams.is_empty() {
                channels.remove(&user_id);
            }
        }
    }

    pub async fn connected_users(&self) -> usize {
        self.inner.user_channels.read().await.len()
    }
}

#[async_trait]
impl NotificationGateway for Dispatcher {
    fn name(&self) -> &'static str {
        "dispatcher"
    }

    /// Nobody listening is not a failure; live streams are best-effort.
    async fn deliver(&self, event: &EngineEvent) -> anyhow::Result<()> {
        self.broadcast(event.clone());
        if let Some(user_id) = event.recipient() {
            self.send_to_user(user_id, event.clone()).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracemark_types::events::{Notification, NotificationType};
    use tracemark_types::models::TargetType;

    fn note(user_id: Uuid) -> EngineEvent {
        EngineEvent::Notification(Notification {
            user_id,
            notification_type: NotificationType::CopyrightVerified,
            object_type: TargetType::Claim,
            object_id: Uuid::new_v4(),
            content: "verified".into(),
        })
    }

    #[tokio::test]
    async fn targets_only_the_recipient() {
        let dispatcher = Dispatcher::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let (_, mut alice_rx) = dispatcher.register_user_channel(alice).await;
        let (_, mut bob_rx) = dispatcher.register_user_channel(bob).await;
        let mut all = dispatcher.subscribe();

        dispatcher.deliver(&note(alice)).await.unwrap();

        assert!(alice_rx.recv().await.is_some());
        assert!(bob_rx.try_recv().is_err());
        assert!(all.recv().await.is_ok());
    }

    #[tokio::test]
    async fn unregister_drops_only_that_stream() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (first, _first_rx) = dispatcher.register_user_channel(user).await;
        let (_, mut second_rx) = dispatcher.register_user_channel(user).await;

        dispatcher.unregister_user_channel(user, first).await;
        dispatcher.send_to_user(user, note(user)).await;

        assert!(second_rx.recv().await.is_some());
        assert_eq!(dispatcher.connected_users().await, 1);
    }
}
