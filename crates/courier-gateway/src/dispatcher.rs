use std::sync::Arc;

use tokio::sync::broadcast;

use courier_types::events::GatewayEvent;

/// Notification bus for gateway events. Every successful append publishes
/// here; connections filter by their Subscribe set before forwarding. The
/// poll endpoints stay the source of truth, so a dropped or lagged event
/// only costs a client one poll interval.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<GatewayEvent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Publish an event to all connected clients. Send errors mean no
    /// connections exist, which is fine.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use courier_types::events::GatewayEvent;
    use uuid::Uuid;

    use super::Dispatcher;

    #[tokio::test]
    async fn broadcast_reaches_subscribers() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();

        let user_id = Uuid::new_v4();
        dispatcher.broadcast(GatewayEvent::Ready { user_id });

        match rx.recv().await.unwrap() {
            GatewayEvent::Ready { user_id: got } => assert_eq!(got, user_id),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn broadcast_without_subscribers_is_ok() {
        let dispatcher = Dispatcher::new();
        dispatcher.broadcast(GatewayEvent::Ready {
            user_id: Uuid::new_v4(),
        });
    }
}
