use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::broadcast;
use uuid::Uuid;

use lovenote_types::events::GatewayEvent;

/// Fans row events out to every connected realtime client.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// All connections receive all events and filter by subscription
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    connections: AtomicUsize,
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
                connections: AtomicUsize::new(0),
            }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Publish an event. Having no listeners is not an error.
    pub fn publish(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    pub fn connection_opened(&self) -> usize {
        self.inner.connections.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn connection_closed(&self) -> usize {
        self.inner.connections.fetch_sub(1, Ordering::Relaxed).saturating_sub(1)
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.load(Ordering::Relaxed)
    }
}

/// Whether a connection subscribed to `subscriptions` should see `event`.
pub fn should_deliver(event: &GatewayEvent, subscriptions: &HashSet<Uuid>) -> bool {
    match event.user_id() {
        Some(user_id) => subscriptions.contains(&user_id),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lovenote_types::models::{Reaction, Role};

    fn reaction_event(user_id: Uuid) -> GatewayEvent {
        GatewayEvent::ReactionCreated {
            reaction: Reaction {
                id: Uuid::new_v4(),
                user_id,
                emoji: "❤️".into(),
                created_at: Utc::now(),
            },
        }
    }

    #[test]
    fn filters_by_subscribed_user() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let subs: HashSet<Uuid> = [alice].into_iter().collect();

        assert!(should_deliver(&reaction_event(alice), &subs));
        assert!(!should_deliver(&reaction_event(bob), &subs));
        assert!(should_deliver(
            &GatewayEvent::Ready { user_id: bob, role: Role::Client },
            &subs
        ));
    }

    #[tokio::test]
    async fn published_events_reach_subscribers() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();
        let user = Uuid::new_v4();

        dispatcher.publish(reaction_event(user));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.user_id(), Some(user));
    }

    #[test]
    fn connection_counter() {
        let dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.connection_opened(), 1);
        assert_eq!(dispatcher.connection_opened(), 2);
        assert_eq!(dispatcher.connection_closed(), 1);
        assert_eq!(dispatcher.connection_count(), 1);
    }
}
