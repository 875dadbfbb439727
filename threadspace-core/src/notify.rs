//! Observer notifications.
//!
//! The hub is a typed publish/subscribe channel. Each subscriber owns an
//! unbounded crossbeam receiver, so publishing never blocks the publisher and
//! every subscriber sees events in publish order. Subscribers whose receiver
//! has been dropped are pruned on the next publish.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use threadspace_types::{InstanceId, InstanceState};

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// The live instance set changed. Ids are sorted.
    InstancesChanged(Vec<InstanceId>),
    /// An instance's live state changed, locally or through a peer broadcast.
    StateUpdated {
        instance: InstanceId,
        state: InstanceState,
    },
}

#[derive(Clone, Default)]
pub struct NotificationHub {
    subscribers: Arc<Mutex<Vec<Sender<SyncEvent>>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn publish(&self, event: SyncEvent) {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        if subscribers.len() != before {
            log::debug!(
                target: "notify",
                "dropped {} disconnected subscriber(s)",
                before - subscribers.len()
            );
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl std::fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHub")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_receives_events_in_order() {
        let hub = NotificationHub::new();
        let a = hub.subscribe();
        let b = hub.subscribe();

        hub.publish(SyncEvent::InstancesChanged(vec![InstanceId::new("A")]));
        hub.publish(SyncEvent::StateUpdated {
            instance: InstanceId::new("A"),
            state: InstanceState::default(),
        });

        for rx in [a, b] {
            assert!(matches!(rx.try_recv(), Ok(SyncEvent::InstancesChanged(ids)) if ids.len() == 1));
            assert!(matches!(rx.try_recv(), Ok(SyncEvent::StateUpdated { .. })));
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let hub = NotificationHub::new();
        let kept = hub.subscribe();
        drop(hub.subscribe());
        assert_eq!(hub.subscriber_count(), 2);

        hub.publish(SyncEvent::InstancesChanged(Vec::new()));
        assert_eq!(hub.subscriber_count(), 1);
        assert!(kept.try_recv().is_ok());
    }
}
