//! Broadcasting workspace changes to subscribers.

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{
    ChangeEvent, DropReason, SubscriptionConfig, SubscriptionHandle, SubscriptionId,
};

/// Internal subscription state.
struct Subscription {
    config: SubscriptionConfig,
    sender: Sender<ChangeEvent>,
}

impl Subscription {
    /// Try to send an event. Returns false if the buffer is full or the receiver is gone.
    fn try_send(&self, event: ChangeEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Fan-out of [`ChangeEvent`]s. Publishing never blocks: subscribers that
/// cannot keep up are dropped.
pub struct ChangeFeed {
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    next_id: AtomicU64,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a new subscription.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size.max(1));

        self.subscriptions
            .write()
            .insert(id, Subscription { config, sender });

        SubscriptionHandle { id, receiver }
    }

    /// Unsubscribe and clean up.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if let Some(sub) = self.subscriptions.write().remove(&id) {
            let _ = sub.sender.try_send(ChangeEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Deliver an event to every matching subscriber.
    pub fn publish(&self, event: ChangeEvent) {
        let mut to_remove = Vec::new();

        {
            let subs = self.subscriptions.read();
            for (id, sub) in subs.iter() {
                if sub.config.filter.matches(&event) && !sub.try_send(event.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.subscriptions.write();
            for id in to_remove {
                if let Some(sub) = subs.remove(&id) {
                    tracing::debug!(subscription = id.0, "dropping slow subscriber");
                    let _ = sub.sender.try_send(ChangeEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::ChangeFilter;
    use crate::types::EntityKind;
    use std::time::Duration;

    fn changed(kind: EntityKind, id: &str) -> ChangeEvent {
        ChangeEvent::EntityChanged {
            kind,
            id: id.to_string(),
        }
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let feed = ChangeFeed::new();

        let handle = feed.subscribe(SubscriptionConfig::default());
        assert_eq!(feed.subscription_count(), 1);

        feed.unsubscribe(handle.id);
        assert_eq!(feed.subscription_count(), 0);
        assert!(matches!(
            handle.try_recv(),
            Ok(ChangeEvent::Dropped { reason: DropReason::Unsubscribed })
        ));
    }

    #[test]
    fn test_publish_to_matching() {
        let feed = ChangeFeed::new();
        let handle = feed.subscribe(SubscriptionConfig {
            filter: ChangeFilter::kinds(vec![EntityKind::Task]),
            ..Default::default()
        });

        feed.publish(changed(EntityKind::Task, "t1"));

        let event = handle.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(event, changed(EntityKind::Task, "t1"));
    }

    #[test]
    fn test_publish_filters_non_matching() {
        let feed = ChangeFeed::new();
        let handle = feed.subscribe(SubscriptionConfig {
            filter: ChangeFilter::kinds(vec![EntityKind::Task]),
            ..Default::default()
        });

        feed.publish(changed(EntityKind::Project, "p1"));
        feed.publish(ChangeEvent::CommentAdded {
            task_id: "t1".into(),
            sequence: 1,
        });
        feed.publish(ChangeEvent::SweepCompleted { removed: 0 });

        assert!(handle.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_drop_slow_subscriber() {
        let feed = ChangeFeed::new();
        let _handle = feed.subscribe(SubscriptionConfig {
            buffer_size: 2,
            filter: ChangeFilter::all(),
        });

        for i in 0..10 {
            feed.publish(changed(EntityKind::Task, &format!("t{}", i)));
        }

        assert_eq!(feed.subscription_count(), 0);
    }

    #[test]
    fn test_drain() {
        let feed = ChangeFeed::new();
        let handle = feed.subscribe(SubscriptionConfig {
            filter: ChangeFilter::lifecycle(),
            ..Default::default()
        });

        feed.publish(ChangeEvent::EntityChanged {
            kind: EntityKind::Task,
            id: "t1".into(),
        });
        feed.publish(ChangeEvent::SweepCompleted { removed: 2 });
        feed.publish(ChangeEvent::SweepCompleted { removed: 0 });

        assert_eq!(
            handle.drain(),
            vec![
                ChangeEvent::SweepCompleted { removed: 2 },
                ChangeEvent::SweepCompleted { removed: 0 }
            ]
        );
    }
}
